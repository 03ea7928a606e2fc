//! Record shapes found in a Slack export archive.
//!
//! The export is a directory with a `channels.json` and `users.json`
//! listing, plus one folder per channel holding per-day message files:
//! ```json
//! {
//!   "ts": "1610728529.000600",
//!   "thread_ts": "1610728529.000600",
//!   "user": "U01ABCDEF",
//!   "subtype": "channel_join",
//!   "text": "hello",
//!   "blocks": [{"type": "rich_text", "elements": [...]}],
//!   "files": [{"name": "a.png", "mimetype": "image/png", "size": 1024}],
//!   "reactions": [{"name": "+1", "users": ["U01ABCDEF"]}]
//! }
//! ```

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ChannelRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub purpose: Option<ChannelPurpose>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelPurpose {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub real_name_normalized: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRecord {
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub reactions: Vec<ReactionRecord>,
}

#[derive(Debug, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub elements: Vec<RichTextElement>,
}

/// One node of the nested rich-text structure. The set of known kinds is
/// closed; anything else lands in [`RichTextElement::Unknown`] so newer
/// export formats degrade instead of failing.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichTextElement {
    Text {
        text: String,
        style: Option<TextStyle>,
    },
    RichTextSection {
        #[serde(default)]
        elements: Vec<RichTextElement>,
    },
    Link {
        url: String,
        text: Option<String>,
    },
    User {
        user_id: String,
    },
    Usergroup {
        #[serde(default)]
        usergroup_id: Option<String>,
    },
    Channel {
        channel_id: String,
    },
    Broadcast {
        #[serde(default)]
        range: Option<String>,
    },
    Emoji {
        name: String,
        #[serde(default)]
        unicode: Option<String>,
    },
    Color {
        value: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextStyle {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default)]
    pub italic: bool,
}

#[derive(Debug, Deserialize)]
pub struct FileRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mimetype: String,
    #[serde(default)]
    pub filetype: String,
    #[serde(default)]
    pub url_private: Option<String>,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReactionRecord {
    pub name: String,
    #[serde(default)]
    pub users: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_element_kind_deserializes_to_unknown() {
        let element: RichTextElement =
            serde_json::from_value(json!({"type": "crazy_new_thing", "payload": 1})).unwrap();
        assert!(matches!(element, RichTextElement::Unknown));
    }

    #[test]
    fn section_recurses_into_child_elements() {
        let element: RichTextElement = serde_json::from_value(json!({
            "type": "rich_text_section",
            "elements": [{"type": "text", "text": "hi"}]
        }))
        .unwrap();
        match element {
            RichTextElement::RichTextSection { elements } => assert_eq!(elements.len(), 1),
            other => panic!("unexpected element: {other:?}"),
        }
    }

    #[test]
    fn message_record_tolerates_missing_optionals() {
        let record: MessageRecord =
            serde_json::from_value(json!({"ts": "1610728529.000600"})).unwrap();
        assert!(record.thread_ts.is_none());
        assert!(record.blocks.is_empty());
        assert!(record.files.is_empty());
    }
}
