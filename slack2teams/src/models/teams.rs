//! Graph-side payloads and responses.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::models::{Attachment, HostedContent, Mention, Message, Reaction, User};

#[derive(Debug, Clone, Deserialize)]
pub struct Team {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamsChannel {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphUser {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
}

/// Collection envelope Graph wraps around list responses.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ListEnvelope<T> {
    #[serde(default)]
    pub value: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct UploadSession {
    #[serde(rename = "uploadUrl")]
    pub upload_url: String,
}

#[derive(Debug, Deserialize)]
pub struct DriveItem {
    #[serde(rename = "webUrl")]
    pub web_url: String,
    #[serde(rename = "eTag", default)]
    pub e_tag: String,
}

impl DriveItem {
    /// Content identifier carried inside the braces of the eTag.
    pub fn content_id(&self) -> Option<String> {
        let start = self.e_tag.find('{')? + 1;
        let end = self.e_tag.find('}')?;
        (start < end).then(|| self.e_tag[start..end].to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct PostedMessage {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    pub created_date_time: String,
    /// Stable key derived from the source timestamp, so the receiving side
    /// can detect a resubmission of the same message.
    pub client_message_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<IdentitySet>,
    pub body: ItemBody,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<MentionPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<ReactionPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hosted_contents: Vec<HostedContentPayload>,
}

impl ChatMessagePayload {
    pub fn from_message(message: &Message) -> Self {
        let mut content = message.html.clone();
        for hosted in &message.hosted_contents {
            content.push_str(&format!(
                "<img src=\"../hostedContents/{}/$value\">",
                hosted.temp_id
            ));
        }
        let created = message
            .when
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        Self {
            client_message_key: message.message_key(),
            from: message.sender.as_ref().map(IdentitySet::from_user),
            body: ItemBody {
                content_type: "html".to_string(),
                content,
            },
            mentions: message.mentions.iter().map(MentionPayload::from_mention).collect(),
            reactions: message
                .reactions
                .iter()
                .map(|r| ReactionPayload::from_reaction(r, &created))
                .collect(),
            hosted_contents: message
                .hosted_contents
                .iter()
                .map(HostedContentPayload::from_hosted)
                .collect(),
            created_date_time: created,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct IdentitySet {
    pub user: UserIdentity,
}

impl IdentitySet {
    pub fn from_user(user: &User) -> Self {
        Self {
            user: UserIdentity {
                id: user.teams_id.clone(),
                display_name: user.display_name.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionPayload {
    pub id: usize,
    pub mention_text: String,
    pub mentioned: IdentitySet,
}

impl MentionPayload {
    pub fn from_mention(mention: &Mention) -> Self {
        Self {
            id: mention.id,
            mention_text: mention.text.clone(),
            mentioned: IdentitySet::from_user(&mention.user),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionPayload {
    pub reaction_type: String,
    pub created_date_time: String,
    pub user: IdentitySet,
}

impl ReactionPayload {
    /// Reaction events carry no timestamp of their own in the export, so
    /// the message instant stands in.
    pub fn from_reaction(reaction: &Reaction, message_created: &str) -> Self {
        Self {
            reaction_type: reaction.emoji.clone(),
            created_date_time: reaction
                .when
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_else(|| message_created.to_string()),
            user: IdentitySet::from_user(&reaction.user),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedContentPayload {
    #[serde(rename = "@microsoft.graph.temporaryId")]
    pub temporary_id: String,
    pub content_bytes: String,
    pub content_type: String,
}

impl HostedContentPayload {
    pub fn from_hosted(hosted: &HostedContent) -> Self {
        Self {
            temporary_id: hosted.temp_id.clone(),
            content_bytes: BASE64.encode(&hosted.bytes),
            content_type: hosted.content_type.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentPayload {
    pub id: String,
    pub content_type: String,
    pub content_url: String,
    pub name: String,
}

impl AttachmentPayload {
    /// Only attachments that completed the upload path have both halves of
    /// the content reference; the rest are left out of the submission.
    pub fn from_attachment(attachment: &Attachment) -> Option<Self> {
        Some(Self {
            id: attachment.content_id.clone()?,
            content_type: "reference".to_string(),
            content_url: attachment.content_url.clone()?,
            name: attachment.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn content_id_comes_from_the_etag_braces() {
        let item = DriveItem {
            web_url: "https://example.sharepoint.com/f.bin".to_string(),
            e_tag: "\"{5B33A61F-9F67-40E2-A69C-165B9665A3B3},2\"".to_string(),
        };
        assert_eq!(
            item.content_id().as_deref(),
            Some("5B33A61F-9F67-40E2-A69C-165B9665A3B3")
        );
    }

    #[test]
    fn content_id_is_none_without_braces() {
        let item = DriveItem {
            web_url: String::new(),
            e_tag: "\"plain\"".to_string(),
        };
        assert!(item.content_id().is_none());
    }

    #[test]
    fn payload_uses_graph_field_names() {
        let message = Message {
            sender: None,
            ts: "1610728529.000600".to_string(),
            thread_ts: None,
            when: Utc.timestamp_opt(1610728529, 0).single().unwrap(),
            html: "hi".to_string(),
            attachments: vec![],
            mentions: vec![],
            reactions: vec![],
            hosted_contents: vec![HostedContent {
                temp_id: "1".to_string(),
                bytes: vec![1, 2, 3],
                content_type: "image/png".to_string(),
            }],
        };
        let value = serde_json::to_value(ChatMessagePayload::from_message(&message)).unwrap();
        assert!(value.get("createdDateTime").is_some());
        assert_eq!(value["body"]["contentType"], "html");
        assert_eq!(
            value["hostedContents"][0]["@microsoft.graph.temporaryId"],
            "1"
        );
        assert_eq!(
            value["body"]["content"],
            "hi<img src=\"../hostedContents/1/$value\">"
        );
    }
}
