pub mod slack;
pub mod teams;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::slack::{ChannelRecord, FileRecord, UserRecord};

/// A conversation container parsed from the channel listing.
#[derive(Debug, Clone)]
pub struct Channel {
    pub display_name: String,
    pub description: String,
    pub created: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub slack_id: String,
    pub creator_id: String,
    /// Folder name inside the archive, the raw export channel name.
    pub folder: String,
}

impl From<ChannelRecord> for Channel {
    fn from(record: ChannelRecord) -> Self {
        Self {
            display_name: title_case(&record.name),
            description: record.purpose.map(|p| p.value).unwrap_or_default(),
            created: record.created.and_then(|t| Utc.timestamp_opt(t, 0).single()),
            is_archived: record.is_archived,
            slack_id: record.id,
            creator_id: record.creator.unwrap_or_default(),
            folder: record.name,
        }
    }
}

/// A participant, human or bot. `teams_id` stays `None` until the identity
/// resolver finds a matching account on the target side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub display_name: String,
    pub email: Option<String>,
    pub slack_id: String,
    pub teams_id: Option<String>,
    pub is_bot: bool,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        let profile = record.profile.unwrap_or_default();
        let display_name = profile
            .real_name_normalized
            .filter(|n| !n.is_empty())
            .or(record.name)
            .unwrap_or_else(|| record.id.clone());
        Self {
            display_name,
            email: if record.is_bot { None } else { profile.email },
            slack_id: record.id,
            teams_id: None,
            is_bot: record.is_bot,
        }
    }
}

/// A single timestamped post, fully transformed and ready for submission.
#[derive(Debug, Clone)]
pub struct Message {
    pub sender: Option<User>,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub when: DateTime<Utc>,
    pub html: String,
    pub attachments: Vec<Attachment>,
    pub mentions: Vec<Mention>,
    pub reactions: Vec<Reaction>,
    pub hosted_contents: Vec<HostedContent>,
}

impl Message {
    pub fn is_in_thread(&self) -> bool {
        self.thread_ts.is_some()
    }

    pub fn is_thread_root(&self) -> bool {
        self.thread_ts.as_deref() == Some(self.ts.as_str())
    }

    /// Join key used to address replies: derived from the thread timestamp,
    /// falling back to the message's own.
    pub fn thread_key(&self) -> String {
        derive_message_key(self.thread_ts.as_deref().unwrap_or(&self.ts))
    }

    pub fn message_key(&self) -> String {
        derive_message_key(&self.ts)
    }
}

/// First 13 digits of a source timestamp with separators stripped, which is
/// the millisecond instant Slack encodes in `ts`.
pub fn derive_message_key(ts: &str) -> String {
    ts.chars().filter(char::is_ascii_digit).take(13).collect()
}

/// Parses a Slack `ts` value ("1610728529.000600") into an instant.
pub fn parse_ts(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = match ts.split_once('.') {
        Some((s, f)) => (s, f),
        None => (ts, ""),
    };
    let secs = secs.parse::<i64>().ok()?;
    let mut digits: String = frac.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.truncate(6);
    while digits.len() < 6 {
        digits.push('0');
    }
    let micros = digits.parse::<u32>().ok()?;
    Utc.timestamp_opt(secs, micros * 1000).single()
}

/// Channel display names are title-cased per word, splitting on the
/// separators Slack allows in channel names.
pub fn title_case(name: &str) -> String {
    name.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A file referenced by a message. The transport step fills in the target
/// content reference and may rewrite the name.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub url: String,
    pub name: String,
    pub mime_type: String,
    pub file_type: String,
    pub size: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub content_url: Option<String>,
    pub content_id: Option<String>,
}

impl Attachment {
    /// Returns `None` for entries without a source url, e.g. tombstoned
    /// files the exporter could no longer reach.
    pub fn from_record(record: &FileRecord) -> Option<Self> {
        let url = record.url_private.clone()?;
        Some(Self {
            url,
            name: record.name.clone().unwrap_or_else(|| "unnamed".to_string()),
            mime_type: record.mimetype.clone(),
            file_type: record.filetype.clone(),
            size: record.size,
            timestamp: record.timestamp.and_then(|t| Utc.timestamp_opt(t, 0).single()),
            content_url: None,
            content_id: None,
        })
    }
}

/// A numbered mention placeholder emitted into the message body.
#[derive(Debug, Clone)]
pub struct Mention {
    pub id: usize,
    pub text: String,
    pub user: User,
}

/// One emoji reaction event, kept only for reactors with a target identity.
#[derive(Debug, Clone)]
pub struct Reaction {
    pub emoji: String,
    pub user: User,
    pub when: Option<DateTime<Utc>>,
}

/// Raster content small enough to embed directly into the posted message.
#[derive(Debug, Clone)]
pub struct HostedContent {
    pub temp_id: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(ts: &str, thread_ts: Option<&str>) -> Message {
        Message {
            sender: None,
            ts: ts.to_string(),
            thread_ts: thread_ts.map(str::to_string),
            when: Utc.timestamp_opt(0, 0).single().unwrap(),
            html: String::new(),
            attachments: vec![],
            mentions: vec![],
            reactions: vec![],
            hosted_contents: vec![],
        }
    }

    #[test]
    fn thread_root_is_also_in_thread() {
        let msg = message("1610728529.000600", Some("1610728529.000600"));
        assert!(msg.is_in_thread());
        assert!(msg.is_thread_root());
    }

    #[test]
    fn reply_is_in_thread_but_not_root() {
        let msg = message("1610728599.000100", Some("1610728529.000600"));
        assert!(msg.is_in_thread());
        assert!(!msg.is_thread_root());
    }

    #[test]
    fn top_level_message_is_not_in_thread() {
        let msg = message("1610728529.000600", None);
        assert!(!msg.is_in_thread());
        assert!(!msg.is_thread_root());
    }

    #[test]
    fn message_key_is_first_13_digits_without_separator() {
        assert_eq!(derive_message_key("1610728529.000600"), "1610728529000");
    }

    #[test]
    fn thread_key_falls_back_to_own_timestamp() {
        let msg = message("1610728529.000600", None);
        assert_eq!(msg.thread_key(), "1610728529000");
        let reply = message("1610728599.000100", Some("1610728529.000600"));
        assert_eq!(reply.thread_key(), "1610728529000");
    }

    #[test]
    fn parse_ts_keeps_microsecond_fraction() {
        let when = parse_ts("1610728529.000600").unwrap();
        assert_eq!(when.timestamp(), 1610728529);
        assert_eq!(when.timestamp_subsec_micros(), 600);
    }

    #[test]
    fn parse_ts_rejects_garbage() {
        assert!(parse_ts("not-a-timestamp").is_none());
    }

    #[test]
    fn title_case_normalizes_channel_names() {
        assert_eq!(title_case("general"), "General");
        assert_eq!(title_case("dev-ops"), "Dev Ops");
        assert_eq!(title_case("team_updates"), "Team Updates");
    }
}
