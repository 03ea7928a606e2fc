//! Transforms a message's rich-text block structure into Teams HTML.
//!
//! The walker dispatches on the element kind and appends to an output
//! buffer. Mentions and reactions are side channels of the transformation
//! and come back as explicit values in [`FormatOutput`].

use log::{debug, warn};

use crate::emoji;
use crate::identity::{ChannelDirectory, UserDirectory};
use crate::models::slack::{MessageRecord, RichTextElement, TextStyle};
use crate::models::{Mention, Reaction};

pub struct FormatOutput {
    pub html: String,
    pub mentions: Vec<Mention>,
    pub reactions: Vec<Reaction>,
}

pub fn format_message(
    record: &MessageRecord,
    channels: &ChannelDirectory,
    users: &UserDirectory,
) -> FormatOutput {
    let mut mentions = Vec::new();

    let html = match record.subtype.as_deref() {
        Some("bot_message") => format_bot_message(record),
        Some("channel_join") => format_channel_join(record, users),
        _ => {
            if record.blocks.iter().any(|b| !b.elements.is_empty()) {
                let mut html = String::new();
                for block in &record.blocks {
                    walk_elements(&block.elements, &mut html, &mut mentions, channels, users);
                }
                html
            } else {
                escape_html(&record.text)
            }
        }
    };

    let reactions = collect_reactions(record, users);

    FormatOutput {
        html,
        mentions,
        reactions,
    }
}

fn walk_elements(
    elements: &[RichTextElement],
    out: &mut String,
    mentions: &mut Vec<Mention>,
    channels: &ChannelDirectory,
    users: &UserDirectory,
) {
    for element in elements {
        match element {
            RichTextElement::Text { text, style } => {
                out.push_str(&styled_text(text, style.as_ref()));
            }
            RichTextElement::RichTextSection { elements } => {
                out.push_str("<br>• ");
                walk_elements(elements, out, mentions, channels, users);
            }
            RichTextElement::Link { url, text } => {
                let label = text.as_deref().unwrap_or(url);
                out.push_str(&format!(
                    "<a href=\"{}\">{}</a>",
                    url,
                    escape_html(label)
                ));
            }
            RichTextElement::User { user_id } => match users.find(user_id) {
                Some(user) if user.teams_id.is_some() => {
                    let id = mentions.len();
                    out.push_str(&format!(
                        "<at id=\"{}\">{}</at>",
                        id,
                        escape_html(&user.display_name)
                    ));
                    mentions.push(Mention {
                        id,
                        text: user.display_name.clone(),
                        user: user.clone(),
                    });
                }
                Some(user) => out.push_str(&format!("[{}]", escape_html(&user.display_name))),
                None => out.push_str(&format!("[{}]", escape_html(user_id))),
            },
            RichTextElement::Usergroup { .. } => out.push_str("[user group]"),
            RichTextElement::Channel { channel_id } => {
                let name = channels.display_name(channel_id).unwrap_or("unknown channel");
                out.push_str(&format!("[{}]", escape_html(name)));
            }
            RichTextElement::Broadcast { .. } => out.push_str("[broadcast]"),
            RichTextElement::Emoji { name: _, unicode } => {
                if let Some(code) = unicode {
                    for point in code.split('-') {
                        out.push_str(&format!("&#x{};", point.to_ascii_uppercase()));
                    }
                }
            }
            RichTextElement::Color { value } => {
                out.push_str(&format!("[{}]", escape_html(value)));
            }
            RichTextElement::Unknown => {
                warn!("skipping unrecognized rich text element");
            }
        }
    }
}

/// First true style flag wins, flags are not combined.
fn styled_text(text: &str, style: Option<&TextStyle>) -> String {
    let escaped = escape_html(text);
    match style {
        Some(style) if style.bold => format!("<strong>{escaped}</strong>"),
        Some(style) if style.code => format!("<code>{escaped}</code>"),
        Some(style) if style.italic => format!("<em>{escaped}</em>"),
        _ => escaped,
    }
}

fn format_bot_message(record: &MessageRecord) -> String {
    let name = record.username.as_deref().unwrap_or("bot");
    format!(
        "<strong>{}</strong>: {}",
        escape_html(name),
        escape_html(&record.text)
    )
}

fn format_channel_join(record: &MessageRecord, users: &UserDirectory) -> String {
    let name = record
        .user
        .as_deref()
        .and_then(|id| users.find(id))
        .map(|u| u.display_name.clone())
        .unwrap_or_else(|| "A member".to_string());
    format!("<em>{} has joined the channel</em>", escape_html(&name))
}

fn collect_reactions(record: &MessageRecord, users: &UserDirectory) -> Vec<Reaction> {
    let mut reactions = Vec::new();
    for entry in &record.reactions {
        let emoji = emoji::map_shortcode(&entry.name);
        for reactor in &entry.users {
            match users.find(reactor) {
                Some(user) if user.teams_id.is_some() => reactions.push(Reaction {
                    emoji: emoji.clone(),
                    user: user.clone(),
                    when: None,
                }),
                _ => debug!(
                    "dropping reaction '{}' from unresolved user {}",
                    entry.name, reactor
                ),
            }
        }
    }
    reactions
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::slackbot;
    use crate::models::User;
    use serde_json::json;

    fn directories(users: Vec<User>) -> (ChannelDirectory, UserDirectory) {
        (
            ChannelDirectory::new(&[]),
            UserDirectory::new(users, slackbot()),
        )
    }

    fn user(id: &str, name: &str, teams_id: Option<&str>) -> User {
        User {
            display_name: name.to_string(),
            email: None,
            slack_id: id.to_string(),
            teams_id: teams_id.map(str::to_string),
            is_bot: false,
        }
    }

    fn record(value: serde_json::Value) -> MessageRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn resolved_user_becomes_a_numbered_mention() {
        let (channels, users) = directories(vec![user("U1", "Ann", Some("T1"))]);
        let record = record(json!({
            "ts": "1610728529.000600",
            "blocks": [{"type": "rich_text", "elements": [
                {"type": "text", "text": "hi"},
                {"type": "user", "user_id": "U1"}
            ]}]
        }));
        let output = format_message(&record, &channels, &users);
        assert_eq!(output.html, "hi<at id=\"0\">Ann</at>");
        assert_eq!(output.mentions.len(), 1);
        assert_eq!(output.mentions[0].text, "Ann");
    }

    #[test]
    fn unresolved_user_renders_bracketed_without_a_mention() {
        let (channels, users) = directories(vec![user("U1", "Ann", None)]);
        let record = record(json!({
            "ts": "1",
            "blocks": [{"type": "rich_text", "elements": [
                {"type": "user", "user_id": "U1"},
                {"type": "user", "user_id": "U404"}
            ]}]
        }));
        let output = format_message(&record, &channels, &users);
        assert_eq!(output.html, "[Ann][U404]");
        assert!(output.mentions.is_empty());
    }

    #[test]
    fn mention_ids_number_sequentially_per_message() {
        let (channels, users) = directories(vec![
            user("U1", "Ann", Some("T1")),
            user("U2", "Ben", Some("T2")),
        ]);
        let record = record(json!({
            "ts": "1",
            "blocks": [{"type": "rich_text", "elements": [
                {"type": "user", "user_id": "U1"},
                {"type": "user", "user_id": "U2"}
            ]}]
        }));
        let output = format_message(&record, &channels, &users);
        assert_eq!(output.html, "<at id=\"0\">Ann</at><at id=\"1\">Ben</at>");
        assert_eq!(output.mentions[1].id, 1);
    }

    #[test]
    fn first_true_style_flag_wins() {
        let (channels, users) = directories(vec![]);
        let record = record(json!({
            "ts": "1",
            "blocks": [{"type": "rich_text", "elements": [
                {"type": "text", "text": "x", "style": {"bold": true, "italic": true}}
            ]}]
        }));
        let output = format_message(&record, &channels, &users);
        assert_eq!(output.html, "<strong>x</strong>");
    }

    #[test]
    fn section_emits_break_and_bullet_before_children() {
        let (channels, users) = directories(vec![]);
        let record = record(json!({
            "ts": "1",
            "blocks": [{"type": "rich_text", "elements": [
                {"type": "rich_text_section", "elements": [{"type": "text", "text": "item"}]}
            ]}]
        }));
        let output = format_message(&record, &channels, &users);
        assert_eq!(output.html, "<br>• item");
    }

    #[test]
    fn link_without_text_uses_the_url_as_label() {
        let (channels, users) = directories(vec![]);
        let record = record(json!({
            "ts": "1",
            "blocks": [{"type": "rich_text", "elements": [
                {"type": "link", "url": "https://example.com"}
            ]}]
        }));
        let output = format_message(&record, &channels, &users);
        assert_eq!(
            output.html,
            "<a href=\"https://example.com\">https://example.com</a>"
        );
    }

    #[test]
    fn channel_reference_defaults_to_unknown_label() {
        let (_, users) = directories(vec![]);
        let channels = ChannelDirectory::new(&[]);
        let record = record(json!({
            "ts": "1",
            "blocks": [{"type": "rich_text", "elements": [
                {"type": "channel", "channel_id": "C404"}
            ]}]
        }));
        let output = format_message(&record, &channels, &users);
        assert_eq!(output.html, "[unknown channel]");
    }

    #[test]
    fn emoji_nodes_emit_escaped_code_points() {
        let (channels, users) = directories(vec![]);
        let record = record(json!({
            "ts": "1",
            "blocks": [{"type": "rich_text", "elements": [
                {"type": "emoji", "name": "flag-ac", "unicode": "1f1e6-1f1e8"},
                {"type": "emoji", "name": "mystery"}
            ]}]
        }));
        let output = format_message(&record, &channels, &users);
        assert_eq!(output.html, "&#x1F1E6;&#x1F1E8;");
    }

    #[test]
    fn unknown_elements_emit_nothing() {
        let (channels, users) = directories(vec![]);
        let record = record(json!({
            "ts": "1",
            "blocks": [{"type": "rich_text", "elements": [
                {"type": "text", "text": "a"},
                {"type": "brand_new_widget", "data": 42},
                {"type": "text", "text": "b"}
            ]}]
        }));
        let output = format_message(&record, &channels, &users);
        assert_eq!(output.html, "ab");
    }

    #[test]
    fn plain_text_fallback_is_escaped() {
        let (channels, users) = directories(vec![]);
        let record = record(json!({"ts": "1", "text": "a < b & c"}));
        let output = format_message(&record, &channels, &users);
        assert_eq!(output.html, "a &lt; b &amp; c");
    }

    #[test]
    fn bot_message_subtype_uses_fixed_markup() {
        let (channels, users) = directories(vec![]);
        let record = record(json!({
            "ts": "1",
            "subtype": "bot_message",
            "username": "deploybot",
            "text": "build passed",
            "blocks": [{"type": "rich_text", "elements": [{"type": "text", "text": "ignored"}]}]
        }));
        let output = format_message(&record, &channels, &users);
        assert_eq!(output.html, "<strong>deploybot</strong>: build passed");
    }

    #[test]
    fn channel_join_subtype_names_the_member() {
        let (channels, users) = directories(vec![user("U1", "Ann", None)]);
        let record = record(json!({"ts": "1", "subtype": "channel_join", "user": "U1"}));
        let output = format_message(&record, &channels, &users);
        assert_eq!(output.html, "<em>Ann has joined the channel</em>");
    }

    #[test]
    fn reactions_are_kept_only_for_resolved_reactors() {
        let (channels, users) = directories(vec![
            user("U1", "Ann", Some("T1")),
            user("U2", "Ben", None),
        ]);
        let record = record(json!({
            "ts": "1",
            "text": "hello",
            "reactions": [{"name": "+1", "users": ["U1", "U2", "U404"]}]
        }));
        let output = format_message(&record, &channels, &users);
        assert_eq!(output.reactions.len(), 1);
        assert_eq!(output.reactions[0].emoji, "👍");
        assert_eq!(output.reactions[0].user.display_name, "Ann");
    }
}
