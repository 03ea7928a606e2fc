//! Side HTML export of everything the pipeline processed.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::format::escape_html;
use crate::models::Message;

const HEADER: &str = "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"></head>\n<body>\n";
const FOOTER: &str = "</body>\n</html>\n";

/// Writes one transcript file per processed message file, one `<div>` per
/// non-empty message, bracketed by a fixed header and footer.
pub struct TranscriptWriter {
    file: File,
}

impl TranscriptWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let mut file = File::create(path)
            .with_context(|| format!("cannot create transcript {}", path.display()))?;
        file.write_all(HEADER.as_bytes())
            .with_context(|| format!("cannot write transcript {}", path.display()))?;
        Ok(Self { file })
    }

    pub fn append(&mut self, message: &Message) -> Result<()> {
        if message.html.is_empty() {
            return Ok(());
        }
        let sender = message
            .sender
            .as_ref()
            .map(|u| u.display_name.as_str())
            .unwrap_or("unknown");
        writeln!(
            self.file,
            "<div><b>{}</b> [{}]<br>{}</div>",
            escape_html(sender),
            message.ts,
            message.html
        )
        .context("cannot append to transcript")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.file
            .write_all(FOOTER.as_bytes())
            .context("cannot finish transcript")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(html: &str) -> Message {
        Message {
            sender: None,
            ts: "1610728529.000600".to_string(),
            thread_ts: None,
            when: Utc.timestamp_opt(1610728529, 0).single().unwrap(),
            html: html.to_string(),
            attachments: vec![],
            mentions: vec![],
            reactions: vec![],
            hosted_contents: vec![],
        }
    }

    #[test]
    fn transcript_brackets_divs_with_header_and_footer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2021-01-15.html");

        let mut writer = TranscriptWriter::create(&path).unwrap();
        writer.append(&message("hello")).unwrap();
        writer.append(&message("")).unwrap();
        writer.finish().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with(HEADER));
        assert!(written.ends_with(FOOTER));
        assert_eq!(written.matches("<div>").count(), 1);
        assert!(written.contains("hello"));
    }
}
