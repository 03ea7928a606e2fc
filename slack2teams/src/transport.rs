//! Decides how each attachment travels to the target and carries it there.
//!
//! Small raster images are embedded directly as hosted content; everything
//! else goes through a chunked upload session against the team drive.

use anyhow::{anyhow, Result};
use futures::StreamExt;
use log::{info, warn};
use reqwest::Client;

use crate::api::graph::GraphApi;
use crate::models::{Attachment, HostedContent};

/// Attachments strictly below this size can be embedded as hosted content.
pub const INLINE_MAX_BYTES: i64 = 4_100_000;

/// Mime types allowed on the hosted-content path.
const INLINE_MIME_TYPES: &[&str] = &["image/gif", "image/jpeg", "image/png"];

/// Upload slices must stay a multiple of this unit.
pub const UPLOAD_SLICE_UNIT: usize = 320 * 1024;

const UPLOAD_SLICE_SIZE: usize = 4 * UPLOAD_SLICE_UNIT;

pub fn is_inline_eligible(attachment: &Attachment) -> bool {
    attachment.size > 0
        && attachment.size < INLINE_MAX_BYTES
        && INLINE_MIME_TYPES.contains(&attachment.mime_type.as_str())
}

pub struct Transporter<'a, G> {
    graph: &'a G,
    http: Client,
    slack_token: Option<String>,
}

impl<'a, G: GraphApi> Transporter<'a, G> {
    pub fn new(graph: &'a G, slack_token: Option<String>) -> Self {
        Self {
            graph,
            http: Client::new(),
            slack_token,
        }
    }

    /// Resolves every attachment of one message to a hosted content or an
    /// uploaded drive item. A failed attachment is reported with its source
    /// url and left unresolved; the message itself always proceeds.
    pub async fn resolve_attachments(
        &self,
        team_id: &str,
        channel_folder: &str,
        attachments: &mut [Attachment],
    ) -> Vec<HostedContent> {
        let mut hosted = Vec::new();
        for attachment in attachments.iter_mut() {
            if is_inline_eligible(attachment) {
                match self.download(&attachment.url).await {
                    Ok(bytes) => {
                        let temp_id = (hosted.len() + 1).to_string();
                        hosted.push(HostedContent {
                            temp_id,
                            bytes,
                            content_type: attachment.mime_type.clone(),
                        });
                    }
                    Err(e) => warn!("cannot fetch attachment from {}: {e:#}", attachment.url),
                }
            } else if let Err(e) = self.upload(team_id, channel_folder, attachment).await {
                warn!("cannot upload attachment from {}: {e:#}", attachment.url);
            }
        }
        hosted
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut request = self.http.get(url);
        if let Some(token) = &self.slack_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("download failed with status {}", status));
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(bytes)
    }

    async fn upload(
        &self,
        team_id: &str,
        channel_folder: &str,
        attachment: &mut Attachment,
    ) -> Result<()> {
        let bytes = self.download(&attachment.url).await?;
        if bytes.is_empty() {
            return Err(anyhow!("source file is empty"));
        }

        attachment.name = sanitize_file_name(&attachment.name);
        let day = attachment
            .timestamp
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "undated".to_string());
        let path = format!("{}/{}/{}", channel_folder, day, attachment.name);

        let session = self.graph.create_upload_session(team_id, &path).await?;

        let total = bytes.len() as u64;
        let mut uploaded = None;
        for (index, slice) in bytes.chunks(UPLOAD_SLICE_SIZE).enumerate() {
            let start = (index * UPLOAD_SLICE_SIZE) as u64;
            let end = start + slice.len() as u64 - 1;
            uploaded = self
                .graph
                .upload_slice(&session.upload_url, slice.to_vec(), start, end, total)
                .await?;
        }

        let item = uploaded.ok_or_else(|| anyhow!("upload session ended without a drive item"))?;
        if item.content_id().is_none() {
            warn!("upload response for '{}' carries no content id", attachment.name);
        }
        attachment.content_id = item.content_id();
        attachment.content_url = Some(item.web_url);
        info!("uploaded {} to {}", attachment.name, path);
        Ok(())
    }
}

/// Drops characters the target drive rejects in file names.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '#' | '%' | '*' | '<' | '>' | '?' | ':' | '|' | '"' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(mime: &str, size: i64) -> Attachment {
        Attachment {
            url: "https://files.example.com/a".to_string(),
            name: "a".to_string(),
            mime_type: mime.to_string(),
            file_type: String::new(),
            size,
            timestamp: None,
            content_url: None,
            content_id: None,
        }
    }

    #[test]
    fn zero_and_negative_sizes_are_never_inline() {
        assert!(!is_inline_eligible(&attachment("image/png", 0)));
        assert!(!is_inline_eligible(&attachment("image/gif", -5)));
    }

    #[test]
    fn small_raster_images_are_inline() {
        assert!(is_inline_eligible(&attachment("image/png", 1)));
        assert!(is_inline_eligible(&attachment("image/png", 4_099_999)));
        assert!(is_inline_eligible(&attachment("image/jpeg", 2048)));
        assert!(is_inline_eligible(&attachment("image/gif", 2048)));
    }

    #[test]
    fn threshold_and_above_are_not_inline() {
        assert!(!is_inline_eligible(&attachment("image/png", INLINE_MAX_BYTES)));
        assert!(!is_inline_eligible(&attachment("image/png", INLINE_MAX_BYTES + 1)));
    }

    #[test]
    fn non_raster_mime_types_are_not_inline() {
        assert!(!is_inline_eligible(&attachment("application/pdf", 2048)));
        assert!(!is_inline_eligible(&attachment("video/mp4", 2048)));
    }

    #[test]
    fn slice_size_is_a_multiple_of_the_unit() {
        assert_eq!(UPLOAD_SLICE_SIZE % UPLOAD_SLICE_UNIT, 0);
    }

    #[test]
    fn file_names_lose_drive_hostile_characters() {
        assert_eq!(sanitize_file_name("a:b?c.png"), "a_b_c.png");
        assert_eq!(sanitize_file_name(" report #3.pdf "), "report _3.pdf");
    }
}
