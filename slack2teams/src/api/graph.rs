use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;

use crate::models::teams::{
    AttachmentPayload, ChatMessagePayload, DriveItem, GraphUser, ListEnvelope, PostedMessage,
    Team, TeamsChannel, UploadSession,
};

/// Everything the migration pipeline needs from the remote side.
#[async_trait]
pub trait GraphApi {
    async fn find_team(&self, name: &str) -> Result<Option<Team>>;
    async fn create_team(
        &self,
        name: &str,
        description: &str,
        created: Option<&str>,
    ) -> Result<String>;
    async fn list_channels(&self, team_id: &str) -> Result<Vec<TeamsChannel>>;
    async fn create_channel(
        &self,
        team_id: &str,
        name: &str,
        description: &str,
        created: Option<&str>,
    ) -> Result<TeamsChannel>;
    async fn complete_channel_migration(&self, team_id: &str, channel_id: &str) -> Result<()>;
    async fn complete_team_migration(&self, team_id: &str) -> Result<()>;
    async fn add_team_owner(&self, team_id: &str, user_id: &str) -> Result<()>;
    async fn find_user_by_principal(&self, principal: &str) -> Result<Option<GraphUser>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<GraphUser>>;
    async fn find_user_by_display_name(&self, name: &str) -> Result<Option<GraphUser>>;
    async fn post_message(
        &self,
        team_id: &str,
        channel_id: &str,
        message: &ChatMessagePayload,
    ) -> Result<PostedMessage>;
    async fn post_reply(
        &self,
        team_id: &str,
        channel_id: &str,
        message_id: &str,
        reply: &ChatMessagePayload,
    ) -> Result<PostedMessage>;
    async fn create_upload_session(&self, team_id: &str, path: &str) -> Result<UploadSession>;
    async fn upload_slice(
        &self,
        upload_url: &str,
        bytes: Vec<u8>,
        start: u64,
        end: u64,
        total: u64,
    ) -> Result<Option<DriveItem>>;
    async fn update_message_attachments(
        &self,
        team_id: &str,
        channel_id: &str,
        message_id: &str,
        attachments: &[AttachmentPayload],
    ) -> Result<()>;
}

pub struct GraphClient {
    client: Client,
    base_url: String,
}

impl GraphClient {
    pub fn new(base_url: String, token: String) -> Result<Self> {
        if token.trim().is_empty() {
            bail!("Graph access token is missing, set --graph-token or GRAPH_TOKEN");
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token))
                .context("Graph token contains invalid header characters")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .default_headers(headers)
            .build()
            .context("cannot build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn find_user_filtered(&self, filter: String) -> Result<Option<GraphUser>> {
        let url = format!("{}/users", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("$filter", filter.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "user lookup failed with status {}: {}",
                status,
                error_text
            ));
        }

        let found: ListEnvelope<GraphUser> = response.json().await?;
        Ok(found.value.into_iter().next())
    }
}

/// Escapes a value for use inside a `$filter` string literal.
fn filter_quote(value: &str) -> String {
    value.replace('\'', "''")
}

/// The create-team response carries the new id in its `Location` header,
/// shaped like `/teams('{id}')/operations('{op}')`.
fn parse_team_id(location: &str) -> Result<String> {
    let marker = "teams('";
    let start = location
        .find(marker)
        .map(|i| i + marker.len())
        .ok_or_else(|| anyhow!("unexpected location header: {location}"))?;
    let end = location[start..]
        .find("')")
        .map(|i| start + i)
        .ok_or_else(|| anyhow!("unexpected location header: {location}"))?;
    Ok(location[start..end].to_string())
}

#[async_trait]
impl GraphApi for GraphClient {
    async fn find_team(&self, name: &str) -> Result<Option<Team>> {
        let url = format!("{}/groups", self.base_url);
        let filter = format!("displayName eq '{}'", filter_quote(name));
        let response = self
            .client
            .get(&url)
            .query(&[("$filter", filter.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "cannot search teams with status {}: {}",
                status,
                error_text
            ));
        }

        let found: ListEnvelope<Team> = response.json().await?;
        Ok(found.value.into_iter().next())
    }

    async fn create_team(
        &self,
        name: &str,
        description: &str,
        created: Option<&str>,
    ) -> Result<String> {
        let url = format!("{}/teams", self.base_url);
        let body = serde_json::json!({
            "template@odata.bind":
                "https://graph.microsoft.com/v1.0/teamsTemplates('standard')",
            "displayName": name,
            "description": description,
            "teamCreationMode": "migration",
            "createdDateTime": created.unwrap_or("2020-01-01T00:00:00.000Z"),
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "cannot create team with status {}: {}",
                status,
                error_text
            ));
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| anyhow!("create team response carries no location header"))?;
        parse_team_id(location)
    }

    async fn list_channels(&self, team_id: &str) -> Result<Vec<TeamsChannel>> {
        let url = format!("{}/teams/{}/channels", self.base_url, team_id);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "cannot list channels with status {}: {}",
                status,
                error_text
            ));
        }

        let found: ListEnvelope<TeamsChannel> = response.json().await?;
        Ok(found.value)
    }

    async fn create_channel(
        &self,
        team_id: &str,
        name: &str,
        description: &str,
        created: Option<&str>,
    ) -> Result<TeamsChannel> {
        let url = format!("{}/teams/{}/channels", self.base_url, team_id);
        let body = serde_json::json!({
            "@microsoft.graph.channelCreationMode": "migration",
            "displayName": name,
            "description": description,
            "membershipType": "standard",
            "createdDateTime": created.unwrap_or("2020-01-01T00:00:00.000Z"),
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "cannot create channel '{}' with status {}: {}",
                name,
                status,
                error_text
            ));
        }

        let channel: TeamsChannel = response.json().await?;
        Ok(channel)
    }

    async fn complete_channel_migration(&self, team_id: &str, channel_id: &str) -> Result<()> {
        let url = format!(
            "{}/teams/{}/channels/{}/completeMigration",
            self.base_url, team_id, channel_id
        );
        let response = self.client.post(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "cannot complete channel migration with status {}: {}",
                status,
                error_text
            ));
        }
        Ok(())
    }

    async fn complete_team_migration(&self, team_id: &str) -> Result<()> {
        let url = format!("{}/teams/{}/completeMigration", self.base_url, team_id);
        let response = self.client.post(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "cannot complete team migration with status {}: {}",
                status,
                error_text
            ));
        }
        Ok(())
    }

    async fn add_team_owner(&self, team_id: &str, user_id: &str) -> Result<()> {
        let url = format!("{}/teams/{}/members", self.base_url, team_id);
        let body = serde_json::json!({
            "@odata.type": "#microsoft.graph.aadUserConversationMember",
            "roles": ["owner"],
            "user@odata.bind":
                format!("https://graph.microsoft.com/v1.0/users('{}')", user_id),
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "cannot assign owner with status {}: {}",
                status,
                error_text
            ));
        }
        Ok(())
    }

    async fn find_user_by_principal(&self, principal: &str) -> Result<Option<GraphUser>> {
        let url = format!("{}/users/{}", self.base_url, principal);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "user lookup failed with status {}: {}",
                status,
                error_text
            ));
        }

        Ok(Some(response.json().await?))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<GraphUser>> {
        self.find_user_filtered(format!("mail eq '{}'", filter_quote(email)))
            .await
    }

    async fn find_user_by_display_name(&self, name: &str) -> Result<Option<GraphUser>> {
        self.find_user_filtered(format!("displayName eq '{}'", filter_quote(name)))
            .await
    }

    async fn post_message(
        &self,
        team_id: &str,
        channel_id: &str,
        message: &ChatMessagePayload,
    ) -> Result<PostedMessage> {
        let url = format!(
            "{}/teams/{}/channels/{}/messages",
            self.base_url, team_id, channel_id
        );
        let response = self.client.post(&url).json(message).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "cannot post message with status {}: {}",
                status,
                error_text
            ));
        }

        let posted: PostedMessage = response.json().await?;
        Ok(posted)
    }

    async fn post_reply(
        &self,
        team_id: &str,
        channel_id: &str,
        message_id: &str,
        reply: &ChatMessagePayload,
    ) -> Result<PostedMessage> {
        let url = format!(
            "{}/teams/{}/channels/{}/messages/{}/replies",
            self.base_url, team_id, channel_id, message_id
        );
        let response = self.client.post(&url).json(reply).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "cannot post reply with status {}: {}",
                status,
                error_text
            ));
        }

        let posted: PostedMessage = response.json().await?;
        Ok(posted)
    }

    async fn create_upload_session(&self, team_id: &str, path: &str) -> Result<UploadSession> {
        let url = format!(
            "{}/groups/{}/drive/root:/{}:/createUploadSession",
            self.base_url, team_id, path
        );
        let body = serde_json::json!({
            "item": {"@microsoft.graph.conflictBehavior": "replace"}
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "cannot create upload session for '{}' with status {}: {}",
                path,
                status,
                error_text
            ));
        }

        let session: UploadSession = response.json().await?;
        Ok(session)
    }

    async fn upload_slice(
        &self,
        upload_url: &str,
        bytes: Vec<u8>,
        start: u64,
        end: u64,
        total: u64,
    ) -> Result<Option<DriveItem>> {
        let response = self
            .client
            .put(upload_url)
            .header(header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, total))
            .header(header::CONTENT_LENGTH, bytes.len())
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "upload slice failed with status {}: {}",
                status,
                error_text
            ));
        }

        // Intermediate slices come back 202 with the next expected range,
        // only the final slice yields the drive item.
        if status == StatusCode::ACCEPTED {
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }

    async fn update_message_attachments(
        &self,
        team_id: &str,
        channel_id: &str,
        message_id: &str,
        attachments: &[AttachmentPayload],
    ) -> Result<()> {
        let url = format!(
            "{}/teams/{}/channels/{}/messages/{}",
            self.base_url, team_id, channel_id, message_id
        );
        let body = serde_json::json!({"attachments": attachments});

        let response = self.client.patch(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "cannot update message attachments with status {}: {}",
                status,
                error_text
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_id_is_parsed_from_the_location_header() {
        let location = "/teams('0fddfdc5-f9b5-44e6-b80c-2a0aafc99c3f')/operations('abc')";
        assert_eq!(
            parse_team_id(location).unwrap(),
            "0fddfdc5-f9b5-44e6-b80c-2a0aafc99c3f"
        );
    }

    #[test]
    fn unexpected_location_header_is_an_error() {
        assert!(parse_team_id("/groups/123").is_err());
    }

    #[test]
    fn missing_token_fails_client_construction() {
        assert!(GraphClient::new("https://graph.microsoft.com/v1.0".to_string(), "  ".to_string())
            .is_err());
    }

    #[test]
    fn filter_values_escape_single_quotes() {
        assert_eq!(filter_quote("O'Brien"), "O''Brien");
    }
}
