//! User and channel directories plus Teams identity resolution.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::api::graph::GraphApi;
use crate::archive;
use crate::models::slack::{ChannelRecord, UserRecord};
use crate::models::{Channel, User};

/// Sender id Slack uses for its own system messages. It never appears in
/// the user listing, so lookups for it need a synthetic identity.
pub const SLACKBOT_ID: &str = "USLACKBOT";

/// Builds the synthetic system-bot identity. Constructed once at startup
/// and injected into [`UserDirectory::new`].
pub fn slackbot() -> User {
    User {
        display_name: "Slack Bot".to_string(),
        email: None,
        slack_id: SLACKBOT_ID.to_string(),
        teams_id: None,
        is_bot: true,
    }
}

pub struct UserDirectory {
    by_id: HashMap<String, User>,
    system_bot: User,
}

impl UserDirectory {
    pub fn new(users: Vec<User>, system_bot: User) -> Self {
        let by_id = users.into_iter().map(|u| (u.slack_id.clone(), u)).collect();
        Self { by_id, system_bot }
    }

    /// Pure lookup by source id. The system-bot id always resolves, even
    /// when absent from the table.
    pub fn find(&self, slack_id: &str) -> Option<&User> {
        self.by_id
            .get(slack_id)
            .or_else(|| (slack_id == self.system_bot.slack_id).then_some(&self.system_bot))
    }
}

pub struct ChannelDirectory {
    by_id: HashMap<String, String>,
}

impl ChannelDirectory {
    pub fn new(channels: &[Channel]) -> Self {
        let by_id = channels
            .iter()
            .map(|c| (c.slack_id.clone(), c.display_name.clone()))
            .collect();
        Self { by_id }
    }

    pub fn display_name(&self, slack_id: &str) -> Option<&str> {
        self.by_id.get(slack_id).map(String::as_str)
    }
}

/// Parses the channel listing. Individual malformed entries are skipped,
/// an unreadable listing is fatal.
pub fn scan_channels(path: &Path) -> Result<Vec<Channel>> {
    let mut channels = Vec::new();
    for object in archive::stream_objects(path)? {
        let object = object?;
        match serde_json::from_value::<ChannelRecord>(object) {
            Ok(record) => channels.push(Channel::from(record)),
            Err(e) => warn!("skipping malformed channel entry: {e}"),
        }
    }
    Ok(channels)
}

/// Parses the user listing, synthesizing bot identities for entries the
/// export flags as bots.
pub fn scan_users(path: &Path) -> Result<Vec<User>> {
    let mut users = Vec::new();
    for object in archive::stream_objects(path)? {
        let object = object?;
        match serde_json::from_value::<UserRecord>(object) {
            Ok(record) => users.push(User::from(record)),
            Err(e) => warn!("skipping malformed user entry: {e}"),
        }
    }
    info!("scanned {} users from the archive", users.len());
    Ok(users)
}

/// Fills in `teams_id` for every user with a known email, trying principal
/// name, then email, then display name, stopping at the first hit. Users
/// without an email are left unresolved. A lookup that errors means the
/// remote boundary itself is unusable and aborts the run.
pub async fn resolve_target_identities(graph: &impl GraphApi, users: &mut [User]) -> Result<()> {
    let mut resolved = 0usize;
    for user in users.iter_mut() {
        let Some(email) = user.email.clone() else {
            continue;
        };
        let mut found = graph.find_user_by_principal(&email).await?;
        if found.is_none() {
            found = graph.find_user_by_email(&email).await?;
        }
        if found.is_none() {
            found = graph.find_user_by_display_name(&user.display_name).await?;
        }
        match found {
            Some(target) => {
                user.teams_id = Some(target.id);
                resolved += 1;
            }
            None => warn!(
                "no Teams identity found for {} <{}>",
                user.display_name, email
            ),
        }
    }
    info!("resolved {} of {} users", resolved, users.len());
    Ok(())
}

/// Overwrites the snapshot file with the full identity table, pretty-printed
/// so operators can correct entries by hand between runs.
pub fn store_users(path: &Path, users: &[User]) -> Result<()> {
    let json = serde_json::to_string_pretty(users)?;
    fs::write(path, json)
        .with_context(|| format!("cannot write identity table to {}", path.display()))?;
    info!("stored {} identities to {}", users.len(), path.display());
    Ok(())
}

/// Loads a snapshot written by [`store_users`], fully replacing whatever
/// was in memory.
pub fn load_users(path: &Path) -> Result<Vec<User>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("cannot read identity table from {}", path.display()))?;
    let users = serde_json::from_str(&json)
        .with_context(|| format!("identity table {} is not valid JSON", path.display()))?;
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, name: &str, teams_id: Option<&str>) -> User {
        User {
            display_name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            slack_id: id.to_string(),
            teams_id: teams_id.map(str::to_string),
            is_bot: false,
        }
    }

    #[test]
    fn find_falls_back_to_the_system_bot() {
        let directory = UserDirectory::new(vec![user("U1", "Ann", None)], slackbot());
        assert_eq!(directory.find("U1").unwrap().display_name, "Ann");
        let bot = directory.find(SLACKBOT_ID).unwrap();
        assert!(bot.is_bot);
        assert_eq!(bot.display_name, "Slack Bot");
        assert!(directory.find("U404").is_none());
    }

    #[test]
    fn snapshot_round_trips_every_field() {
        let users = vec![
            user("U1", "Ann", Some("aad-1")),
            User {
                display_name: "Build Bot".to_string(),
                email: None,
                slack_id: "B9".to_string(),
                teams_id: None,
                is_bot: true,
            },
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.json");
        store_users(&path, &users).unwrap();
        let loaded = load_users(&path).unwrap();
        assert_eq!(loaded, users);
    }

    #[test]
    fn store_fully_overwrites_the_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.json");
        store_users(&path, &[user("U1", "Ann", None), user("U2", "Ben", None)]).unwrap();
        store_users(&path, &[user("U3", "Cam", None)]).unwrap();
        let loaded = load_users(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].slack_id, "U3");
    }
}
