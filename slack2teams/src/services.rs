//! The migration state machine: find or create the target containers, then
//! channel by channel, file by file, transform and submit every message.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chrono::SecondsFormat;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};

use crate::api::graph::{GraphApi, GraphClient};
use crate::archive;
use crate::checkpoint::{Checkpoint, RenameCheckpoint};
use crate::cli::{Args, Command};
use crate::format;
use crate::identity::{self, ChannelDirectory, UserDirectory};
use crate::models::slack::MessageRecord;
use crate::models::teams::{AttachmentPayload, ChatMessagePayload};
use crate::models::{parse_ts, Attachment, Channel, Message, User};
use crate::transcript::TranscriptWriter;
use crate::transport::Transporter;

/// Newly created containers take a moment to become visible to subsequent
/// calls on the remote side.
const CREATION_SETTLE_DELAY: Duration = Duration::from_secs(10);

/// Name of the persisted identity table inside the archive directory.
const IDENTITY_SNAPSHOT: &str = "slack2teams_users.json";

pub async fn run(args: Args) -> Result<()> {
    let graph = GraphClient::new(args.graph_url.clone(), args.graph_token.clone())?;
    match args.command.clone() {
        Command::Migrate { archive, team_name } => {
            migrate(&graph, &archive, &team_name, args.slack_token.clone(), &args.owner).await
        }
        Command::Finish { team_id } => finish_migration(&graph, &team_id, &args.owner).await,
    }
}

pub async fn migrate(
    graph: &impl GraphApi,
    archive_dir: &Path,
    team_name: &str,
    slack_token: Option<String>,
    owner: &str,
) -> Result<()> {
    let channels = identity::scan_channels(&archive_dir.join("channels.json"))?;
    info!("found {} channels in the archive", channels.len());

    let snapshot = archive_dir.join(IDENTITY_SNAPSHOT);
    let users = if snapshot.exists() {
        info!("loading identity table from {}", snapshot.display());
        identity::load_users(&snapshot)?
    } else {
        let mut users = identity::scan_users(&archive_dir.join("users.json"))?;
        identity::resolve_target_identities(graph, &mut users).await?;
        identity::store_users(&snapshot, &users)?;
        users
    };

    let team_id = find_or_create_team(graph, team_name).await?;

    let migration = Migration {
        graph,
        transporter: Transporter::new(graph, slack_token),
        checkpoint: RenameCheckpoint::new(),
        channels: ChannelDirectory::new(&channels),
        users: UserDirectory::new(users, identity::slackbot()),
        team_id,
    };

    for channel in &channels {
        let Some(channel_id) = find_or_create_channel(graph, &migration.team_id, channel).await?
        else {
            warn!(
                "skipping channel '{}', no target channel id obtained",
                channel.display_name
            );
            continue;
        };
        migration.migrate_channel(archive_dir, channel, &channel_id).await?;
    }

    finish_migration(graph, &migration.team_id, owner).await?;
    info!("migration finished for team {}", migration.team_id);
    Ok(())
}

/// Clears migration mode on a team left provisional by an interrupted run:
/// finalize every child channel, finalize the team, assign the owner.
pub async fn finish_migration(graph: &impl GraphApi, team_id: &str, owner: &str) -> Result<()> {
    let channels = graph.list_channels(team_id).await?;
    for channel in &channels {
        if let Err(e) = graph.complete_channel_migration(team_id, &channel.id).await {
            warn!("cannot finalize channel '{}': {e:#}", channel.display_name);
        }
    }
    graph.complete_team_migration(team_id).await?;

    if owner.is_empty() {
        warn!("no owner configured, the migrated team is left without one");
    } else {
        graph.add_team_owner(team_id, owner).await?;
    }
    info!("migration mode cleared for team {}", team_id);
    Ok(())
}

async fn find_or_create_team(graph: &impl GraphApi, name: &str) -> Result<String> {
    if let Some(team) = graph.find_team(name).await? {
        info!("reusing existing team '{}' ({})", team.display_name, team.id);
        return Ok(team.id);
    }
    let team_id = graph
        .create_team(name, "Slack archive migration", None)
        .await?;
    info!("created team {} in migration mode", team_id);
    tokio::time::sleep(CREATION_SETTLE_DELAY).await;
    Ok(team_id)
}

/// Find-by-name first, case-insensitive; create only on a miss. Listing
/// failures are fatal, a failed create skips just this channel.
async fn find_or_create_channel(
    graph: &impl GraphApi,
    team_id: &str,
    channel: &Channel,
) -> Result<Option<String>> {
    let existing = graph.list_channels(team_id).await?;
    if let Some(found) = existing
        .iter()
        .find(|c| c.display_name.eq_ignore_ascii_case(&channel.display_name))
    {
        info!("reusing existing channel '{}'", found.display_name);
        return Ok(Some(found.id.clone()));
    }

    let created = channel
        .created
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true));
    match graph
        .create_channel(
            team_id,
            &channel.display_name,
            &channel.description,
            created.as_deref(),
        )
        .await
    {
        Ok(new_channel) => Ok(Some(new_channel.id)),
        Err(e) => {
            error!("cannot create channel '{}': {e:#}", channel.display_name);
            Ok(None)
        }
    }
}

struct Migration<'a, G> {
    graph: &'a G,
    transporter: Transporter<'a, G>,
    checkpoint: RenameCheckpoint,
    channels: ChannelDirectory,
    users: UserDirectory,
    team_id: String,
}

impl<G: GraphApi> Migration<'_, G> {
    async fn migrate_channel(
        &self,
        archive_dir: &Path,
        channel: &Channel,
        channel_id: &str,
    ) -> Result<()> {
        let folder = archive_dir.join(&channel.folder);
        if !folder.is_dir() {
            warn!(
                "channel '{}' has no message folder in the archive",
                channel.display_name
            );
            return Ok(());
        }

        let files = self.checkpoint.pending(&folder)?;
        info!(
            "channel '{}': {} pending message files",
            channel.display_name,
            files.len()
        );

        // Thread roots posted earlier in this channel, keyed by the derived
        // millisecond identifier.
        let mut thread_map = HashMap::new();
        for file in files {
            self.migrate_file(channel, channel_id, &file, &mut thread_map)
                .await?;
            self.checkpoint.mark_done(&file)?;
        }
        Ok(())
    }

    async fn migrate_file(
        &self,
        channel: &Channel,
        channel_id: &str,
        file: &Path,
        thread_map: &mut HashMap<String, String>,
    ) -> Result<()> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap(),
        );
        spinner.set_message(format!("migrating {}", file.display()));
        spinner.enable_steady_tick(Duration::from_millis(100));

        let mut transcript = TranscriptWriter::create(&file.with_extension("html"))?;
        let mut submitted = 0usize;
        let mut skipped = 0usize;

        for object in archive::stream_objects(file)? {
            let object = match object {
                Ok(o) => o,
                Err(e) => {
                    warn!("skipping unreadable object in {}: {e:#}", file.display());
                    skipped += 1;
                    continue;
                }
            };
            let record: MessageRecord = match serde_json::from_value(object) {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        "skipping message without a usable timestamp in {}: {e}",
                        file.display()
                    );
                    skipped += 1;
                    continue;
                }
            };

            let Some(message) = self.build_message(channel, &record).await else {
                skipped += 1;
                continue;
            };
            if self.submit_message(channel_id, &message, thread_map).await {
                submitted += 1;
            } else {
                skipped += 1;
            }
            transcript.append(&message)?;
            spinner.inc(1);
        }

        transcript.finish()?;
        spinner.finish_and_clear();
        info!(
            "{}: submitted {} messages, skipped {}",
            file.display(),
            submitted,
            skipped
        );
        Ok(())
    }

    /// Attachments resolve before formatting so inline content is already
    /// downloaded when the body is assembled.
    async fn build_message(&self, channel: &Channel, record: &MessageRecord) -> Option<Message> {
        let Some(when) = parse_ts(&record.ts) else {
            warn!("skipping message with unparseable timestamp '{}'", record.ts);
            return None;
        };

        let mut attachments = Vec::new();
        for file in &record.files {
            match Attachment::from_record(file) {
                Some(attachment) => attachments.push(attachment),
                None => warn!(
                    "skipping attachment without a source url in message ts={}",
                    record.ts
                ),
            }
        }
        let hosted_contents = self
            .transporter
            .resolve_attachments(&self.team_id, &channel.folder, &mut attachments)
            .await;

        let output = format::format_message(record, &self.channels, &self.users);

        Some(Message {
            sender: self.sender_for(record),
            ts: record.ts.clone(),
            thread_ts: record.thread_ts.clone(),
            when,
            html: output.html,
            attachments,
            mentions: output.mentions,
            reactions: output.reactions,
            hosted_contents,
        })
    }

    fn sender_for(&self, record: &MessageRecord) -> Option<User> {
        if let Some(id) = &record.user {
            if let Some(user) = self.users.find(id) {
                return Some(user.clone());
            }
        }
        if record.bot_id.is_some() || record.username.is_some() {
            return Some(User {
                display_name: record
                    .username
                    .clone()
                    .unwrap_or_else(|| "bot".to_string()),
                email: None,
                slack_id: record.bot_id.clone().unwrap_or_default(),
                teams_id: None,
                is_bot: true,
            });
        }
        None
    }

    /// Best-effort submission: a failed message is logged with enough
    /// context to find it in the archive and then skipped.
    async fn submit_message(
        &self,
        channel_id: &str,
        message: &Message,
        thread_map: &mut HashMap<String, String>,
    ) -> bool {
        let payload = ChatMessagePayload::from_message(message);
        let sender_name = message
            .sender
            .as_ref()
            .map(|u| u.display_name.as_str())
            .unwrap_or("unknown sender");

        let is_reply = message.is_in_thread() && !message.is_thread_root();
        let posted = if is_reply {
            match thread_map.get(&message.thread_key()) {
                Some(parent_id) => {
                    self.graph
                        .post_reply(&self.team_id, channel_id, parent_id, &payload)
                        .await
                }
                None => {
                    debug!(
                        "thread root {} not seen, posting ts={} as a top-level message",
                        message.thread_key(),
                        message.ts
                    );
                    self.graph
                        .post_message(&self.team_id, channel_id, &payload)
                        .await
                }
            }
        } else {
            self.graph
                .post_message(&self.team_id, channel_id, &payload)
                .await
        };

        let posted = match posted {
            Ok(p) => p,
            Err(e) => {
                error!(
                    "cannot submit message ts={} from {}: {e:#}",
                    message.ts, sender_name
                );
                return false;
            }
        };

        if !is_reply {
            thread_map.insert(message.message_key(), posted.id.clone());
        }

        let uploads: Vec<AttachmentPayload> = message
            .attachments
            .iter()
            .filter_map(AttachmentPayload::from_attachment)
            .collect();
        if !uploads.is_empty() {
            if let Err(e) = self
                .graph
                .update_message_attachments(&self.team_id, channel_id, &posted.id, &uploads)
                .await
            {
                error!(
                    "cannot attach {} uploaded files to message ts={}: {e:#}",
                    uploads.len(),
                    message.ts
                );
            }
        }
        true
    }
}
