use std::fmt;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Microsoft Graph base URL
    #[arg(long, env = "GRAPH_URL", default_value = "https://graph.microsoft.com/v1.0")]
    pub graph_url: String,

    /// Microsoft Graph access token
    #[arg(long, env = "GRAPH_TOKEN", default_value = "")]
    pub graph_token: String,

    /// Slack API token used to download attachment sources
    #[arg(long, env = "SLACK_TOKEN")]
    pub slack_token: Option<String>,

    /// Object id of the user who will own the migrated team
    #[arg(long, env = "TEAM_OWNER", default_value = "")]
    pub owner: String,

    /// Log verbosity
    #[arg(short, long, value_name = "LEVEL", default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Migrate a Slack export archive into a Teams team
    Migrate {
        /// Directory holding the extracted export archive
        archive: PathBuf,

        /// Display name of the target team
        #[arg(long, env = "TEAM_NAME")]
        team_name: String,
    },
    /// Finalize a migration left in migration mode by an interrupted run
    Finish {
        /// Id of the team to finalize
        team_id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl From<LogLevel> for LevelFilter {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Off => write!(f, "off"),
        }
    }
}
