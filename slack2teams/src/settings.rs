use std::{env, path::PathBuf};

use config::{Config, File};
use log::debug;
use serde::Deserialize;

use crate::cli::Args;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub graph_url: Option<String>,
    pub graph_token: Option<String>,
    pub slack_token: Option<String>,
    pub owner: Option<String>,
}

const CONFIG_FILE_NAME: &str = env!("CARGO_PKG_NAME");
const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";

// Function to get the XDG_CONFIG_HOME path
fn get_xdg_config_path() -> Option<PathBuf> {
    // First check XDG_CONFIG_HOME environment variable
    if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config));
    }

    // If XDG_CONFIG_HOME is not set, fall back to $HOME/.config
    if let Ok(home) = env::var("HOME") {
        return Some(PathBuf::from(home).join(".config"));
    }

    None
}

pub fn merge_settings_with_args(args: &Args) -> anyhow::Result<Args> {
    let config_builder = Config::builder();

    let mut new_args = args.clone();
    let mut settings = Settings::default();

    if let Some(xdg_config) = get_xdg_config_path() {
        let config_path = xdg_config.join(CONFIG_FILE_NAME).join("config.toml");
        if config_path.exists() {
            settings = config_builder
                .add_source(File::from(config_path.clone()).required(false))
                .build()?
                .try_deserialize()
                .map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to deserialize config file {}: {}",
                        config_path.display(),
                        e
                    )
                })?
        }
    }

    // Apply config values to args if they're not already set by CLI
    macro_rules! apply_if_empty {
        ($args:expr, $field:ident, $config:expr) => {
            if let Some(value) = $config.$field {
                if $args.$field.is_empty() {
                    $args.$field = value.clone();
                }
            }
        };
    }

    apply_if_empty!(new_args, graph_token, settings);
    apply_if_empty!(new_args, owner, settings);

    if let Some(graph_url) = settings.graph_url {
        if !graph_url.is_empty() && new_args.graph_url == DEFAULT_GRAPH_URL {
            new_args.graph_url = graph_url;
        }
    }

    if new_args.slack_token.is_none() {
        new_args.slack_token = settings.slack_token;
    }

    debug!("merged config: {:?}", new_args);

    Ok(new_args)
}
