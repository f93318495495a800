//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (default `./config.json`, or `ASSIST_CONFIG_PATH`) and environment.
//! Every field has a default, so the bot runs with only `SLACK_BOT_TOKEN` set.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::DEFAULT_CATALOG_PATH;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Slack connection settings.
    #[serde(default)]
    pub slack: SlackConfig,

    /// Poll loop pacing.
    #[serde(default)]
    pub poll: PollConfig,

    /// Alert catalog location.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Reply body selection.
    #[serde(default)]
    pub reply: ReplyConfig,
}

/// Slack Web API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    /// Bot token (xoxb-...). Overridden by SLACK_BOT_TOKEN env.
    pub bot_token: Option<String>,

    /// Web API base URL (default https://slack.com/api).
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Channel ids to watch. Empty means every channel the bot is a member of.
    #[serde(default)]
    pub channels: Vec<String>,

    /// Max messages fetched per channel per poll.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_api_base() -> String {
    "https://slack.com/api".to_string()
}

fn default_history_limit() -> u32 {
    100
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_api_base(),
            channels: Vec::new(),
            history_limit: default_history_limit(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Delay between poll cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollConfig {
    /// Milliseconds to wait after each cycle (default 1000).
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    /// Path to the alert catalog JSON (default resources/alerts.json). Relative paths are resolved against the config file's directory.
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from(DEFAULT_CATALOG_PATH)
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

/// Which reply body to post in an alert's thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    /// Empty body.
    #[default]
    Empty,

    /// Summary and runbook from the alert catalog entry.
    Catalog,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyConfig {
    #[serde(default)]
    pub mode: ReplyMode,
}

/// Resolve the Slack bot token: env SLACK_BOT_TOKEN overrides config.
pub fn resolve_slack_token(config: &Config) -> Option<String> {
    token_from(std::env::var("SLACK_BOT_TOKEN").ok(), config)
}

fn token_from(env: Option<String>, config: &Config) -> Option<String> {
    env.and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
    .or_else(|| {
        config
            .slack
            .bot_token
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve the catalog path: absolute paths as-is, relative paths against the config file's parent
/// (the working directory for the default `./config.json`).
pub fn resolve_catalog_path(config: &Config, config_path: &Path) -> PathBuf {
    let path = &config.catalog.path;
    if path.is_absolute() {
        return path.clone();
    }
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join(path)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("ASSIST_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"))
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
