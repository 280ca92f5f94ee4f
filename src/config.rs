//! Configuration for flairwarden.
//!
//! Configuration sources (highest priority first):
//! 1. `--config <path>` (or the FLAIRWARDEN_CONFIG environment variable)
//! 2. `./config.yaml` in the current directory
//! 3. `<user config dir>/flairwarden/config.yaml`
//!
//! A missing file, a missing key or an invalid value is fatal: the bot does
//! not start monitoring with a half-valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::RedditCredentials;
use crate::core::{BotSettings, DEFAULT_STARTUP_GRACE};

/// File name searched for in the default locations
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub reddit: RedditCredentials,
    pub database: DatabaseConfig,
    pub monitored_subreddits: Vec<String>,
    pub subreddit_config: SubredditConfig,

    /// Seconds to wait between starting one community and the next
    #[serde(default)]
    pub startup_grace_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path (":memory:" for a throwaway store)
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubredditConfig {
    /// Wiki page holding each community's policy
    pub page_name: String,

    /// Seconds between policy page polls
    pub update_interval: u64,
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Path the configuration was loaded from
    pub config_file: PathBuf,

    pub reddit: RedditCredentials,
    pub database_url: String,
    pub communities: Vec<String>,
    pub settings: BotSettings,
}

impl ResolvedConfig {
    /// Human-readable summary with secrets left out
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Config file:      {}\n", self.config_file.display()));
        out.push_str(&format!("Reddit user:      {}\n", self.reddit.username));
        out.push_str(&format!("User agent:       {}\n", self.reddit.user_agent));
        out.push_str(&format!("Database:         {}\n", self.database_url));
        out.push_str(&format!("Policy page:      {}\n", self.settings.policy_page));
        out.push_str(&format!(
            "Refresh interval: {}s\n",
            self.settings.refresh_interval.as_secs()
        ));
        out.push_str(&format!(
            "Startup grace:    {}s\n",
            self.settings.startup_grace.as_secs()
        ));
        out.push_str("Communities:\n");
        for name in &self.communities {
            out.push_str(&format!("  - r/{}\n", name));
        }
        out
    }
}

/// Default locations, in search order
fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("flairwarden").join(CONFIG_FILE_NAME));
    }
    locations
}

/// Pick the config file to load
fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        return Ok(path.to_path_buf());
    }

    default_locations()
        .into_iter()
        .find(|p| p.exists())
        .context("Config file not found (pass --config or set FLAIRWARDEN_CONFIG)")
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Parse and validate config text
pub fn parse_config(content: &str) -> Result<ConfigFile> {
    let config: ConfigFile =
        serde_yaml::from_str(content).context("Failed to parse config YAML")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &ConfigFile) -> Result<()> {
    let reddit = &config.reddit;
    for (key, value) in [
        ("reddit.client_id", &reddit.client_id),
        ("reddit.client_secret", &reddit.client_secret),
        ("reddit.user_agent", &reddit.user_agent),
        ("reddit.username", &reddit.username),
        ("reddit.password", &reddit.password),
        ("database.url", &config.database.url),
        ("subreddit_config.page_name", &config.subreddit_config.page_name),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("Config key '{}' must not be empty", key);
        }
    }

    if config.monitored_subreddits.is_empty() {
        anyhow::bail!("Config key 'monitored_subreddits' must list at least one subreddit");
    }
    if let Some(name) = config
        .monitored_subreddits
        .iter()
        .find(|name| name.trim().is_empty())
    {
        anyhow::bail!("Invalid subreddit name in 'monitored_subreddits': '{}'", name);
    }

    if config.subreddit_config.update_interval == 0 {
        anyhow::bail!("Config key 'subreddit_config.update_interval' must be greater than 0");
    }

    Ok(())
}

/// Turn a parsed file into runtime configuration
fn resolve(config: ConfigFile, config_file: PathBuf) -> ResolvedConfig {
    let startup_grace = config
        .startup_grace_seconds
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_STARTUP_GRACE);

    let communities = config
        .monitored_subreddits
        .iter()
        .map(|name| name.trim().trim_start_matches("r/").to_string())
        .collect();

    ResolvedConfig {
        config_file,
        reddit: config.reddit,
        database_url: config.database.url,
        communities,
        settings: BotSettings {
            policy_page: config.subreddit_config.page_name,
            refresh_interval: Duration::from_secs(config.subreddit_config.update_interval),
            startup_grace,
        },
    }
}

/// Load configuration from the explicit path or the default locations
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let path = find_config_file(explicit)?;
    let config = load_config_file(&path)?;
    Ok(resolve(config, path))
}
