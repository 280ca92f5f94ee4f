//! Command-line interface for flairwarden.
//!
//! Provides commands for running the bot, validating a policy document
//! offline, and inspecting the resolved configuration and dedup store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::adapters::{Platform, RedditClient};
use crate::config::{load_config, ResolvedConfig};
use crate::core::{BotContext, Orchestrator, SeenStore};
use crate::domain::Policy;

/// flairwarden - Reddit moderation bot enforcing user flair
#[derive(Parser, Debug)]
#[command(name = "flairwarden")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Monitor every configured subreddit until Ctrl+C
    Run {
        /// Config file (defaults to ./config.yaml, then the user config dir)
        #[arg(short, long, env = "FLAIRWARDEN_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Validate a policy document and print the policy it parses to
    CheckPolicy {
        /// Policy YAML file
        file: PathBuf,
    },

    /// Show resolved configuration (secrets hidden)
    Config {
        /// Config file (defaults to ./config.yaml, then the user config dir)
        #[arg(short, long, env = "FLAIRWARDEN_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Show how many events the dedup store has recorded
    Seen {
        /// Config file (defaults to ./config.yaml, then the user config dir)
        #[arg(short, long, env = "FLAIRWARDEN_CONFIG")]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run { config } => {
                let config = load_config(config.as_deref())?;
                run_bot(config).await
            }
            Commands::CheckPolicy { file } => check_policy(&file),
            Commands::Config { config } => {
                let config = load_config(config.as_deref())?;
                print!("{}", config.summary());
                Ok(())
            }
            Commands::Seen { config } => {
                let config = load_config(config.as_deref())?;
                show_seen(&config).await
            }
        }
    }
}

/// Connect, log in and run the orchestrator until Ctrl+C
async fn run_bot(config: ResolvedConfig) -> Result<()> {
    let store = SeenStore::open(&config.database_url)
        .with_context(|| format!("Failed to open seen store at {}", config.database_url))?;

    let client = RedditClient::new(config.reddit.clone())?;
    let platform: Arc<dyn Platform> = Arc::new(client);
    let identity = platform.me().await.context("Failed to log in to Reddit")?;
    info!(
        platform = platform.name(),
        user = %identity,
        communities = config.communities.len(),
        "Logged in"
    );

    let ctx = Arc::new(BotContext::new(platform, store, identity, config.settings));
    let orchestrator = Orchestrator::new(ctx);

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
    };

    orchestrator.run(&config.communities, shutdown).await?;
    info!("flairwarden stopped");
    Ok(())
}

/// Parse a policy file offline
fn check_policy(file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read policy file: {}", file.display()))?;

    let policy = Policy::from_yaml(&content)
        .with_context(|| format!("Malformed policy in {}", file.display()))?;

    println!("✅ Policy is valid\n");
    print!("{}", policy.to_yaml()?);
    Ok(())
}

async fn show_seen(config: &ResolvedConfig) -> Result<()> {
    let store = SeenStore::open(&config.database_url)
        .with_context(|| format!("Failed to open seen store at {}", config.database_url))?;
    let counts = store.counts().await?;

    println!("Seen store: {}", config.database_url);
    println!("  Submissions: {}", counts.submissions);
    println!("  Comments:    {}", counts.comments);
    println!("  Total:       {}", counts.total());
    Ok(())
}
