//! flairwarden - Reddit moderation bot that enforces user flair
//!
//! Watches a set of subreddits and acts on posts and comments from users
//! without flair, following a per-subreddit policy kept on a wiki page.
//!
//! # Architecture
//!
//! Each subreddit runs three independent routines:
//! - a policy watcher that reloads the wiki policy when it changes
//! - a submission monitor
//! - a comment monitor
//!
//! Monitors wait until their subreddit's first policy is live, and every
//! event is recorded in a SQLite store so it is acted on at most once.
//!
//! # Modules
//!
//! - `adapters`: Platform integrations (Reddit)
//! - `core`: Monitoring logic (Registry, Watcher, Monitors, Orchestrator)
//! - `domain`: Data structures (Policy, Submission, Comment)
//! - `config`: Config file loading
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the bot
//! flairwarden run --config config.yaml
//!
//! # Validate a policy page before publishing it
//! flairwarden check-policy policy.yaml
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{Platform, RedditClient, RedditCredentials};
pub use core::{BotContext, BotSettings, Orchestrator, PolicyRegistry, SeenStore};
pub use domain::{Comment, Community, Policy, Submission, UnflairedAction};
