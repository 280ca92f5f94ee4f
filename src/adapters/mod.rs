//! Adapter interfaces for the moderated platform.
//!
//! Everything the bot needs from the outside world goes through the
//! [`Platform`] trait, so the core can run against Reddit or a scripted
//! test double alike.

pub mod reddit;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{Comment, Community, ReplyHandle, Submission};

// Re-export the Reddit adapter
pub use reddit::{RedditClient, RedditCredentials};

/// Result of fetching a community's policy document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFetch {
    /// The raw page text
    Fetched(String),

    /// The bot is not allowed to read the page (HTTP 403)
    AccessDenied,

    /// The page does not exist (HTTP 404)
    NotFound,
}

/// Live, ordered stream of events for one community.
///
/// The stream never ends on its own; a closed channel means the producer
/// died and the consuming routine should give up.
pub type EventStream<T> = mpsc::Receiver<T>;

/// Trait for the moderated platform
#[async_trait]
pub trait Platform: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Username of the account the bot is logged in as
    async fn me(&self) -> Result<String>;

    /// Resolve a community by name, failing if it is missing or inaccessible
    async fn fetch_community(&self, name: &str) -> Result<Community>;

    /// Start streaming new posts in a community, oldest first
    async fn stream_submissions(&self, community: &Community) -> Result<EventStream<Submission>>;

    /// Start streaming new comments in a community, oldest first
    async fn stream_comments(&self, community: &Community) -> Result<EventStream<Comment>>;

    /// Fetch the raw text of a wiki page holding the community's policy
    async fn fetch_policy_document(
        &self,
        community: &Community,
        page_name: &str,
    ) -> Result<DocumentFetch>;

    /// Reply to a post or comment, identified by full name
    async fn reply(&self, parent_fullname: &str, text: &str) -> Result<ReplyHandle>;

    /// Remove a post or comment as a moderator, attaching a mod note
    async fn remove(&self, fullname: &str, mod_note: &str) -> Result<()>;

    /// Send a private message
    async fn message(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;

    /// Mark a reply as a moderator action, optionally stickying it
    async fn distinguish(&self, reply: &ReplyHandle, sticky: bool) -> Result<()>;
}
