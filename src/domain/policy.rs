//! Per-community moderation policy.
//!
//! A policy is parsed from the YAML document a community keeps on its wiki.
//! Once parsed it is immutable; the watcher swaps whole values when the
//! document changes.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process-wide default, used until a community publishes its own policy
static DEFAULT_POLICY: OnceLock<Arc<Policy>> = OnceLock::new();

/// What to do with content from an author without flair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum UnflairedAction {
    /// Reply publicly, as a distinguished moderator comment
    Reply,

    /// Send the author a private message
    Message,

    /// Remove the content
    Remove,

    /// Take no action
    Ignore,
}

impl UnflairedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::Message => "message",
            Self::Remove => "remove",
            Self::Ignore => "ignore",
        }
    }
}

impl fmt::Display for UnflairedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action keyword outside the closed set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action '{0}' (expected one of: reply, message, remove, ignore)")]
pub struct UnknownAction(pub String);

impl FromStr for UnflairedAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reply" => Ok(Self::Reply),
            "message" => Ok(Self::Message),
            "remove" => Ok(Self::Remove),
            "ignore" => Ok(Self::Ignore),
            _ => Err(UnknownAction(s.to_string())),
        }
    }
}

impl TryFrom<String> for UnflairedAction {
    type Error = UnknownAction;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A policy document that could not be turned into a [`Policy`]
#[derive(Debug, Error)]
pub enum MalformedPolicy {
    #[error("policy document is empty")]
    Empty,

    #[error("invalid policy document: {0}")]
    Invalid(#[from] serde_yaml::Error),
}

/// Moderation rules for one community
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Reply to every new post with `reply_message`
    pub reply_on_posts: bool,

    /// Template for the general per-post reply
    pub reply_message: String,

    /// Sticky the general reply to the top of the thread
    pub reply_is_pinned: bool,

    pub unflaired_post_action: UnflairedAction,
    pub unflaired_post_subject: String,

    /// Templates to choose from when acting on an unflaired post
    #[serde(rename = "unflaired_post_message", alias = "unflaired_post_messages")]
    pub unflaired_post_messages: Vec<String>,

    pub unflaired_comment_action: UnflairedAction,
    pub unflaired_comment_subject: String,

    /// Templates to choose from when acting on an unflaired comment
    #[serde(
        rename = "unflaired_comment_message",
        alias = "unflaired_comment_messages"
    )]
    pub unflaired_comment_messages: Vec<String>,

    /// Authors exempt from flair enforcement
    pub whitelist: BTreeSet<String>,
}

impl Policy {
    /// Parse a policy from the YAML text of a wiki page
    pub fn from_yaml(content: &str) -> Result<Self, MalformedPolicy> {
        if content.trim().is_empty() {
            return Err(MalformedPolicy::Empty);
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Render the policy back to YAML (used by `check-policy`)
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// The shared default policy
    pub fn default_shared() -> Arc<Policy> {
        DEFAULT_POLICY
            .get_or_init(|| Arc::new(Policy::default()))
            .clone()
    }

    /// Check whether `author` is exempt, either by being the bot itself or
    /// by appearing on the whitelist
    pub fn is_whitelisted(&self, author: Option<&str>, bot_name: &str) -> bool {
        match author {
            Some(name) => name == bot_name || self.whitelist.contains(name),
            None => false,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            reply_on_posts: false,
            reply_message: "Welcome!\n\n{unflaired_message}".to_string(),
            reply_is_pinned: false,
            unflaired_post_action: UnflairedAction::Ignore,
            unflaired_post_subject: "Flair up, man!".to_string(),
            unflaired_post_messages: vec!["Flair up, man!".to_string()],
            unflaired_comment_action: UnflairedAction::Ignore,
            unflaired_comment_subject: "Flair up, man!".to_string(),
            unflaired_comment_messages: vec!["Flair up, man!".to_string()],
            whitelist: BTreeSet::new(),
        }
    }
}
