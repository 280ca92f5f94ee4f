//! Platform entities observed by the monitors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A monitored community (subreddit)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Community {
    /// Platform id (e.g. "2qh1i"), used as the key for per-community state
    pub id: String,

    /// Display name without the "r/" prefix
    pub name: String,
}

impl fmt::Display for Community {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r/{}", self.name)
    }
}

/// A new post in a community
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Short id (e.g. "abc123")
    pub id: String,

    /// Full name including the kind prefix (e.g. "t3_abc123")
    pub fullname: String,

    pub title: String,

    /// `None` when the account was deleted
    pub author: Option<String>,

    pub author_flair_text: Option<String>,
}

/// A new comment in a community
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Short id (e.g. "def456")
    pub id: String,

    /// Full name including the kind prefix (e.g. "t1_def456")
    pub fullname: String,

    pub body: String,

    /// `None` when the account was deleted
    pub author: Option<String>,

    pub author_flair_text: Option<String>,

    /// Full name of the post this comment belongs to
    pub link_id: Option<String>,
}

/// Anything that carries author flair
pub trait Flaired {
    fn author_flair_text(&self) -> Option<&str>;

    /// Flair that is absent or blank counts as unflaired
    fn is_unflaired(&self) -> bool {
        self.author_flair_text()
            .map(|text| text.trim().is_empty())
            .unwrap_or(true)
    }
}

impl Flaired for Submission {
    fn author_flair_text(&self) -> Option<&str> {
        self.author_flair_text.as_deref()
    }
}

impl Flaired for Comment {
    fn author_flair_text(&self) -> Option<&str> {
        self.author_flair_text.as_deref()
    }
}

/// The two event streams a community produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Submission,
    Comment,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reply the bot posted, kept so it can be distinguished afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyHandle {
    /// Full name of the new comment (e.g. "t1_ghi789")
    pub fullname: String,
}
