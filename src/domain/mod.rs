//! Domain types for flairwarden.
//!
//! This module contains the core data structures:
//! - Policy: Per-community moderation rules parsed from a wiki page
//! - Events: Communities, posts and comments observed on the platform

pub mod events;
pub mod policy;

// Re-export commonly used types
pub use events::{Comment, Community, EventKind, Flaired, ReplyHandle, Submission};
pub use policy::{MalformedPolicy, Policy, UnflairedAction, UnknownAction};
