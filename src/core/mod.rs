//! Core moderation logic.
//!
//! This module contains:
//! - SeenStore: Persistent dedup of processed events
//! - Formatter: Message template rendering
//! - Registry: Shared policy table, raw cache and readiness gates
//! - PolicyWatcher: Live policy reloading per community
//! - Monitors: Submission and comment stream processing
//! - Orchestrator: Starts and supervises every routine

pub mod context;
pub mod formatter;
pub mod monitor;
pub mod orchestrator;
pub mod policy_watcher;
pub mod registry;
pub mod seen_store;

// Re-export commonly used types
pub use context::{BotContext, BotSettings, DEFAULT_STARTUP_GRACE};
pub use formatter::{render, FormatError, MessageContext};
pub use monitor::{CommentMonitor, EventOutcome, SubmissionMonitor};
pub use orchestrator::{Orchestrator, RoutineRole};
pub use policy_watcher::{PolicyWatcher, PollOutcome};
pub use registry::PolicyRegistry;
pub use seen_store::{RecordOutcome, SeenCounts, SeenStore, StoreError};
