//! Shared per-community policy state.
//!
//! The registry holds three maps keyed by community id:
//! - the published policy table (read on every event)
//! - the raw document cache (lets the watcher skip unchanged pages)
//! - the readiness gates (closed until the first policy is published)
//!
//! Each community has exactly one writer, its policy watcher. Readers take
//! an `Arc<Policy>` snapshot, so a lookup never observes a half-written
//! policy and never holds a lock across an await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::Result;
use tokio::sync::watch;

use crate::domain::Policy;

/// Policy table, raw cache and readiness gates for all communities
#[derive(Default)]
pub struct PolicyRegistry {
    policies: RwLock<HashMap<String, Arc<Policy>>>,
    raw_documents: Mutex<HashMap<String, String>>,
    gates: RwLock<HashMap<String, watch::Sender<bool>>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the (closed) readiness gate for a community.
    ///
    /// Registering an already known community keeps its existing gate.
    pub fn register(&self, community_id: &str) {
        let mut gates = self.gates.write().unwrap_or_else(|e| e.into_inner());
        gates
            .entry(community_id.to_string())
            .or_insert_with(|| watch::channel(false).0);
    }

    /// Current policy, falling back to the default
    pub fn current(&self, community_id: &str) -> Arc<Policy> {
        self.published(community_id)
            .unwrap_or_else(Policy::default_shared)
    }

    /// Policy published for a community, if any
    pub fn published(&self, community_id: &str) -> Option<Arc<Policy>> {
        let policies = self.policies.read().unwrap_or_else(|e| e.into_inner());
        policies.get(community_id).cloned()
    }

    /// Replace the published policy for a community
    pub fn publish(&self, community_id: &str, policy: Policy) -> Arc<Policy> {
        let policy = Arc::new(policy);
        let mut policies = self.policies.write().unwrap_or_else(|e| e.into_inner());
        policies.insert(community_id.to_string(), policy.clone());
        policy
    }

    /// Remember the raw document text.
    ///
    /// Returns false (and stores nothing) when the text equals the cached
    /// text for this community.
    pub fn cache_raw(&self, community_id: &str, text: &str) -> bool {
        let mut raw = self.raw_documents.lock().unwrap_or_else(|e| e.into_inner());
        match raw.get(community_id) {
            Some(cached) if cached == text => false,
            _ => {
                raw.insert(community_id.to_string(), text.to_string());
                true
            }
        }
    }

    /// Open a community's gate. Returns true only for the call that opened it.
    pub fn open_gate(&self, community_id: &str) -> bool {
        let gates = self.gates.read().unwrap_or_else(|e| e.into_inner());
        match gates.get(community_id) {
            Some(gate) => gate.send_if_modified(|open| {
                if *open {
                    false
                } else {
                    *open = true;
                    true
                }
            }),
            None => {
                tracing::warn!(community_id, "Tried to open the gate of an unregistered community");
                false
            }
        }
    }

    /// Check whether a community's gate is open
    pub fn is_ready(&self, community_id: &str) -> bool {
        let gates = self.gates.read().unwrap_or_else(|e| e.into_inner());
        gates
            .get(community_id)
            .map(|gate| *gate.borrow())
            .unwrap_or(false)
    }

    /// Wait until a community's gate opens
    pub async fn wait_ready(&self, community_id: &str) -> Result<()> {
        let mut rx = {
            let gates = self.gates.read().unwrap_or_else(|e| e.into_inner());
            match gates.get(community_id) {
                Some(gate) => gate.subscribe(),
                None => anyhow::bail!("Community {} has no readiness gate", community_id),
            }
        };

        rx.wait_for(|open| *open).await?;
        Ok(())
    }
}
