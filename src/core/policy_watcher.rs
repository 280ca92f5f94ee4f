//! Live policy reloading.
//!
//! One watcher per community polls the policy wiki page, re-parses it only
//! when the text changed, and publishes the parsed policy only when it
//! differs from what is already live. The first publish opens the
//! community's readiness gate, which releases its event monitors.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::adapters::DocumentFetch;
use crate::domain::{Community, Policy};

use super::context::BotContext;

/// What a single poll did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Page text identical to the last poll; not parsed
    RawUnchanged,

    /// Page changed but parsed to the policy already live
    Unchanged,

    /// A new policy went live
    Published {
        /// This was the community's first policy (the gate opened)
        first: bool,
    },

    /// Page could not be parsed; the live policy was kept
    Malformed(String),

    /// The bot may not read the page
    AccessDenied,

    /// The page does not exist
    NotFound,

    /// Fetching the page failed for another reason
    FetchFailed(String),
}

/// Watches one community's policy page
pub struct PolicyWatcher {
    ctx: Arc<BotContext>,
    community: Community,
}

impl PolicyWatcher {
    pub fn new(ctx: Arc<BotContext>, community: Community) -> Self {
        Self { ctx, community }
    }

    /// Run one fetch/compare/publish cycle
    pub async fn poll_once(&self) -> PollOutcome {
        let community = &self.community;
        let page = &self.ctx.settings.policy_page;
        let registry = &self.ctx.registry;

        let text = match self
            .ctx
            .platform
            .fetch_policy_document(community, page)
            .await
        {
            Ok(DocumentFetch::Fetched(text)) => text,
            Ok(DocumentFetch::AccessDenied) => {
                warn!(%community, page = %page, "Could not access policy page (403)");
                return PollOutcome::AccessDenied;
            }
            Ok(DocumentFetch::NotFound) => {
                warn!(%community, page = %page, "Policy page does not exist (404)");
                return PollOutcome::NotFound;
            }
            Err(e) => {
                error!(%community, error = %e, "Failed to fetch policy page");
                return PollOutcome::FetchFailed(e.to_string());
            }
        };

        if !registry.cache_raw(&community.id, &text) {
            trace!(%community, "Policy page unchanged");
            return PollOutcome::RawUnchanged;
        }

        let candidate = match Policy::from_yaml(&text) {
            Ok(policy) => policy,
            Err(e) => {
                warn!(%community, error = %e, "Could not parse policy, keeping the current one");
                return PollOutcome::Malformed(e.to_string());
            }
        };

        let first = match registry.published(&community.id) {
            Some(current) if *current == candidate => {
                debug!(%community, "Policy page edited without changing the policy");
                return PollOutcome::Unchanged;
            }
            Some(_) => false,
            None => true,
        };

        let published = registry.publish(&community.id, candidate);
        info!(%community, "Policy changed");
        trace!(%community, policy = ?published, "Published policy");

        if registry.open_gate(&community.id) {
            info!(%community, "Initial policy loaded, monitors released");
        }

        PollOutcome::Published { first }
    }

    /// Poll forever, sleeping a fixed interval between cycles
    #[instrument(skip(self), fields(community = %self.community))]
    pub async fn run(self) -> Result<()> {
        info!(page = %self.ctx.settings.policy_page, "Monitoring policy page");

        loop {
            let outcome = self.poll_once().await;
            trace!(?outcome, "Policy poll finished");
            tokio::time::sleep(self.ctx.settings.refresh_interval).await;
        }
    }
}
