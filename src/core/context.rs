//! Runtime context shared by every routine.

use std::sync::Arc;
use std::time::Duration;

use crate::adapters::Platform;

use super::registry::PolicyRegistry;
use super::seen_store::SeenStore;

/// Default pause between starting one community and the next
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(3);

/// Tunables for the running bot
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Wiki page holding each community's policy
    pub policy_page: String,

    /// Pause between policy document polls
    pub refresh_interval: Duration,

    /// Pause between starting one community and the next
    pub startup_grace: Duration,
}

/// Everything a routine needs, built once at startup
pub struct BotContext {
    pub platform: Arc<dyn Platform>,
    pub store: SeenStore,
    pub registry: Arc<PolicyRegistry>,

    /// Username the bot is logged in as (always whitelisted)
    pub identity: String,

    pub settings: BotSettings,
}

impl BotContext {
    pub fn new(
        platform: Arc<dyn Platform>,
        store: SeenStore,
        identity: String,
        settings: BotSettings,
    ) -> Self {
        Self {
            platform,
            store,
            registry: Arc::new(PolicyRegistry::new()),
            identity,
            settings,
        }
    }
}
