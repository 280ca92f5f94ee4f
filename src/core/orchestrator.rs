//! Top-level task orchestration.
//!
//! Starts one policy watcher, one submission monitor and one comment
//! monitor per community, pausing between communities so startup does not
//! hit the API in one burst, then keeps them all running. Every routine is
//! meant to run forever, so any routine ending is treated as a failure.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, instrument};

use super::context::BotContext;
use super::monitor::{CommentMonitor, SubmissionMonitor};
use super::policy_watcher::PolicyWatcher;
use crate::domain::Community;

/// Running routines, each yielding its name and how it ended
type Routines = JoinSet<(String, Result<()>)>;

/// Long-running routine kinds, one of each per community
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineRole {
    PolicyWatch,
    SubmissionMonitor,
    CommentMonitor,
}

impl RoutineRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PolicyWatch => "config",
            Self::SubmissionMonitor => "submissions",
            Self::CommentMonitor => "comments",
        }
    }
}

/// Name used in logs for one routine, e.g. "comments-balkans"
fn routine_name(role: RoutineRole, community: &str) -> String {
    format!("{}-{}", role.as_str(), community)
}

/// Main bot orchestrator
pub struct Orchestrator {
    ctx: Arc<BotContext>,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new(ctx: Arc<BotContext>) -> Self {
        Self { ctx }
    }

    /// Start every community's routines and run until one of them stops or
    /// `shutdown` resolves.
    ///
    /// Returns `Ok(())` on shutdown and the first routine failure otherwise.
    /// Failing to resolve a community during startup is also an error, and
    /// routines already started are watched while later ones are launched.
    #[instrument(skip(self, communities, shutdown), fields(communities = communities.len()))]
    pub async fn run<F>(&self, communities: &[String], shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut routines: Routines = JoinSet::new();

        for (index, name) in communities.iter().enumerate() {
            if index > 0 {
                tokio::select! {
                    _ = tokio::time::sleep(self.ctx.settings.startup_grace) => {}
                    Some(joined) = routines.join_next() => {
                        return Err(stop_all(&mut routines, joined).await);
                    }
                    _ = &mut shutdown => {
                        info!("Shutdown requested during startup");
                        routines.shutdown().await;
                        return Ok(());
                    }
                }
            }

            let community = tokio::select! {
                resolved = self.resolve(name) => resolved?,
                Some(joined) = routines.join_next() => {
                    return Err(stop_all(&mut routines, joined).await);
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested during startup");
                    routines.shutdown().await;
                    return Ok(());
                }
            };
            self.spawn_routines(&community, &mut routines);
        }

        info!(routines = routines.len(), "All communities started");

        tokio::select! {
            joined = routines.join_next() => {
                let Some(joined) = joined else {
                    anyhow::bail!("No routines left to run");
                };
                Err(stop_all(&mut routines, joined).await)
            }
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping all routines");
                routines.shutdown().await;
                Ok(())
            }
        }
    }

    /// Look up a community on the platform
    async fn resolve(&self, name: &str) -> Result<Community> {
        self.ctx
            .platform
            .fetch_community(name)
            .await
            .with_context(|| format!("Failed to resolve community r/{}", name))
    }

    /// Register the community's gate and spawn its three routines
    fn spawn_routines(&self, community: &Community, routines: &mut Routines) {
        self.ctx.registry.register(&community.id);

        let watcher = PolicyWatcher::new(self.ctx.clone(), community.clone());
        let label = routine_name(RoutineRole::PolicyWatch, &community.name);
        routines.spawn(async move { (label, watcher.run().await) });

        let submissions = SubmissionMonitor::new(self.ctx.clone(), community.clone());
        let label = routine_name(RoutineRole::SubmissionMonitor, &community.name);
        routines.spawn(async move { (label, submissions.run().await) });

        let comments = CommentMonitor::new(self.ctx.clone(), community.clone());
        let label = routine_name(RoutineRole::CommentMonitor, &community.name);
        routines.spawn(async move { (label, comments.run().await) });

        info!(%community, id = %community.id, "Community routines started");
    }
}

/// Turn a finished routine into an error and stop the rest
async fn stop_all(
    routines: &mut Routines,
    joined: Result<(String, Result<()>), JoinError>,
) -> anyhow::Error {
    let failure = match joined {
        Ok((name, Ok(()))) => anyhow::anyhow!("Routine {} stopped unexpectedly", name),
        Ok((name, Err(e))) => e.context(format!("Routine {} failed", name)),
        Err(e) => anyhow::Error::new(e).context("Routine panicked or was cancelled"),
    };

    error!(error = %format!("{:#}", failure), "Stopping all routines");
    routines.shutdown().await;
    failure
}
