//! Event monitors.
//!
//! Each community gets a submission monitor and a comment monitor. Both wait
//! for the community's readiness gate, then consume their live stream one
//! event at a time: record the id, look up the policy, and act on content
//! from authors without flair. A failed platform call is logged and the
//! stream carries on.

use std::sync::Arc;

use anyhow::Result;
use rand::seq::SliceRandom;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{Comment, Community, EventKind, Flaired, Submission, UnflairedAction};

use super::context::BotContext;
use super::formatter::{render, MessageContext};
use super::seen_store::RecordOutcome;

/// Mod note attached when removing an unflaired post
pub const POST_REMOVAL_NOTE: &str = "Unflaired post";

/// Mod note attached when removing an unflaired comment
pub const COMMENT_REMOVAL_NOTE: &str = "Unflaired comment";

/// What processing an event amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Already recorded earlier; nothing was done
    Duplicate,

    /// Could not be recorded; skipped without acting
    StoreFailed,

    /// Evaluated against the community's policy
    Evaluated {
        /// Unflaired action that was attempted, if any
        enforced: Option<UnflairedAction>,

        /// A general per-post reply was posted
        replied: bool,
    },
}

impl EventOutcome {
    fn untouched() -> Self {
        Self::Evaluated {
            enforced: None,
            replied: false,
        }
    }
}

/// State and platform actions shared by both monitors
struct MonitorCore {
    ctx: Arc<BotContext>,
    community: Community,
}

impl MonitorCore {
    /// Record the event; `None` means stop processing it
    async fn record(&self, kind: EventKind, id: &str) -> Option<EventOutcome> {
        match self.ctx.store.record_if_absent(kind, id).await {
            Ok(RecordOutcome::Inserted) => None,
            Ok(RecordOutcome::AlreadyPresent) => Some(EventOutcome::Duplicate),
            Err(e) => {
                error!(community = %self.community, %kind, event_id = id, error = %e, "Could not record event");
                Some(EventOutcome::StoreFailed)
            }
        }
    }

    /// Pick one template at random and render it
    fn render_random(&self, templates: &[String], context: &MessageContext<'_>, event_id: &str) -> Option<String> {
        let Some(template) = templates.choose(&mut rand::thread_rng()) else {
            warn!(community = %self.community, event_id, "Policy has no messages for this action");
            return None;
        };

        match render(template, context) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(community = %self.community, event_id, error = %e, "Could not render message template");
                None
            }
        }
    }

    async fn try_remove(&self, fullname: &str, note: &str, event_id: &str) {
        match self.ctx.platform.remove(fullname, note).await {
            Ok(()) => debug!(community = %self.community, event_id, "Removed unflaired content"),
            Err(e) => warn!(community = %self.community, event_id, error = %e, "Could not remove unflaired content"),
        }
    }

    /// Message the author. Returns false if there was nobody to message.
    async fn try_message(&self, author: Option<&str>, subject: &str, body: &str, event_id: &str) -> bool {
        let Some(recipient) = author else {
            warn!(community = %self.community, event_id, "Author is deleted, cannot message");
            return false;
        };

        match self.ctx.platform.message(recipient, subject, body).await {
            Ok(()) => debug!(community = %self.community, event_id, recipient, "Messaged author"),
            Err(e) => error!(community = %self.community, event_id, error = %e, "Could not send message to user"),
        }
        true
    }

    /// Reply and distinguish the reply as a moderator. Returns true if the
    /// reply was posted.
    async fn try_reply(&self, parent_fullname: &str, text: &str, sticky: bool, event_id: &str) -> bool {
        let reply = match self.ctx.platform.reply(parent_fullname, text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(community = %self.community, event_id, error = %e, "Could not reply");
                return false;
            }
        };

        if let Err(e) = self.ctx.platform.distinguish(&reply, sticky).await {
            error!(community = %self.community, event_id, reply = %reply.fullname, error = %e, "Could not distinguish reply");
        }

        debug!(community = %self.community, event_id, sticky, "Replied");
        true
    }
}

/// Watches new posts in one community
pub struct SubmissionMonitor {
    core: MonitorCore,
}

impl SubmissionMonitor {
    pub fn new(ctx: Arc<BotContext>, community: Community) -> Self {
        Self {
            core: MonitorCore { ctx, community },
        }
    }

    /// Wait for the gate, then process the stream until it closes
    #[instrument(skip(self), fields(community = %self.core.community))]
    pub async fn run(self) -> Result<()> {
        let ctx = &self.core.ctx;
        let community = &self.core.community;

        ctx.registry.wait_ready(&community.id).await?;
        info!("Monitoring submissions");

        let mut stream = ctx.platform.stream_submissions(community).await?;
        while let Some(submission) = stream.recv().await {
            let outcome = self.handle(&submission).await;
            debug!(event_id = %submission.id, ?outcome, "Submission processed");
        }

        anyhow::bail!("Submission stream for {} ended", community)
    }

    /// Process one post
    pub async fn handle(&self, submission: &Submission) -> EventOutcome {
        let core = &self.core;
        if let Some(outcome) = core.record(EventKind::Submission, &submission.id).await {
            return outcome;
        }
        debug!(community = %core.community, event_id = %submission.id, title = %submission.title, "New submission");

        let policy = core.ctx.registry.current(&core.community.id);
        let context = MessageContext::for_submission(&core.community, submission);
        let event_id = submission.id.as_str();

        let mut enforced = None;
        // Held back for the general reply so a post only gets one reply
        let mut deferred_message = String::new();

        let exempt = policy.is_whitelisted(submission.author.as_deref(), &core.ctx.identity);
        if submission.is_unflaired() && !exempt {
            match policy.unflaired_post_action {
                UnflairedAction::Ignore => {}
                UnflairedAction::Remove => {
                    core.try_remove(&submission.fullname, POST_REMOVAL_NOTE, event_id)
                        .await;
                    return EventOutcome::Evaluated {
                        enforced: Some(UnflairedAction::Remove),
                        replied: false,
                    };
                }
                UnflairedAction::Message => {
                    if let Some(body) = core.render_random(&policy.unflaired_post_messages, &context, event_id) {
                        let sent = core
                            .try_message(
                                submission.author.as_deref(),
                                &policy.unflaired_post_subject,
                                &body,
                                event_id,
                            )
                            .await;
                        if sent {
                            enforced = Some(UnflairedAction::Message);
                        }
                    }
                }
                UnflairedAction::Reply => {
                    if let Some(body) = core.render_random(&policy.unflaired_post_messages, &context, event_id) {
                        enforced = Some(UnflairedAction::Reply);
                        if policy.reply_on_posts {
                            deferred_message = body;
                        } else {
                            core.try_reply(&submission.fullname, &body, false, event_id)
                                .await;
                        }
                    }
                }
            }
        }

        let mut replied = false;
        if policy.reply_on_posts {
            let context = context.with_unflaired_message(&deferred_message);
            match render(&policy.reply_message, &context) {
                Ok(text) => {
                    replied = core
                        .try_reply(&submission.fullname, &text, policy.reply_is_pinned, event_id)
                        .await;
                }
                Err(e) => {
                    warn!(community = %core.community, event_id, error = %e, "Could not render reply message");
                }
            }
        }

        EventOutcome::Evaluated { enforced, replied }
    }
}

/// Watches new comments in one community
pub struct CommentMonitor {
    core: MonitorCore,
}

impl CommentMonitor {
    pub fn new(ctx: Arc<BotContext>, community: Community) -> Self {
        Self {
            core: MonitorCore { ctx, community },
        }
    }

    /// Wait for the gate, then process the stream until it closes
    #[instrument(skip(self), fields(community = %self.core.community))]
    pub async fn run(self) -> Result<()> {
        let ctx = &self.core.ctx;
        let community = &self.core.community;

        ctx.registry.wait_ready(&community.id).await?;
        info!("Monitoring comments");

        let mut stream = ctx.platform.stream_comments(community).await?;
        while let Some(comment) = stream.recv().await {
            let outcome = self.handle(&comment).await;
            debug!(event_id = %comment.id, ?outcome, "Comment processed");
        }

        anyhow::bail!("Comment stream for {} ended", community)
    }

    /// Process one comment
    pub async fn handle(&self, comment: &Comment) -> EventOutcome {
        let core = &self.core;
        if let Some(outcome) = core.record(EventKind::Comment, &comment.id).await {
            return outcome;
        }
        debug!(
            community = %core.community,
            event_id = %comment.id,
            parent = comment.link_id.as_deref().unwrap_or("-"),
            "New comment"
        );

        let policy = core.ctx.registry.current(&core.community.id);
        if policy.is_whitelisted(comment.author.as_deref(), &core.ctx.identity) || !comment.is_unflaired() {
            return EventOutcome::untouched();
        }

        let context = MessageContext::for_comment(&core.community, comment);
        let event_id = comment.id.as_str();
        let action = policy.unflaired_comment_action;

        let attempted = match action {
            UnflairedAction::Ignore => false,
            UnflairedAction::Remove => {
                core.try_remove(&comment.fullname, COMMENT_REMOVAL_NOTE, event_id)
                    .await;
                true
            }
            UnflairedAction::Message => {
                match core.render_random(&policy.unflaired_comment_messages, &context, event_id) {
                    Some(body) => {
                        core.try_message(
                            comment.author.as_deref(),
                            &policy.unflaired_comment_subject,
                            &body,
                            event_id,
                        )
                        .await
                    }
                    None => false,
                }
            }
            UnflairedAction::Reply => {
                match core.render_random(&policy.unflaired_comment_messages, &context, event_id) {
                    Some(body) => {
                        core.try_reply(&comment.fullname, &body, false, event_id).await;
                        true
                    }
                    None => false,
                }
            }
        };

        EventOutcome::Evaluated {
            enforced: attempted.then_some(action),
            replied: false,
        }
    }
}
