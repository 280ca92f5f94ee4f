//! Shared test fixtures: a scripted platform and context builders.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use flairwarden::adapters::{DocumentFetch, EventStream, Platform};
use flairwarden::core::{BotContext, BotSettings, SeenStore};
use flairwarden::domain::{Comment, Community, Policy, ReplyHandle, Submission};

pub const BOT_NAME: &str = "flairwarden";
pub const POLICY_PAGE: &str = "flairwarden";

/// Every platform call the bot made, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchCommunity(String),
    FetchDocument(String),
    StreamSubmissions(String),
    StreamComments(String),
    Reply { parent: String, text: String, handle: String },
    Remove { fullname: String, note: String },
    Message { recipient: String, subject: String, body: String },
    Distinguish { fullname: String, sticky: bool },
}

struct Streams<T> {
    sender: Option<mpsc::Sender<T>>,
    receiver: Option<mpsc::Receiver<T>>,
}

impl<T> Streams<T> {
    fn new() -> Self {
        let (sender, receiver) = mpsc::channel(64);
        Self {
            sender: Some(sender),
            receiver: Some(receiver),
        }
    }
}

/// Scripted platform. Communities are keyed by name for setup and by id
/// for everything the bot does afterwards (the id is "id-<name>").
#[derive(Default)]
pub struct MockPlatform {
    communities: Mutex<HashMap<String, Community>>,
    documents: Mutex<HashMap<String, VecDeque<Result<DocumentFetch, String>>>>,
    submissions: Mutex<HashMap<String, Streams<Submission>>>,
    comments: Mutex<HashMap<String, Streams<Comment>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Call>>,
    replies: AtomicUsize,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a community whose policy page responds with `document`
    pub fn add_community(&self, name: &str, document: DocumentFetch) -> Community {
        let community = Community {
            id: format!("id-{}", name),
            name: name.to_string(),
        };
        self.communities
            .lock()
            .unwrap()
            .insert(name.to_string(), community.clone());
        self.submissions
            .lock()
            .unwrap()
            .insert(community.id.clone(), Streams::new());
        self.comments
            .lock()
            .unwrap()
            .insert(community.id.clone(), Streams::new());
        self.set_document(&community, document);
        community
    }

    /// Replace the policy page response
    pub fn set_document(&self, community: &Community, document: DocumentFetch) {
        self.documents
            .lock()
            .unwrap()
            .insert(community.id.clone(), VecDeque::from([Ok(document)]));
    }

    /// Queue page responses; the last one keeps being served
    pub fn script_documents(&self, community: &Community, responses: Vec<Result<DocumentFetch, String>>) {
        self.documents
            .lock()
            .unwrap()
            .insert(community.id.clone(), responses.into());
    }

    pub async fn push_submission(&self, community: &Community, submission: Submission) {
        let sender = self.submissions.lock().unwrap()[&community.id]
            .sender
            .clone()
            .expect("submission stream closed");
        sender.send(submission).await.unwrap();
    }

    pub async fn push_comment(&self, community: &Community, comment: Comment) {
        let sender = self.comments.lock().unwrap()[&community.id]
            .sender
            .clone()
            .expect("comment stream closed");
        sender.send(comment).await.unwrap();
    }

    /// End a community's submission stream
    pub fn close_submissions(&self, community: &Community) {
        if let Some(streams) = self.submissions.lock().unwrap().get_mut(&community.id) {
            streams.sender = None;
        }
    }

    /// Make every action on this full name (or message to this user) fail
    pub fn fail_on(&self, target: &str) {
        self.failing.lock().unwrap().insert(target.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change something on the platform
    pub fn actions(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::Reply { .. } | Call::Remove { .. } | Call::Message { .. } | Call::Distinguish { .. }
                )
            })
            .collect()
    }

    pub fn replies(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Reply { .. }))
            .collect()
    }

    pub fn removals(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Remove { .. }))
            .collect()
    }

    pub fn messages(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Message { .. }))
            .collect()
    }

    /// Sticky flag the reply with this handle was distinguished with
    pub fn distinguished_sticky(&self, handle: &str) -> Option<bool> {
        self.calls().into_iter().find_map(|call| match call {
            Call::Distinguish { fullname, sticky } if fullname == handle => Some(sticky),
            _ => None,
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failing(&self, target: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(target) {
            anyhow::bail!("scripted failure for {}", target);
        }
        Ok(())
    }

    fn community_name(&self, id: &str) -> String {
        self.communities
            .lock()
            .unwrap()
            .values()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    async fn me(&self) -> Result<String> {
        Ok(BOT_NAME.to_string())
    }

    async fn fetch_community(&self, name: &str) -> Result<Community> {
        self.record(Call::FetchCommunity(name.to_string()));
        self.communities
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("subreddit r/{} not found", name))
    }

    async fn stream_submissions(&self, community: &Community) -> Result<EventStream<Submission>> {
        self.record(Call::StreamSubmissions(community.name.clone()));
        self.submissions
            .lock()
            .unwrap()
            .get_mut(&community.id)
            .and_then(|streams| streams.receiver.take())
            .ok_or_else(|| anyhow::anyhow!("no submission stream for {}", community))
    }

    async fn stream_comments(&self, community: &Community) -> Result<EventStream<Comment>> {
        self.record(Call::StreamComments(community.name.clone()));
        self.comments
            .lock()
            .unwrap()
            .get_mut(&community.id)
            .and_then(|streams| streams.receiver.take())
            .ok_or_else(|| anyhow::anyhow!("no comment stream for {}", community))
    }

    async fn fetch_policy_document(&self, community: &Community, page_name: &str) -> Result<DocumentFetch> {
        assert_eq!(page_name, POLICY_PAGE);
        self.record(Call::FetchDocument(self.community_name(&community.id)));

        let mut documents = self.documents.lock().unwrap();
        let queue = documents
            .get_mut(&community.id)
            .ok_or_else(|| anyhow::anyhow!("no policy page for {}", community))?;
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };

        match response {
            Some(Ok(document)) => Ok(document),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(DocumentFetch::NotFound),
        }
    }

    async fn reply(&self, parent_fullname: &str, text: &str) -> Result<ReplyHandle> {
        self.check_failing(parent_fullname)?;
        let n = self.replies.fetch_add(1, Ordering::SeqCst);
        let handle = format!("t1_reply{}", n);
        self.record(Call::Reply {
            parent: parent_fullname.to_string(),
            text: text.to_string(),
            handle: handle.clone(),
        });
        Ok(ReplyHandle { fullname: handle })
    }

    async fn remove(&self, fullname: &str, mod_note: &str) -> Result<()> {
        self.check_failing(fullname)?;
        self.record(Call::Remove {
            fullname: fullname.to_string(),
            note: mod_note.to_string(),
        });
        Ok(())
    }

    async fn message(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        self.check_failing(recipient)?;
        self.record(Call::Message {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    async fn distinguish(&self, reply: &ReplyHandle, sticky: bool) -> Result<()> {
        self.record(Call::Distinguish {
            fullname: reply.fullname.clone(),
            sticky,
        });
        Ok(())
    }
}

pub fn settings(startup_grace: Duration) -> BotSettings {
    BotSettings {
        policy_page: POLICY_PAGE.to_string(),
        refresh_interval: Duration::from_millis(20),
        startup_grace,
    }
}

/// Context over the mock with an in-memory seen store
pub fn context(platform: Arc<MockPlatform>, startup_grace: Duration) -> Arc<BotContext> {
    context_with_store(platform, SeenStore::open_in_memory().unwrap(), startup_grace)
}

pub fn context_with_store(
    platform: Arc<MockPlatform>,
    store: SeenStore,
    startup_grace: Duration,
) -> Arc<BotContext> {
    Arc::new(BotContext::new(
        platform,
        store,
        BOT_NAME.to_string(),
        settings(startup_grace),
    ))
}

/// Register the community and make `policy` live, as the watcher would
pub fn go_live(ctx: &BotContext, community: &Community, policy: Policy) {
    ctx.registry.register(&community.id);
    ctx.registry.publish(&community.id, policy);
    ctx.registry.open_gate(&community.id);
}

pub fn policy_document(policy: &Policy) -> DocumentFetch {
    DocumentFetch::Fetched(policy.to_yaml().unwrap())
}

pub fn submission(id: &str, author: Option<&str>, flair: Option<&str>) -> Submission {
    Submission {
        id: id.to_string(),
        fullname: format!("t3_{}", id),
        title: format!("Post {}", id),
        author: author.map(str::to_string),
        author_flair_text: flair.map(str::to_string),
    }
}

pub fn comment(id: &str, author: Option<&str>, flair: Option<&str>) -> Comment {
    Comment {
        id: id.to_string(),
        fullname: format!("t1_{}", id),
        body: format!("Comment {}", id),
        author: author.map(str::to_string),
        author_flair_text: flair.map(str::to_string),
        link_id: Some("t3_parent".to_string()),
    }
}

/// Poll `condition` until it holds, panicking after two seconds
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met in time");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
