//! Reddit API adapter.
//!
//! Talks to the OAuth API with a script-app password grant. Live streams are
//! polling loops over the `new` and `comments` listings, in the same manner
//! as the official clients: each poll yields unseen items oldest first and
//! backs off while the community is quiet.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use super::{DocumentFetch, EventStream, Platform};
use crate::domain::{Comment, Community, ReplyHandle, Submission};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

/// Refresh the token this long before Reddit says it expires
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Items requested per listing poll (Reddit's maximum)
const LISTING_LIMIT: u32 = 100;

/// How many recently seen full names a stream remembers
const SEEN_WINDOW: usize = 301;

const MIN_IDLE_DELAY: Duration = Duration::from_secs(1);
const MAX_IDLE_DELAY: Duration = Duration::from_secs(16);

/// Buffered events per stream before the poller waits on the consumer
const STREAM_BUFFER: usize = 100;

/// Credentials for a Reddit script application
#[derive(Clone, Serialize, Deserialize)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Cached bearer token
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

struct ClientInner {
    credentials: RedditCredentials,
    http: reqwest::Client,
    token: Mutex<Option<AccessToken>>,
}

/// Reddit API client (cheap to clone; clones share the token cache)
#[derive(Clone)]
pub struct RedditClient {
    inner: Arc<ClientInner>,
}

/// Response from the token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

/// A `{ kind, data }` wrapper as returned by most endpoints
#[derive(Debug, Deserialize)]
struct Thing<T> {
    kind: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    children: Vec<Thing<T>>,
}

#[derive(Debug, Deserialize)]
struct Me {
    name: String,
}

#[derive(Debug, Deserialize)]
struct About {
    id: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct WikiPage {
    content_md: String,
}

#[derive(Debug, Deserialize)]
struct RawSubmission {
    id: String,
    name: String,
    #[serde(default)]
    title: String,
    author: Option<String>,
    author_flair_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    name: String,
    #[serde(default)]
    body: String,
    author: Option<String>,
    author_flair_text: Option<String>,
    link_id: Option<String>,
}

/// Envelope for `api_type=json` write endpoints
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    json: ApiBody,
}

#[derive(Debug, Deserialize)]
struct ApiBody {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(default)]
    things: Vec<Thing<ThingName>>,
}

#[derive(Debug, Deserialize)]
struct ThingName {
    name: String,
}

/// Reddit reports deleted accounts as "[deleted]"
fn normalize_author(author: Option<String>) -> Option<String> {
    author.filter(|name| name != "[deleted]")
}

/// Listing item that can be fed into an [`EventStream`]
trait Streamed: Send + 'static {
    type Raw: DeserializeOwned + Send;

    fn from_raw(raw: Self::Raw) -> Self;
    fn fullname(&self) -> &str;
}

impl Streamed for Submission {
    type Raw = RawSubmission;

    fn from_raw(raw: RawSubmission) -> Self {
        Submission {
            id: raw.id,
            fullname: raw.name,
            title: raw.title,
            author: normalize_author(raw.author),
            author_flair_text: raw.author_flair_text,
        }
    }

    fn fullname(&self) -> &str {
        &self.fullname
    }
}

impl Streamed for Comment {
    type Raw = RawComment;

    fn from_raw(raw: RawComment) -> Self {
        Comment {
            id: raw.id,
            fullname: raw.name,
            body: raw.body,
            author: normalize_author(raw.author),
            author_flair_text: raw.author_flair_text,
            link_id: raw.link_id,
        }
    }

    fn fullname(&self) -> &str {
        &self.fullname
    }
}

/// Bounded memory of recently yielded full names
struct SeenWindow {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl SeenWindow {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns true if the name was not seen before
    fn insert(&mut self, name: &str) -> bool {
        if self.members.contains(name) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.order.push_back(name.to_string());
        self.members.insert(name.to_string());
        true
    }
}

impl RedditClient {
    /// Create a new Reddit client
    pub fn new(credentials: RedditCredentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(credentials.user_agent.clone())
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                credentials,
                http,
                token: Mutex::new(None),
            }),
        })
    }

    /// Build API URL
    fn api_url(path: &str) -> String {
        format!("{}/{}", API_BASE, path.trim_start_matches('/'))
    }

    /// Return a valid bearer token, logging in again if needed
    async fn bearer(&self) -> Result<String> {
        let mut guard = self.inner.token.lock().await;
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let creds = &self.inner.credentials;
        let response: TokenResponse = self
            .inner
            .http
            .post(TOKEN_URL)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", creds.username.as_str()),
                ("password", creds.password.as_str()),
            ])
            .send()
            .await
            .context("Failed to request Reddit access token")?
            .json()
            .await
            .context("Failed to parse Reddit token response")?;

        if let Some(error) = response.error {
            anyhow::bail!("Reddit login failed: {}", error);
        }
        let value = response
            .access_token
            .context("Reddit token response had no access_token")?;
        let ttl = Duration::from_secs(response.expires_in.unwrap_or(3600));

        tracing::debug!(ttl_secs = ttl.as_secs(), "Obtained Reddit access token");
        *guard = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(value)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let token = self.bearer().await?;
        self.inner
            .http
            .get(Self::api_url(path))
            .bearer_auth(token)
            .query(&[("raw_json", "1")])
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {} failed", path))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.get(path, query).await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {} returned {}", path, status);
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))
    }

    /// POST a form to a write endpoint and check Reddit's error list
    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<ApiBody> {
        let token = self.bearer().await?;
        let mut fields = vec![("api_type", "json")];
        fields.extend_from_slice(form);

        let response = self
            .inner
            .http
            .post(Self::api_url(path))
            .bearer_auth(token)
            .form(&fields)
            .send()
            .await
            .with_context(|| format!("POST {} failed", path))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("POST {} returned {}", path, status);
        }

        let text = response.text().await.context("Failed to read response body")?;
        // Some moderation endpoints answer with an empty object
        let envelope: Option<ApiEnvelope> = serde_json::from_str(&text).ok();
        let body = envelope.map(|e| e.json).unwrap_or(ApiBody {
            errors: Vec::new(),
            data: None,
        });

        if !body.errors.is_empty() {
            anyhow::bail!("Reddit API error on {}: {:?}", path, body.errors);
        }
        Ok(body)
    }

    /// Fetch one page of a listing, oldest first
    async fn fetch_listing<T: Streamed>(&self, path: &str) -> Result<Vec<T>> {
        let thing: Thing<Listing<T::Raw>> = self
            .get_json(path, &[("limit", LISTING_LIMIT.to_string())])
            .await?;
        let mut items: Vec<T> = thing
            .data
            .children
            .into_iter()
            .map(|child| T::from_raw(child.data))
            .collect();
        items.reverse();
        Ok(items)
    }

    /// Spawn a polling task that feeds unseen listing items into a channel
    fn spawn_stream<T: Streamed>(&self, path: String, label: String) -> EventStream<T> {
        let (tx, rx) = mpsc::channel::<T>(STREAM_BUFFER);
        let client = self.clone();

        tokio::spawn(async move {
            let mut seen = SeenWindow::new(SEEN_WINDOW);
            let mut idle_delay = MIN_IDLE_DELAY;

            tracing::debug!(stream = %label, "Stream started");

            while !tx.is_closed() {
                match client.fetch_listing::<T>(&path).await {
                    Ok(items) => {
                        let mut found = false;
                        for item in items {
                            if !seen.insert(item.fullname()) {
                                continue;
                            }
                            found = true;
                            if tx.send(item).await.is_err() {
                                tracing::debug!(stream = %label, "Stream consumer went away");
                                return;
                            }
                        }
                        if found {
                            idle_delay = MIN_IDLE_DELAY;
                            continue;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(stream = %label, error = %e, "Stream poll failed, retrying");
                    }
                }

                tokio::time::sleep(idle_delay).await;
                idle_delay = (idle_delay * 2).min(MAX_IDLE_DELAY);
            }
        });

        rx
    }
}

#[async_trait]
impl Platform for RedditClient {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn me(&self) -> Result<String> {
        let me: Me = self.get_json("api/v1/me", &[]).await?;
        Ok(me.name)
    }

    async fn fetch_community(&self, name: &str) -> Result<Community> {
        let path = format!("r/{}/about", name);
        let thing: Thing<About> = self
            .get_json(&path, &[])
            .await
            .with_context(|| format!("Failed to load subreddit r/{}", name))?;

        if thing.kind != "t5" {
            anyhow::bail!("r/{} is not a subreddit (got kind '{}')", name, thing.kind);
        }

        Ok(Community {
            id: thing.data.id,
            name: thing.data.display_name,
        })
    }

    async fn stream_submissions(&self, community: &Community) -> Result<EventStream<Submission>> {
        Ok(self.spawn_stream(
            format!("r/{}/new", community.name),
            format!("submissions-{}", community.name),
        ))
    }

    async fn stream_comments(&self, community: &Community) -> Result<EventStream<Comment>> {
        Ok(self.spawn_stream(
            format!("r/{}/comments", community.name),
            format!("comments-{}", community.name),
        ))
    }

    async fn fetch_policy_document(
        &self,
        community: &Community,
        page_name: &str,
    ) -> Result<DocumentFetch> {
        let path = format!("r/{}/wiki/{}", community.name, page_name);
        let response = self.get(&path, &[]).await?;

        match response.status() {
            StatusCode::FORBIDDEN => Ok(DocumentFetch::AccessDenied),
            StatusCode::NOT_FOUND => Ok(DocumentFetch::NotFound),
            status if status.is_success() => {
                let page: Thing<WikiPage> = response
                    .json()
                    .await
                    .with_context(|| format!("Failed to parse wiki page {}", path))?;
                Ok(DocumentFetch::Fetched(page.data.content_md))
            }
            status => anyhow::bail!("GET {} returned {}", path, status),
        }
    }

    async fn reply(&self, parent_fullname: &str, text: &str) -> Result<ReplyHandle> {
        let body = self
            .post_form("api/comment", &[("thing_id", parent_fullname), ("text", text)])
            .await?;

        let fullname = body
            .data
            .and_then(|d| d.things.into_iter().next())
            .map(|thing| thing.data.name)
            .context("Reddit did not return the new comment")?;

        Ok(ReplyHandle { fullname })
    }

    async fn remove(&self, fullname: &str, mod_note: &str) -> Result<()> {
        self.post_form("api/remove", &[("id", fullname), ("spam", "false")])
            .await?;

        if !mod_note.is_empty() {
            let payload = serde_json::json!({
                "item_ids": [fullname],
                "mod_note": mod_note,
                "reason_id": null,
            })
            .to_string();
            self.post_form("api/v1/modactions/removal_reasons", &[("json", payload.as_str())])
                .await?;
        }

        Ok(())
    }

    async fn message(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        self.post_form(
            "api/compose",
            &[("to", recipient), ("subject", subject), ("text", body)],
        )
        .await?;
        Ok(())
    }

    async fn distinguish(&self, reply: &ReplyHandle, sticky: bool) -> Result<()> {
        let sticky = if sticky { "true" } else { "false" };
        self.post_form(
            "api/distinguish",
            &[("id", reply.fullname.as_str()), ("how", "yes"), ("sticky", sticky)],
        )
        .await?;
        Ok(())
    }
}
