//! Reddit inbox integration.
//!
//! Reads username mentions and private messages from the bot account's
//! inbox and replies to them.
//!
//! API docs: https://www.reddit.com/dev/api
//! Auth: OAuth2 "password" grant for script apps; bearer token on
//! `oauth.reddit.com`, valid for about an hour.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::MessageSource;
use crate::config::{AppConfig, RedditConfig};
use crate::types::{InboxItem, PostKind};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const OAUTH_BASE_URL: &str = "https://oauth.reddit.com";
const PLATFORM_NAME: &str = "reddit";

/// Refresh the token this long before Reddit says it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// API response types (Reddit JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

/// A "thing" wrapper: `kind` is `t1` (comment), `t3` (post), `t4` (message).
#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: ThingData,
}

#[derive(Debug, Deserialize)]
struct ThingData {
    id: String,
    /// Full name, e.g. `t1_abc123`.
    name: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    body: Option<String>,
    /// Self-post text, present on `t3` things.
    #[serde(default)]
    selftext: Option<String>,
}

/// `POST /api/comment` with `api_type=json`.
#[derive(Debug, Deserialize)]
struct CommentResponse {
    json: CommentResponseJson,
}

#[derive(Debug, Deserialize)]
struct CommentResponseJson {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Script-app credentials.
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub username: String,
    pub password: SecretString,
}

impl RedditCredentials {
    /// Resolve credentials from the env vars named in the config.
    pub fn from_config(cfg: &RedditConfig) -> Result<Self> {
        Ok(Self {
            client_id: AppConfig::resolve_env(&cfg.client_id_env)?,
            client_secret: SecretString::new(AppConfig::resolve_env(&cfg.client_secret_env)?),
            username: AppConfig::resolve_env(&cfg.username_env)?,
            password: SecretString::new(AppConfig::resolve_env(&cfg.password_env)?),
        })
    }
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Reddit inbox client.
pub struct RedditClient {
    http: Client,
    credentials: RedditCredentials,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    pub fn new(credentials: RedditCredentials, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client for Reddit")?;

        Ok(Self {
            http,
            credentials,
            token: Mutex::new(None),
        })
    }

    // -- Internal helpers ------------------------------------------------

    /// Return a valid bearer token, fetching a new one when needed.
    async fn bearer(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!(username = %self.credentials.username, "Requesting Reddit access token");
        let resp = self
            .http
            .post(TOKEN_URL)
            .basic_auth(
                &self.credentials.client_id,
                Some(self.credentials.client_secret.expose_secret()),
            )
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.expose_secret().as_str()),
            ])
            .send()
            .await
            .context("Reddit token request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Reddit token endpoint returned {status}");
        }

        let body: TokenResponse = resp
            .json()
            .await
            .context("Failed to parse Reddit token response")?;

        let value = match (body.access_token, body.error) {
            (Some(token), _) => token,
            (None, Some(err)) => anyhow::bail!("Reddit refused credentials: {err}"),
            (None, None) => anyhow::bail!("Reddit token response had no access_token"),
        };

        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));
        let expires_at = Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN);
        info!(expires_in_secs = lifetime.as_secs(), "Reddit access token acquired");

        *guard = Some(AccessToken {
            value: value.clone(),
            expires_at,
        });
        Ok(value)
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<reqwest::Response> {
        let token = self.bearer().await?;
        let url = format!("{OAUTH_BASE_URL}{path}");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .form(form)
            .send()
            .await
            .with_context(|| format!("Reddit request to {path} failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Reddit API error {status} on {path}: {body}");
        }
        Ok(resp)
    }

    /// Convert listing children into inbox items, oldest first.
    fn listing_to_items(listing: Listing) -> Vec<InboxItem> {
        let mut items: Vec<InboxItem> = listing
            .data
            .children
            .into_iter()
            .filter_map(|thing| {
                let Some(kind) = PostKind::from_thing_kind(&thing.kind) else {
                    debug!(kind = %thing.kind, id = %thing.data.id, "Skipping unsupported inbox thing");
                    return None;
                };
                let body = thing
                    .data
                    .body
                    .or(thing.data.selftext)
                    .unwrap_or_default();
                Some(InboxItem {
                    id: thing.data.id,
                    fullname: thing.data.name,
                    author: thing.data.author,
                    body,
                    kind,
                })
            })
            .collect();
        // Reddit lists newest first.
        items.reverse();
        items
    }
}

#[async_trait]
impl MessageSource for RedditClient {
    async fn fetch_unread(&self, limit: u32) -> Result<Vec<InboxItem>> {
        let token = self.bearer().await?;
        let url = format!("{OAUTH_BASE_URL}/message/unread?limit={limit}&mark=false&raw_json=1");

        debug!(url = %url, "Fetching Reddit inbox");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("Reddit inbox request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Reddit API error {status}: {body}");
        }

        let listing: Listing = resp
            .json()
            .await
            .context("Failed to parse Reddit inbox listing")?;

        let items = Self::listing_to_items(listing);
        debug!(count = items.len(), "Fetched unread inbox items");
        Ok(items)
    }

    async fn mark_read(&self, item: &InboxItem) -> Result<()> {
        self.post_form("/api/read_message", &[("id", item.fullname.as_str())])
            .await?;
        debug!(id = %item.id, "Marked inbox item read");
        Ok(())
    }

    async fn reply(&self, item: &InboxItem, text: &str) -> Result<()> {
        let resp = self
            .post_form(
                "/api/comment",
                &[
                    ("api_type", "json"),
                    ("thing_id", item.fullname.as_str()),
                    ("text", text),
                ],
            )
            .await?;

        let body: CommentResponse = resp
            .json()
            .await
            .context("Failed to parse Reddit comment response")?;

        if !body.json.errors.is_empty() {
            warn!(id = %item.id, errors = ?body.json.errors, "Reddit rejected reply");
            anyhow::bail!("Reddit rejected reply to {}: {:?}", item.fullname, body.json.errors);
        }

        info!(id = %item.id, kind = %item.kind, "Reply posted");
        Ok(())
    }

    fn name(&self) -> &str {
        PLATFORM_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
