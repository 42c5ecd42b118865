//! Authenticated transport for the document service's open API.
//!
//! [`ApiClient`] obtains a bearer token from the token manager for every
//! call and normalizes the service's `{code, msg, data}` envelope: `code`
//! zero yields the payload under `data`, anything else becomes
//! [`ClippressError::Api`], and network or parse failures become
//! [`ClippressError::Transport`]. No call is retried.

mod docs;
mod drive;
mod media;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use tokio::sync::OnceCell;
use tracing::debug;

use clippress_auth::TokenManager;
use clippress_shared::{ClippressError, Result};

pub use docs::{
    BLOCK_TYPE_IMAGE, BLOCK_TYPE_TEXT, ChildBlock, ImageBody, ReplaceImage, TextBody, TextElement,
    TextRun, UpdateRequest,
};
pub use drive::UserProfile;

/// Timeout for document service requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("Clippress/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Bearer-authenticated client for the document service.
///
/// Cheap to clone; clones share the HTTP connection pool, the credential
/// cell, and the profile cache.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenManager,
    profile: Arc<OnceCell<UserProfile>>,
}

impl ApiClient {
    /// Create a client for the API at `base_url` (trailing slash tolerated).
    pub fn new(tokens: TokenManager, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClippressError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            profile: Arc::new(OnceCell::new()),
        })
    }

    /// Access to the shared token manager (for snapshot persistence).
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Bearer token for the next request, with all whitespace stripped.
    ///
    /// Tokens arrive via copy-paste from the relay's result page and
    /// routinely pick up stray spaces or newlines on the way.
    pub(crate) async fn bearer(&self) -> Result<String> {
        let token = self.tokens.access_token().await?;
        Ok(token.split_whitespace().collect())
    }

    /// Issue one API call and return the envelope's `data` payload.
    ///
    /// `data` is `Value::Null` when the envelope omits it (mutations with
    /// nothing to report).
    pub(crate) async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let token = self.bearer().await?;
        let url = format!("{}{path}", self.base_url);

        debug!(%method, %path, "document service call");

        let mut request = self.http.request(method, &url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClippressError::Transport(format!("{path}: {e}")))?;

        let text = response
            .text()
            .await
            .map_err(|e| ClippressError::Transport(format!("{path}: body read failed: {e}")))?;

        parse_envelope(path, &text)
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Parse the service's uniform `{code, msg, data}` envelope.
pub(crate) fn parse_envelope(path: &str, body: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ClippressError::Transport(format!("{path}: malformed response: {e}")))?;

    let code = value
        .get("code")
        .and_then(|c| c.as_i64())
        .ok_or_else(|| ClippressError::Transport(format!("{path}: response has no status code")))?;

    if code != 0 {
        let message = value
            .get("msg")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(ClippressError::api(code, message));
    }

    Ok(value.get("data").cloned().unwrap_or(serde_json::Value::Null))
}
