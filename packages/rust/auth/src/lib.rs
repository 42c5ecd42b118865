//! Token lifecycle management for the document service session.
//!
//! [`TokenManager`] owns the credential cell: a single-writer
//! `Mutex<CredentialSnapshot>` whose only mutation path is a successful
//! refresh against the OAuth relay. Every caller goes through
//! [`TokenManager::access_token`], so a refresh performed mid-publish is
//! observed by all later calls in the same operation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use clippress_shared::{ClippressError, CredentialSnapshot, Result, TokenGrant};

/// Safety buffer subtracted from the recorded expiry before use, in seconds.
/// A token inside this window is treated as already expired.
const EXPIRY_BUFFER_SECS: i64 = 300;

/// Timeout for relay refresh requests.
const RELAY_TIMEOUT: Duration = Duration::from_secs(15);

/// User-Agent string for relay requests.
const USER_AGENT: &str = concat!("Clippress/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// TokenManager
// ---------------------------------------------------------------------------

/// Owns the current credential snapshot and refreshes it when stale.
///
/// Cheap to clone; clones share the same credential cell.
#[derive(Clone)]
pub struct TokenManager {
    cell: Arc<Mutex<CredentialSnapshot>>,
    client: reqwest::Client,
}

impl TokenManager {
    /// Create a manager around an initial credential snapshot.
    pub fn new(snapshot: CredentialSnapshot) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(RELAY_TIMEOUT)
            .build()
            .map_err(|e| ClippressError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            cell: Arc::new(Mutex::new(snapshot)),
            client,
        })
    }

    /// Return an access token valid for at least the buffer window.
    ///
    /// If the recorded expiry is within [`EXPIRY_BUFFER_SECS`] of now, the
    /// snapshot is refreshed through the relay first and replaced wholesale.
    /// A snapshot without a recorded expiry is returned as-is. Any refresh
    /// failure is fatal ([`ClippressError::SessionExpired`]) and never
    /// retried here.
    pub async fn access_token(&self) -> Result<String> {
        let mut snapshot = self.cell.lock().await;

        let now = Utc::now().timestamp();
        let stale = match snapshot.expires_at {
            Some(expires_at) => now > expires_at - EXPIRY_BUFFER_SECS,
            None => false,
        };

        if stale {
            debug!(expires_at = ?snapshot.expires_at, "access token stale, refreshing");
            *snapshot = self.refresh(&snapshot, now).await?;
            info!(expires_at = ?snapshot.expires_at, "access token refreshed");
        }

        Ok(snapshot.access_token.clone())
    }

    /// Current snapshot, cloned out of the cell.
    ///
    /// The pipeline never persists credentials; the caller reads this after
    /// a publish and saves it if durability is wanted.
    pub async fn snapshot(&self) -> CredentialSnapshot {
        self.cell.lock().await.clone()
    }

    /// Exchange the refresh token for a new pair at `<relay>/refresh`.
    async fn refresh(&self, current: &CredentialSnapshot, now: i64) -> Result<CredentialSnapshot> {
        let refresh_token = current.refresh_token.as_deref().ok_or_else(|| {
            ClippressError::SessionExpired("no refresh token available".to_string())
        })?;

        let relay = current.relay_endpoint.trim_end_matches('/');
        if relay.is_empty() {
            return Err(ClippressError::SessionExpired(
                "no relay endpoint configured".to_string(),
            ));
        }

        let url = format!("{relay}/refresh");
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "token refresh request failed");
                ClippressError::SessionExpired(format!("refresh request failed: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ClippressError::SessionExpired(format!("refresh response unreadable: {e}"))
        })?;

        if !status.is_success() {
            warn!(%status, "relay rejected token refresh");
            return Err(ClippressError::SessionExpired(format!(
                "relay returned HTTP {status}"
            )));
        }

        // The relay answers either a token grant or `{"error": "..."}`.
        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            ClippressError::SessionExpired(format!("malformed refresh response: {e}"))
        })?;

        if let Some(err) = value.get("error").and_then(|v| v.as_str()) {
            warn!(error = %err, "relay reported refresh error");
            return Err(ClippressError::SessionExpired(format!(
                "relay refused refresh: {err}"
            )));
        }

        let grant: TokenGrant = serde_json::from_value(value).map_err(|e| {
            ClippressError::SessionExpired(format!("malformed refresh response: {e}"))
        })?;

        let mut next = grant.into_snapshot(relay, now);
        // A relay that omits the rotated refresh token keeps the old one usable.
        if next.refresh_token.is_none() {
            next.refresh_token = current.refresh_token.clone();
        }
        Ok(next)
    }
}
