//! Core domain types shared across the Clippress crates.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CredentialSnapshot
// ---------------------------------------------------------------------------

/// An immutable view of the current credentials.
///
/// Held in the token manager's credential cell and replaced wholesale on a
/// successful refresh; everything outside the cell sees owned clones only.
/// This is also the on-disk shape of `credentials.json` (the JSON a user
/// pastes from the OAuth relay, plus the relay endpoint it came from).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSnapshot {
    /// Bearer token for the document service.
    pub access_token: String,
    /// Token accepted by the relay's refresh endpoint.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Epoch seconds after which `access_token` is no longer guaranteed
    /// valid. `None` means unknown / non-expiring: the token is used as-is.
    #[serde(default)]
    pub expires_at: Option<i64>,
    /// Base URL of the OAuth relay that issued (and can refresh) the pair.
    pub relay_endpoint: String,
}

// ---------------------------------------------------------------------------
// TokenGrant
// ---------------------------------------------------------------------------

/// Token pair as returned by the relay's exchange/refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds from the moment of issue.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenGrant {
    /// Turn a freshly issued grant into a snapshot, anchoring `expires_in`
    /// at `now` (epoch seconds).
    pub fn into_snapshot(self, relay_endpoint: &str, now: i64) -> CredentialSnapshot {
        CredentialSnapshot {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|ttl| now + ttl),
            relay_endpoint: relay_endpoint.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// CompletionRecord
// ---------------------------------------------------------------------------

/// Final output of one successful publish operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRecord {
    /// Human-followable link to the created document.
    pub href: String,
    /// Folder the document was created under.
    pub folder_token: String,
    /// Server-assigned document identifier.
    pub document_id: String,
}
