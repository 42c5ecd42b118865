//! Error types for Clippress.
//!
//! Library crates use [`ClippressError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Clippress operations.
#[derive(Debug, thiserror::Error)]
pub enum ClippressError {
    /// The access token is unusable and a refresh attempt failed (or no
    /// refresh token exists). Fatal; never retried automatically.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// The document service rejected a call at the application level
    /// (non-zero envelope code).
    #[error("api error {code}: {message}")]
    Api { code: i64, message: String },

    /// Network failure or a response body we could not parse.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Data validation error (bad input, malformed token JSON, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ClippressError>;

impl ClippressError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an api error from an envelope code and message.
    pub fn api(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
