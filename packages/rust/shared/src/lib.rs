//! Shared types, error model, and configuration for Clippress.
//!
//! This crate is the foundation depended on by all other Clippress crates.
//! It provides:
//! - [`ClippressError`] — the unified error type
//! - Domain types ([`CredentialSnapshot`], [`TokenGrant`], [`CompletionRecord`])
//! - Configuration ([`AppConfig`], config and credentials loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, RelayConfig, ServiceConfig, config_dir, config_file_path,
    credentials_file_path, init_config, load_config, load_config_from, load_credentials,
    load_credentials_from, save_credentials,
};
pub use error::{ClippressError, Result};
pub use types::{CompletionRecord, CredentialSnapshot, TokenGrant};
