//! Application configuration for Clippress.
//!
//! User config lives at `~/.clippress/clippress.toml`; the pasted token
//! JSON lives next to it as `credentials.json`. CLI flags override config
//! file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ClippressError, Result};
use crate::types::CredentialSnapshot;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "clippress.toml";

/// Credentials file name (the token JSON pasted from the relay).
const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".clippress";

// ---------------------------------------------------------------------------
// Config structs (matching clippress.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Document service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// OAuth relay settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Publish defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// `[service]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the document service's open API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Base URL for human-followable document links
    /// (final href is `<doc_link_base>/<document_id>`).
    #[serde(default = "default_doc_link_base")]
    pub doc_link_base: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            doc_link_base: default_doc_link_base(),
        }
    }
}

fn default_api_base() -> String {
    "https://open.feishu.cn/open-apis".into()
}
fn default_doc_link_base() -> String {
    "https://feishu.cn/docx".into()
}

/// `[relay]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// OAuth relay endpoint used to refresh expired tokens.
    /// Overrides the endpoint recorded in `credentials.json` when set.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Folder token documents are created under when `--folder` is absent.
    /// Empty means "look up the drive root at publish time".
    #[serde(default)]
    pub folder_token: String,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.clippress/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ClippressError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.clippress/clippress.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Get the path to the credentials file (`~/.clippress/credentials.json`).
pub fn credentials_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CREDENTIALS_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ClippressError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ClippressError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ClippressError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ClippressError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ClippressError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

// ---------------------------------------------------------------------------
// Credentials loading / saving
// ---------------------------------------------------------------------------

/// Load the credential snapshot from `credentials.json` at the given path.
pub fn load_credentials_from(path: &Path) -> Result<CredentialSnapshot> {
    let content = std::fs::read_to_string(path).map_err(|e| ClippressError::io(path, e))?;

    serde_json::from_str(&content).map_err(|e| {
        ClippressError::validation(format!(
            "failed to parse token JSON at {}: {e}",
            path.display()
        ))
    })
}

/// Load the credential snapshot from the default location.
pub fn load_credentials() -> Result<CredentialSnapshot> {
    let path = credentials_file_path()?;
    if !path.exists() {
        return Err(ClippressError::validation(format!(
            "no credentials found at {} — paste the relay's token JSON there first",
            path.display()
        )));
    }
    load_credentials_from(&path)
}

/// Persist a (possibly refreshed) credential snapshot back to disk.
///
/// The pipeline itself never calls this; the caller saves the final
/// snapshot after a publish so refreshed tokens survive a restart.
pub fn save_credentials(snapshot: &CredentialSnapshot) -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ClippressError::io(&dir, e))?;

    let path = dir.join(CREDENTIALS_FILE_NAME);
    let content = serde_json::to_string_pretty(snapshot)
        .map_err(|e| ClippressError::validation(e.to_string()))?;
    std::fs::write(&path, content).map_err(|e| ClippressError::io(&path, e))?;

    tracing::debug!(?path, "credentials saved");
    Ok(path)
}
