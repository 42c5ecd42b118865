//! Drive folder lookup and user profile — thin, best-effort calls.

use reqwest::Method;
use serde::Deserialize;
use tracing::warn;

use clippress_shared::{ClippressError, Result};

use crate::ApiClient;

/// Profile of the user the session belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub open_id: Option<String>,
}

impl ApiClient {
    /// Token of the drive's root folder, best effort.
    ///
    /// Falls back to the empty token (the service treats it as "my space"
    /// root) when the lookup fails for any reason; a publish should not die
    /// on a folder lookup.
    pub async fn root_folder_token(&self) -> String {
        match self
            .call(Method::GET, "/drive/explorer/v2/root_folder/meta", None)
            .await
        {
            Ok(data) => data["token"].as_str().unwrap_or("").to_string(),
            Err(e) => {
                warn!(error = %e, "root folder lookup failed, using drive root");
                String::new()
            }
        }
    }

    /// Profile of the current user, fetched once and cached for the
    /// client's lifetime.
    pub async fn user_profile(&self) -> Result<UserProfile> {
        let profile = self
            .profile
            .get_or_try_init(|| async {
                let data = self.call(Method::GET, "/authen/v1/user_info", None).await?;
                serde_json::from_value(data).map_err(|e| {
                    ClippressError::Transport(format!("user info: malformed payload: {e}"))
                })
            })
            .await?;
        Ok(profile.clone())
    }
}
