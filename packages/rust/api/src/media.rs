//! Media upload endpoint (multipart, outside the JSON body path).

use reqwest::multipart;
use tracing::debug;

use clippress_shared::{ClippressError, Result};

use crate::{ApiClient, parse_envelope};

/// Parent type for images attached to document blocks.
const PARENT_TYPE_DOCX_IMAGE: &str = "docx_image";

impl ApiClient {
    /// Upload image bytes to the media store, attached to `parent_block_id`.
    ///
    /// Returns the media token to bind to the block via a batch update.
    pub async fn upload_media(
        &self,
        file_name: &str,
        parent_block_id: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let token = self.bearer().await?;
        let url = format!("{}/medias/upload_all", self.base_url);
        let size = bytes.len();

        debug!(file_name, parent_block_id, size, "uploading media");

        let form = multipart::Form::new()
            .text("file_name", file_name.to_string())
            .text("parent_type", PARENT_TYPE_DOCX_IMAGE)
            .text("parent_node", parent_block_id.to_string())
            .text("size", size.to_string())
            .part(
                "file",
                multipart::Part::bytes(bytes).file_name(file_name.to_string()),
            );

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClippressError::Transport(format!("media upload: {e}")))?;

        let text = response
            .text()
            .await
            .map_err(|e| ClippressError::Transport(format!("media upload: body read: {e}")))?;

        let data = parse_envelope("/medias/upload_all", &text)?;

        data["file_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ClippressError::Transport("media upload: response has no file_token".into())
            })
    }
}
