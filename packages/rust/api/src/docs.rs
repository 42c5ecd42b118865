//! Document and block endpoints.

use reqwest::Method;
use serde::Serialize;

use clippress_shared::{ClippressError, Result};

use crate::ApiClient;

/// Block type code for a plain text paragraph.
pub const BLOCK_TYPE_TEXT: u32 = 2;

/// Block type code for an image placeholder.
pub const BLOCK_TYPE_IMAGE: u32 = 27;

// ---------------------------------------------------------------------------
// Block payloads
// ---------------------------------------------------------------------------

/// One child block in a block-creation request.
#[derive(Debug, Clone, Serialize)]
pub struct ChildBlock {
    pub block_type: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageBody>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextBody {
    pub elements: Vec<TextElement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextElement {
    pub text_run: TextRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextRun {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageBody {
    /// Media token; empty until the real image is patched in.
    pub token: String,
}

impl ChildBlock {
    /// Text paragraph block carrying one line of content.
    pub fn text(content: &str) -> Self {
        Self {
            block_type: BLOCK_TYPE_TEXT,
            text: Some(TextBody {
                elements: vec![TextElement {
                    text_run: TextRun {
                        content: content.to_string(),
                    },
                }],
            }),
            image: None,
        }
    }

    /// Image block with an empty media token, to be patched after upload.
    pub fn image_placeholder() -> Self {
        Self {
            block_type: BLOCK_TYPE_IMAGE,
            text: None,
            image: Some(ImageBody {
                token: String::new(),
            }),
        }
    }
}

/// One entry of a `batch_update` request: bind a media token to a block.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateRequest {
    pub block_id: String,
    pub replace_image: ReplaceImage,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplaceImage {
    pub token: String,
}

impl UpdateRequest {
    pub fn replace_image(block_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            block_id: block_id.into(),
            replace_image: ReplaceImage {
                token: token.into(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

impl ApiClient {
    /// Create an empty document under `folder_token` and return its id.
    pub async fn create_document(&self, folder_token: &str, title: &str) -> Result<String> {
        let data = self
            .call(
                Method::POST,
                "/documents",
                Some(serde_json::json!({
                    "folder_token": folder_token,
                    "title": title,
                })),
            )
            .await?;

        data["document"]["document_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ClippressError::Transport("create document: response has no document_id".into())
            })
    }

    /// Append `children` to the end of the document's root block.
    ///
    /// Returns the server-assigned block ids in the same order as
    /// `children`; one batch is one atomic call, so in-batch ordering is
    /// guaranteed by the service.
    pub async fn append_blocks(
        &self,
        document_id: &str,
        children: &[ChildBlock],
    ) -> Result<Vec<String>> {
        let path = format!("/documents/{document_id}/blocks/{document_id}/children");
        let data = self
            .call(
                Method::POST,
                &path,
                Some(serde_json::json!({
                    "children": children,
                    // -1 appends at the end of the parent block.
                    "index": -1,
                })),
            )
            .await?;

        let ids: Vec<String> = data["children"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b["block_id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        if ids.len() != children.len() {
            return Err(ClippressError::Transport(format!(
                "append blocks: sent {} children, got {} block ids back",
                children.len(),
                ids.len()
            )));
        }

        Ok(ids)
    }

    /// Apply a batch of block updates in one call.
    pub async fn batch_update_blocks(
        &self,
        document_id: &str,
        requests: &[UpdateRequest],
    ) -> Result<()> {
        let path = format!("/documents/{document_id}/blocks/batch_update");
        self.call(
            Method::PATCH,
            &path,
            Some(serde_json::json!({ "requests": requests })),
        )
        .await?;
        Ok(())
    }
}
