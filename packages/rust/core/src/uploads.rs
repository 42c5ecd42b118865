//! Per-batch media transfer: download each image, re-upload it to the
//! service's media store, then bind the tokens to their blocks in one
//! batched patch.
//!
//! Every per-image failure degrades to "image omitted": the batch keeps
//! going, and the outcome is recorded in the returned report as well as the
//! log. Only the block-creation path can abort a publish, never media.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use clippress_api::{ApiClient, UpdateRequest};

/// Upper bound on simultaneous download+upload transfers within one batch.
const MAX_CONCURRENT_TRANSFERS: usize = 8;

/// An image placeholder block waiting for its media.
#[derive(Debug, Clone)]
pub(crate) struct ImageSlot {
    pub block_id: String,
    pub source_url: String,
}

/// Final state of one image transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// Media uploaded and bound to its block.
    Uploaded { token: String },
    /// Transfer or binding failed; the block keeps its empty placeholder.
    Failed { reason: String },
}

/// Per-image entry of the publish report.
#[derive(Debug, Clone)]
pub struct ImageReport {
    pub source_url: String,
    pub block_id: String,
    pub outcome: ImageOutcome,
}

/// Transfer all images of one batch and patch the successful ones in.
///
/// Transfers run concurrently, bounded by [`MAX_CONCURRENT_TRANSFERS`];
/// results are matched by block id, so completion order is irrelevant. The
/// patch call is skipped when nothing succeeded, and its own failure is
/// swallowed (the document keeps placeholder blocks and the report says so).
pub(crate) async fn upload_and_bind(
    client: &ApiClient,
    downloader: &reqwest::Client,
    document_id: &str,
    slots: Vec<ImageSlot>,
) -> Vec<ImageReport> {
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_TRANSFERS));
    let mut handles = Vec::with_capacity(slots.len());

    for slot in slots {
        let client = client.clone();
        let downloader = downloader.clone();
        let semaphore = semaphore.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            let outcome = transfer_one(&client, &downloader, &slot).await;
            (slot, outcome)
        }));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok((slot, outcome)) => {
                if let ImageOutcome::Failed { reason } = &outcome {
                    warn!(url = %slot.source_url, block_id = %slot.block_id, %reason, "image omitted");
                }
                reports.push(ImageReport {
                    source_url: slot.source_url,
                    block_id: slot.block_id,
                    outcome,
                });
            }
            Err(e) => {
                warn!(error = %e, "image transfer task panicked");
            }
        }
    }

    let requests: Vec<UpdateRequest> = reports
        .iter()
        .filter_map(|r| match &r.outcome {
            ImageOutcome::Uploaded { token } => {
                Some(UpdateRequest::replace_image(&r.block_id, token))
            }
            ImageOutcome::Failed { .. } => None,
        })
        .collect();

    if requests.is_empty() {
        debug!("no successful uploads in batch, skipping patch");
        return reports;
    }

    if let Err(e) = client.batch_update_blocks(document_id, &requests).await {
        // Best effort: the document exists and reads fine without images.
        warn!(error = %e, bindings = requests.len(), "media patch failed, placeholders remain");
        for report in &mut reports {
            if matches!(report.outcome, ImageOutcome::Uploaded { .. }) {
                report.outcome = ImageOutcome::Failed {
                    reason: format!("media patch failed: {e}"),
                };
            }
        }
    }

    reports
}

/// Download one image and upload it to the media store.
async fn transfer_one(
    client: &ApiClient,
    downloader: &reqwest::Client,
    slot: &ImageSlot,
) -> ImageOutcome {
    let bytes = match download(downloader, &slot.source_url).await {
        Ok(bytes) => bytes,
        Err(reason) => return ImageOutcome::Failed { reason },
    };

    let file_name = file_name_from_url(&slot.source_url);
    match client
        .upload_media(&file_name, &slot.block_id, bytes)
        .await
    {
        Ok(token) => ImageOutcome::Uploaded { token },
        Err(e) => ImageOutcome::Failed {
            reason: format!("upload failed: {e}"),
        },
    }
}

/// Fetch the source bytes of an image.
async fn download(downloader: &reqwest::Client, url: &str) -> Result<Vec<u8>, String> {
    let response = downloader
        .get(url)
        .send()
        .await
        .map_err(|e| format!("download failed: {e}"))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("download failed: HTTP {status}"));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| format!("download body read failed: {e}"))?;
    Ok(bytes.to_vec())
}

/// Derive an upload file name from the source URL's last path segment.
fn file_name_from_url(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|url| {
            url.path_segments()?
                .filter(|segment| !segment.is_empty())
                .next_back()
                .map(str::to_string)
        })
        .unwrap_or_else(|| "image".to_string())
}
