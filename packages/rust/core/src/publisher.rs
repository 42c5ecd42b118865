//! Chunked block publishing: segments → remote blocks, batch by batch.

use tracing::{debug, info};

use clippress_api::{ApiClient, ChildBlock};
use clippress_content::Segment;
use clippress_shared::Result;

use crate::uploads::{self, ImageReport, ImageSlot};

/// Maximum children per block-creation call, imposed by the service's
/// payload limits.
pub(crate) const BATCH_SIZE: usize = 50;

/// Create blocks for all segments in order and transfer their images.
///
/// Batches are submitted strictly sequentially: each one appends at the end
/// of the document, so batch *n+1* must not go out before batch *n*'s
/// blocks exist. Within a batch the creation call is atomic and the service
/// preserves child order.
pub(crate) async fn publish_blocks(
    client: &ApiClient,
    downloader: &reqwest::Client,
    document_id: &str,
    segments: &[Segment],
) -> Result<Vec<ImageReport>> {
    let mut image_reports = Vec::new();
    let batch_count = segments.len().div_ceil(BATCH_SIZE);

    for (batch_index, batch) in segments.chunks(BATCH_SIZE).enumerate() {
        debug!(
            batch = batch_index + 1,
            of = batch_count,
            children = batch.len(),
            "creating block batch"
        );

        let children: Vec<ChildBlock> = batch.iter().map(block_for_segment).collect();
        let block_ids = client.append_blocks(document_id, &children).await?;

        // Pair server-assigned ids positionally with the originating
        // segments; only the image ones need further work.
        let slots: Vec<ImageSlot> = batch
            .iter()
            .zip(block_ids)
            .filter_map(|(segment, block_id)| match segment {
                Segment::Image { url } => Some(ImageSlot {
                    block_id,
                    source_url: url.clone(),
                }),
                Segment::Text(_) => None,
            })
            .collect();

        if !slots.is_empty() {
            let reports = uploads::upload_and_bind(client, downloader, document_id, slots).await;
            image_reports.extend(reports);
        }
    }

    info!(
        batches = batch_count,
        blocks = segments.len(),
        images = image_reports.len(),
        "all block batches committed"
    );

    Ok(image_reports)
}

/// Build the creation payload for one segment.
fn block_for_segment(segment: &Segment) -> ChildBlock {
    match segment {
        Segment::Text(line) => ChildBlock::text(line),
        Segment::Image { .. } => ChildBlock::image_placeholder(),
    }
}
