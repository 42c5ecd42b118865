//! Document assembly pipeline: segments → batched remote blocks → media.
//!
//! Entry point is [`publish`], which creates the remote document, drives
//! the chunked block publisher over the segmented content, and returns a
//! [`PublishReport`] with the document link and per-image outcomes.

mod pipeline;
mod publisher;
mod uploads;

pub use pipeline::{PublishReport, PublishRequest, publish};
pub use uploads::{ImageOutcome, ImageReport};
