//! Error taxonomy for the enrichment pipeline.
//!
//! Only two failure classes ever reach an HTTP caller: a missing row and a
//! database failure on the row-load path. Crawl, image, and bid-overlay
//! failures are recovered inside the orchestrators, which degrade to the
//! best data currently available.

use thiserror::Error;

/// Errors surfaced by the enrichment orchestrators.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// No row exists for the requested item id.
    #[error("item {0} not found")]
    NotFound(String),

    /// The base row could not be read or re-read.
    #[error("persistence failure: {0}")]
    Persistence(#[from] rusqlite::Error),
}
