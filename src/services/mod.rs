//! Enrichment orchestrators.

mod async_two_phase;
mod process_item;

pub use async_two_phase::{AsyncEnrichment, BasicRecord};
pub use process_item::{EnrichmentService, ItemDetail};
