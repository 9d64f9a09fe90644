//! Data models for the enrichment pipeline.

mod bids;
mod item;
mod job;

pub use bids::{DirectBid, LiveBid, UserBidOverlay};
pub use item::{ItemRecord, ItemTable, ProcessedAsset, RawCrawlResult};
pub use job::{JobState, JobStatus};
