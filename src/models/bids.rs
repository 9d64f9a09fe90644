//! Per-user bid overlays.
//!
//! Bid rows are fetched best-effort and merged onto the in-memory response
//! only; they are never written back to the item tables.

use serde::{Deserialize, Serialize};

/// A user's live-auction bid on one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveBid {
    pub id: i64,
    pub item_id: String,
    pub first_price: Option<i64>,
    pub second_price: Option<i64>,
    pub final_price: Option<i64>,
    pub status: Option<String>,
}

/// A user's direct-purchase bid on one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectBid {
    pub id: i64,
    pub item_id: String,
    pub current_price: Option<i64>,
    pub status: Option<String>,
}

/// Both bid kinds for one (user, item) pair. A failed lookup yields the
/// default (both `None`) rather than an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserBidOverlay {
    pub live: Option<LiveBid>,
    pub direct: Option<DirectBid>,
}
