//! Best-effort bid lookups for the per-user overlay.

use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use super::Result;
use crate::models::{DirectBid, LiveBid, UserBidOverlay};

/// Repository for the live and direct bid tables.
#[derive(Clone)]
pub struct BidRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BidRepository {
    pub(super) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Fetch both bid kinds for one (user, item) pair.
    ///
    /// Callers on the enrichment path treat any error here as an empty
    /// overlay; a flaky bid table must never block browsing.
    pub async fn get_user_bids(&self, user_id: i64, item_id: &str) -> Result<UserBidOverlay> {
        let conn = self.conn.lock().await;

        let live = conn
            .query_row(
                "SELECT id, item_id, first_price, second_price, final_price, status \
                 FROM live_bids WHERE user_id = ?1 AND item_id = ?2 LIMIT 1",
                params![user_id, item_id],
                |row| {
                    Ok(LiveBid {
                        id: row.get(0)?,
                        item_id: row.get(1)?,
                        first_price: row.get(2)?,
                        second_price: row.get(3)?,
                        final_price: row.get(4)?,
                        status: row.get(5)?,
                    })
                },
            )
            .optional()?;

        let direct = conn
            .query_row(
                "SELECT id, item_id, current_price, status \
                 FROM direct_bids WHERE user_id = ?1 AND item_id = ?2 LIMIT 1",
                params![user_id, item_id],
                |row| {
                    Ok(DirectBid {
                        id: row.get(0)?,
                        item_id: row.get(1)?,
                        current_price: row.get(2)?,
                        status: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(UserBidOverlay { live, direct })
    }

    /// Insert a live bid row (test seeding).
    #[cfg(test)]
    pub async fn insert_live_bid(&self, user_id: i64, item_id: &str, first_price: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO live_bids (user_id, item_id, first_price, status) VALUES (?1, ?2, ?3, 'active')",
            params![user_id, item_id, first_price],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Database;

    #[tokio::test]
    async fn overlay_is_empty_without_bids() {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().await.unwrap();

        let overlay = db.bids().get_user_bids(7, "X1").await.unwrap();
        assert!(overlay.live.is_none());
        assert!(overlay.direct.is_none());
    }

    #[tokio::test]
    async fn overlay_picks_up_live_bid() {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().await.unwrap();

        let bids = db.bids();
        bids.insert_live_bid(7, "X1", 55_000).await.unwrap();

        let overlay = bids.get_user_bids(7, "X1").await.unwrap();
        let live = overlay.live.expect("live bid");
        assert_eq!(live.item_id, "X1");
        assert_eq!(live.first_price, Some(55_000));
        assert!(overlay.direct.is_none());

        // A different user sees nothing.
        let other = bids.get_user_bids(8, "X1").await.unwrap();
        assert!(other.live.is_none());
    }
}
