//! SQLite persistence for item rows and bid overlays.
//!
//! One shared connection behind an async mutex; every operation is a
//! single statement, which is all the pipeline needs since one enrichment
//! pass targets exactly one row.

mod bids;
mod items;

pub use bids::BidRepository;
pub use items::ItemRepository;

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

/// Repository result alias.
pub type Result<T> = std::result::Result<T, rusqlite::Error>;

/// Owns the SQLite connection and hands out repositories that share it.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        })
    }

    /// Create the tables this pipeline touches if they do not exist yet.
    ///
    /// The wider back office owns the real schema; this covers standalone
    /// and test deployments.
    pub async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS crawled_items (
                item_id TEXT NOT NULL,
                original_title TEXT,
                title TEXT,
                scheduled_date TEXT,
                auc_num INTEGER NOT NULL DEFAULT 1,
                category TEXT,
                brand TEXT,
                rank TEXT,
                starting_price INTEGER,
                image TEXT,
                description TEXT,
                additional_images TEXT,
                accessory_code TEXT,
                final_price INTEGER,
                kaijo_cd INTEGER,
                kaisai_kaisu INTEGER,
                bid_type TEXT,
                original_scheduled_date TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_crawled_item_id ON crawled_items (item_id);

            CREATE TABLE IF NOT EXISTS values_items (
                item_id TEXT NOT NULL,
                original_title TEXT,
                title TEXT,
                scheduled_date TEXT,
                auc_num INTEGER NOT NULL DEFAULT 1,
                category TEXT,
                brand TEXT,
                rank TEXT,
                starting_price INTEGER,
                image TEXT,
                description TEXT,
                additional_images TEXT,
                accessory_code TEXT,
                final_price INTEGER,
                kaijo_cd INTEGER,
                kaisai_kaisu INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_values_item_id ON values_items (item_id);

            CREATE TABLE IF NOT EXISTS live_bids (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                item_id TEXT NOT NULL,
                first_price INTEGER,
                second_price INTEGER,
                final_price INTEGER,
                status TEXT
            );

            CREATE TABLE IF NOT EXISTS direct_bids (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                item_id TEXT NOT NULL,
                current_price INTEGER,
                status TEXT
            );
            "#,
        )?;
        Ok(())
    }

    /// Run arbitrary SQL (test fixtures).
    #[cfg(test)]
    pub async fn execute_raw(&self, sql: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// Item repository sharing this connection.
    pub fn items(&self) -> ItemRepository {
        ItemRepository::new(self.conn.clone())
    }

    /// Bid repository sharing this connection.
    pub fn bids(&self) -> BidRepository {
        BidRepository::new(self.conn.clone())
    }
}
