//! Item row reads and the whitelisted enrichment update.

use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;

use super::Result;
use crate::models::{ItemRecord, ItemTable};

/// Columns shared by both item tables, in row-mapper order.
const BASE_COLUMNS: &str = "item_id, original_title, title, scheduled_date, auc_num, \
     category, brand, rank, starting_price, image, description, \
     additional_images, accessory_code, final_price, kaijo_cd, kaisai_kaisu";

/// Repository for the two item tables.
#[derive(Clone)]
pub struct ItemRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ItemRepository {
    pub(super) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Load one row by item id. When the table holds multiple rows per
    /// item this returns the first, matching the read the orchestrator
    /// started from.
    pub async fn get_by_item_id(&self, table: ItemTable, item_id: &str) -> Result<Option<ItemRecord>> {
        let sql = match table {
            ItemTable::Crawled => format!(
                "SELECT {BASE_COLUMNS}, bid_type, original_scheduled_date \
                 FROM crawled_items WHERE item_id = ?1 LIMIT 1"
            ),
            ItemTable::Values => {
                format!("SELECT {BASE_COLUMNS} FROM values_items WHERE item_id = ?1 LIMIT 1")
            }
        };

        let conn = self.conn.lock().await;
        conn.query_row(&sql, params![item_id], |row| row_to_item(row, table))
            .optional()
    }

    /// Whitelisted upsert of enriched fields onto one row.
    ///
    /// Keys not in the table's allowed-column set are dropped before the
    /// UPDATE is built, so a crawler handing back unexpected fields cannot
    /// touch arbitrary columns. `auc_num` scopes the update when the table
    /// can hold one row per source for the same item id.
    ///
    /// Returns the number of rows updated; zero valid fields is a no-op.
    pub async fn update_item_details(
        &self,
        item_id: &str,
        fields: &serde_json::Map<String, serde_json::Value>,
        table: ItemTable,
        auc_num: Option<i64>,
    ) -> Result<usize> {
        let allowed = table.allowed_columns();
        let mut sets = Vec::new();
        let mut binds: Vec<SqlValue> = Vec::new();

        for (key, value) in fields {
            // The row key is never rewritten.
            if key == "item_id" {
                continue;
            }
            if allowed.contains(&key.as_str()) {
                sets.push(format!("{key} = ?{}", sets.len() + 1));
                binds.push(json_to_sql(value));
            } else {
                tracing::debug!(column = %key, table = table.name(), "dropping non-whitelisted field");
            }
        }

        if sets.is_empty() {
            tracing::info!(item_id, table = table.name(), "no valid fields to update");
            return Ok(0);
        }

        let mut sql = format!(
            "UPDATE {} SET {} WHERE item_id = ?{}",
            table.name(),
            sets.join(", "),
            binds.len() + 1
        );
        binds.push(SqlValue::Text(item_id.to_string()));
        if let Some(num) = auc_num {
            sql.push_str(&format!(" AND auc_num = ?{}", binds.len() + 1));
            binds.push(SqlValue::Integer(num));
        }

        let conn = self.conn.lock().await;
        conn.execute(&sql, params_from_iter(binds))
    }

    /// Insert a bare scraped row. The nightly bulk scraper owns this in
    /// production; standalone deployments and tests seed through it.
    pub async fn insert_item(&self, table: ItemTable, item: &ItemRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        match table {
            ItemTable::Crawled => {
                conn.execute(
                    &format!(
                        "INSERT INTO crawled_items ({BASE_COLUMNS}, bid_type, original_scheduled_date) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
                    ),
                    params![
                        item.item_id,
                        item.original_title,
                        item.title,
                        item.scheduled_date,
                        item.auc_num,
                        item.category,
                        item.brand,
                        item.rank,
                        item.starting_price,
                        item.image,
                        item.description,
                        item.additional_images,
                        item.accessory_code,
                        item.final_price,
                        item.kaijo_cd,
                        item.kaisai_kaisu,
                        item.bid_type,
                        item.original_scheduled_date,
                    ],
                )?;
            }
            ItemTable::Values => {
                conn.execute(
                    &format!(
                        "INSERT INTO values_items ({BASE_COLUMNS}) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
                    ),
                    params![
                        item.item_id,
                        item.original_title,
                        item.title,
                        item.scheduled_date,
                        item.auc_num,
                        item.category,
                        item.brand,
                        item.rank,
                        item.starting_price,
                        item.image,
                        item.description,
                        item.additional_images,
                        item.accessory_code,
                        item.final_price,
                        item.kaijo_cd,
                        item.kaisai_kaisu,
                    ],
                )?;
            }
        }
        Ok(())
    }
}

fn row_to_item(row: &Row<'_>, table: ItemTable) -> rusqlite::Result<ItemRecord> {
    Ok(ItemRecord {
        item_id: row.get(0)?,
        original_title: row.get(1)?,
        title: row.get(2)?,
        scheduled_date: row.get(3)?,
        auc_num: row.get(4)?,
        category: row.get(5)?,
        brand: row.get(6)?,
        rank: row.get(7)?,
        starting_price: row.get(8)?,
        image: row.get(9)?,
        description: row.get(10)?,
        additional_images: row.get(11)?,
        accessory_code: row.get(12)?,
        final_price: row.get(13)?,
        kaijo_cd: row.get(14)?,
        kaisai_kaisu: row.get(15)?,
        bid_type: match table {
            ItemTable::Crawled => row.get(16)?,
            ItemTable::Values => None,
        },
        original_scheduled_date: match table {
            ItemTable::Crawled => row.get(17)?,
            ItemTable::Values => None,
        },
    })
}

fn json_to_sql(value: &serde_json::Value) -> SqlValue {
    match value {
        serde_json::Value::Null => SqlValue::Null,
        serde_json::Value::Bool(b) => SqlValue::Integer(*b as i64),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => SqlValue::Text(s.clone()),
        // Arrays and objects are stored as their JSON text.
        other => SqlValue::Text(other.to_string()),
    }
}
