//! Synchronous enrichment orchestrator.
//!
//! Read-through cache over the item tables: an already-enriched row is
//! returned as-is; a miss drives crawler -> image pipeline -> persistence
//! and returns the merged record. Enrichment is best effort end to end:
//! once the base row loads, the only way a caller sees an error is a
//! database failure on that load path.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use serde_json::json;

use crate::crawlers::{CrawlMode, CrawlerRegistry, ItemDetailCrawler};
use crate::error::EnrichError;
use crate::images::{CropProfile, ImagePipeline};
use crate::lanes::LanePool;
use crate::models::{ItemRecord, ItemTable, ProcessedAsset, RawCrawlResult, UserBidOverlay};
use crate::repository::{BidRepository, ItemRepository};

/// An item row plus the requesting user's volatile bid overlay.
///
/// The overlay lives only on the response; nothing here writes it back.
#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: ItemRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bids: Option<UserBidOverlay>,
}

/// Coordinates one enrichment pass per request.
pub struct EnrichmentService {
    items: ItemRepository,
    bids: BidRepository,
    registry: Arc<CrawlerRegistry>,
    pool: Arc<LanePool>,
    pipeline: ImagePipeline,
}

impl EnrichmentService {
    pub fn new(
        items: ItemRepository,
        bids: BidRepository,
        registry: Arc<CrawlerRegistry>,
        pool: Arc<LanePool>,
        pipeline: ImagePipeline,
    ) -> Self {
        Self {
            items,
            bids,
            registry,
            pool,
            pipeline,
        }
    }

    /// Load the row and overlay without triggering a crawl.
    pub async fn basic_detail(
        &self,
        item_id: &str,
        table: ItemTable,
        user_id: Option<i64>,
    ) -> Result<ItemDetail, EnrichError> {
        let item = self
            .items
            .get_by_item_id(table, item_id)
            .await?
            .ok_or_else(|| EnrichError::NotFound(item_id.to_string()))?;
        let bids = self.fetch_overlay(user_id, item_id).await;
        Ok(ItemDetail { item, bids })
    }

    /// Full enrichment pass.
    ///
    /// Returns the enriched row on success, and the stored row whenever
    /// the pass cannot improve on it: cache hit, no crawler registered,
    /// empty crawl, or any crawl/image/persist failure.
    pub async fn process_item(
        &self,
        item_id: &str,
        table: ItemTable,
        user_id: Option<i64>,
        priority: u8,
    ) -> Result<ItemDetail, EnrichError> {
        let ItemDetail { item, bids } = self.basic_detail(item_id, table, user_id).await?;

        if item.is_enriched() {
            return Ok(ItemDetail { item, bids });
        }

        let mode = match table {
            ItemTable::Crawled => CrawlMode::Bid,
            ItemTable::Values => CrawlMode::Value,
        };
        let Some(crawler) = self.registry.resolve(item.auc_num, mode) else {
            tracing::debug!(item_id, auc_num = item.auc_num, "no crawler registered");
            return Ok(ItemDetail { item, bids });
        };

        match self.enrich(&item, crawler, table, priority).await {
            Ok(Some(updated)) => Ok(ItemDetail {
                item: updated,
                bids,
            }),
            Ok(None) => Ok(ItemDetail { item, bids }),
            Err(err) => {
                tracing::warn!(item_id, error = %err, "enrichment failed, returning stored row");
                Ok(ItemDetail { item, bids })
            }
        }
    }

    /// Best-effort overlay fetch: a failed lookup yields the empty
    /// overlay, never an error.
    async fn fetch_overlay(&self, user_id: Option<i64>, item_id: &str) -> Option<UserBidOverlay> {
        let user_id = user_id?;
        match self.bids.get_user_bids(user_id, item_id).await {
            Ok(overlay) => Some(overlay),
            Err(err) => {
                tracing::warn!(user_id, item_id, error = %err, "bid lookup failed, omitting overlay");
                Some(UserBidOverlay::default())
            }
        }
    }

    async fn enrich(
        &self,
        item: &ItemRecord,
        crawler: Arc<dyn ItemDetailCrawler>,
        table: ItemTable,
        priority: u8,
    ) -> anyhow::Result<Option<ItemRecord>> {
        let lane = self.pool.checkout().context("lane pool is empty")?;
        let raw = crawler.crawl_item_details(item, lane).await?;
        if raw.is_empty() {
            return Ok(None);
        }

        let crop = CropProfile::for_auc_num(item.auc_num);
        let assets = self
            .pipeline
            .process_item_images(&raw, table.image_folder(), priority, crop)
            .await;

        let fields = build_update_fields(&raw, &assets);
        let auc_num = table.keyed_by_auc_num().then_some(item.auc_num);
        self.items
            .update_item_details(&item.item_id, &fields, table, auc_num)
            .await?;

        Ok(self.items.get_by_item_id(table, &item.item_id).await?)
    }
}

/// Map a crawl result and its processed assets onto update columns.
///
/// `description` always lands, defaulting to `"-"`, so the cache predicate
/// flips even for items whose detail page carried no prose. Asset order
/// matches the pipeline input: primary image first, then additionals;
/// failed additional slots are simply left out of the stored array.
fn build_update_fields(
    raw: &RawCrawlResult,
    assets: &[ProcessedAsset],
) -> serde_json::Map<String, serde_json::Value> {
    let mut fields = serde_json::Map::new();
    fields.insert(
        "description".to_string(),
        json!(raw.description.clone().unwrap_or_else(|| "-".to_string())),
    );
    if let Some(code) = &raw.accessory_code {
        fields.insert("accessory_code".to_string(), json!(code));
    }
    if let Some(category) = &raw.category {
        fields.insert("category".to_string(), json!(category));
    }

    let mut remaining = assets;
    if raw.image.is_some() {
        if let Some((primary, rest)) = remaining.split_first() {
            if let Some(path) = &primary.stored_path {
                fields.insert("image".to_string(), json!(path));
            }
            remaining = rest;
        }
    }
    if !raw.additional_images.is_empty() {
        let stored: Vec<&str> = remaining
            .iter()
            .filter_map(|asset| asset.stored_path.as_deref())
            .collect();
        fields.insert(
            "additional_images".to_string(),
            json!(serde_json::to_string(&stored).unwrap_or_else(|_| "[]".to_string())),
        );
    }

    fields
}
