//! Item rows, crawl results, and processed image assets.
//!
//! Two parallel tables share the pipeline: `crawled_items` holds
//! active-auction lots and `values_items` holds price-reference lots.
//! A row counts as enriched exactly when `description` is set; images
//! without a description still mean the detail page was never crawled.

use serde::{Deserialize, Serialize};

/// Which of the two item tables a row lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemTable {
    /// Active-auction lots (`crawled_items`).
    Crawled,
    /// Price-reference lots (`values_items`).
    Values,
}

impl ItemTable {
    /// SQL table name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Crawled => "crawled_items",
            Self::Values => "values_items",
        }
    }

    /// Subdirectory under the images root for this table's photos.
    pub fn image_folder(&self) -> &'static str {
        match self {
            Self::Crawled => "products",
            Self::Values => "values",
        }
    }

    /// Columns that an enrichment pass is allowed to update.
    ///
    /// Anything a crawler hands back that is not listed here is silently
    /// dropped before the UPDATE is built.
    pub fn allowed_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Crawled => &[
                "item_id",
                "original_title",
                "title",
                "scheduled_date",
                "auc_num",
                "category",
                "brand",
                "rank",
                "starting_price",
                "image",
                "description",
                "additional_images",
                "accessory_code",
                "final_price",
                "kaijo_cd",
                "kaisai_kaisu",
                "bid_type",
                "original_scheduled_date",
            ],
            Self::Values => &[
                "item_id",
                "original_title",
                "title",
                "scheduled_date",
                "auc_num",
                "category",
                "brand",
                "rank",
                "starting_price",
                "image",
                "description",
                "additional_images",
                "accessory_code",
                "final_price",
                "kaijo_cd",
                "kaisai_kaisu",
            ],
        }
    }

    /// Whether this table can hold multiple logical rows per item id, in
    /// which case updates must also be keyed by `auc_num`.
    pub fn keyed_by_auc_num(&self) -> bool {
        matches!(self, Self::Crawled)
    }
}

/// One row from either item table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub item_id: String,
    pub original_title: Option<String>,
    pub title: Option<String>,
    pub scheduled_date: Option<String>,
    /// Source auction house: 1, 2, or 3.
    pub auc_num: i64,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub rank: Option<String>,
    pub starting_price: Option<i64>,
    /// Local path of the primary photo once processed.
    pub image: Option<String>,
    pub description: Option<String>,
    /// JSON array of local photo paths.
    pub additional_images: Option<String>,
    pub accessory_code: Option<String>,
    pub final_price: Option<i64>,
    pub kaijo_cd: Option<i64>,
    pub kaisai_kaisu: Option<i64>,
    pub bid_type: Option<String>,
    pub original_scheduled_date: Option<String>,
}

impl ItemRecord {
    /// The cache predicate: a row is enriched iff `description` is set.
    pub fn is_enriched(&self) -> bool {
        self.description.is_some()
    }
}

/// Raw output of one `crawl_item_details` call, before image processing.
///
/// Crawlers may return any subset of these fields; an entirely empty
/// result means the pass yields nothing usable and the stored row is
/// returned unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCrawlResult {
    /// Remote URL of the primary photo.
    pub image: Option<String>,
    /// Remote URLs of additional photos.
    pub additional_images: Vec<String>,
    pub description: Option<String>,
    pub accessory_code: Option<String>,
    pub category: Option<String>,
}

impl RawCrawlResult {
    /// True when the crawl produced nothing worth persisting.
    pub fn is_empty(&self) -> bool {
        self.image.is_none()
            && self.additional_images.is_empty()
            && self.description.is_none()
            && self.accessory_code.is_none()
            && self.category.is_none()
    }
}

/// One processed image slot, order-matched to its input URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedAsset {
    pub original_url: String,
    /// Local path of the stored image, or `None` if every attempt failed.
    pub stored_path: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub crop_applied: bool,
}
