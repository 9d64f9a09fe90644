//! Crawler capabilities, one per (auction house, mode) pair.
//!
//! The site-specific parsers live outside this crate; they plug in through
//! [`ItemDetailCrawler`] and are resolved at request time from a registry
//! populated at startup. An unmapped pair resolves to nothing and the
//! orchestrator returns the stored row unchanged, so a missing crawler can
//! never break browsing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::lanes::ClientLane;
use crate::models::{ItemRecord, RawCrawlResult};

/// Whether a crawl targets the active-auction or price-reference site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlMode {
    Bid,
    Value,
}

/// Fetches and parses one item's detail page.
///
/// The lane comes from the pool and carries whatever session cookies
/// earlier calls left in it; implementations that need a login perform it
/// on the same lane and call [`ClientLane::mark_logged_in`] so later calls
/// can skip it.
#[async_trait]
pub trait ItemDetailCrawler: Send + Sync {
    async fn crawl_item_details(
        &self,
        item: &ItemRecord,
        lane: Arc<ClientLane>,
    ) -> anyhow::Result<RawCrawlResult>;
}

/// Crawler that always reports an empty result.
///
/// Stands in for source/mode pairs that have no detail page worth crawling;
/// the orchestrator treats its output like any other empty crawl.
pub struct NoopCrawler;

#[async_trait]
impl ItemDetailCrawler for NoopCrawler {
    async fn crawl_item_details(
        &self,
        _item: &ItemRecord,
        _lane: Arc<ClientLane>,
    ) -> anyhow::Result<RawCrawlResult> {
        Ok(RawCrawlResult::default())
    }
}

/// Registry of crawler capabilities keyed by (auc_num, mode).
///
/// Built once at startup; resolution is a plain map lookup.
#[derive(Default)]
pub struct CrawlerRegistry {
    crawlers: HashMap<(i64, CrawlMode), Arc<dyn ItemDetailCrawler>>,
}

impl CrawlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a crawler for one (auction house, mode) pair, replacing any
    /// previous registration.
    pub fn register(
        &mut self,
        auc_num: i64,
        mode: CrawlMode,
        crawler: Arc<dyn ItemDetailCrawler>,
    ) -> &mut Self {
        self.crawlers.insert((auc_num, mode), crawler);
        self
    }

    /// Resolve the crawler for a pair, if one was registered.
    pub fn resolve(&self, auc_num: i64, mode: CrawlMode) -> Option<Arc<dyn ItemDetailCrawler>> {
        self.crawlers.get(&(auc_num, mode)).cloned()
    }
}
