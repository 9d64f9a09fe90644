//! Two-phase enrichment: fast basic record, background completion.
//!
//! Upstream crawling can take seconds, so the fast path returns the stored
//! row immediately with an `images_loading` flag and hands the real work
//! to a fixed pool of background workers. A status map keyed by item id
//! gives polling an authoritative source; the newest request for an item
//! overwrites any earlier entry, and a failed job is never retried here —
//! the next foreground request re-triggers it because the cache check
//! still misses. Finished entries outliving their retention window are
//! swept on the next spawn, so the map tracks recent activity rather than
//! every item ever requested.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::error::EnrichError;
use crate::models::{ItemTable, JobState, JobStatus};
use crate::services::{EnrichmentService, ItemDetail};

/// Fast-path response: the stored row plus loading metadata.
#[derive(Debug, Clone, Serialize)]
pub struct BasicRecord {
    #[serde(flatten)]
    pub detail: ItemDetail,
    /// True iff the row had no description at call time.
    pub images_loading: bool,
    pub request_id: String,
}

struct EnrichJob {
    item_id: String,
    table: ItemTable,
    user_id: Option<i64>,
    request_id: String,
}

/// Asynchronous two-phase orchestrator.
pub struct AsyncEnrichment {
    service: Arc<EnrichmentService>,
    statuses: Arc<RwLock<HashMap<String, JobStatus>>>,
    status_ttl: Duration,
    tx: mpsc::Sender<EnrichJob>,
}

impl AsyncEnrichment {
    /// Spawn `workers` background workers over a queue of `queue_depth`.
    /// Finished status entries are retained for `status_ttl`.
    pub fn new(
        service: Arc<EnrichmentService>,
        workers: usize,
        queue_depth: usize,
        status_ttl: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let statuses = Arc::new(RwLock::new(HashMap::new()));

        for worker_id in 0..workers.max(1) {
            let rx = rx.clone();
            let service = service.clone();
            let statuses = statuses.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, rx, service, statuses).await;
            });
        }

        Self {
            service,
            statuses,
            status_ttl,
            tx,
        }
    }

    /// Phase one: the stored row, overlay, and a fresh request id. Never
    /// waits on crawling.
    pub async fn get_basic_info(
        &self,
        item_id: &str,
        table: ItemTable,
        user_id: Option<i64>,
    ) -> Result<BasicRecord, EnrichError> {
        let detail = self.service.basic_detail(item_id, table, user_id).await?;
        let images_loading = !detail.item.is_enriched();
        let request_id = format!("{}_{}", item_id, Utc::now().timestamp_millis());
        Ok(BasicRecord {
            detail,
            images_loading,
            request_id,
        })
    }

    /// Phase two: queue the full enrichment pass. The latest request for
    /// an item owns the status entry.
    pub async fn spawn_enrichment(
        &self,
        item_id: &str,
        table: ItemTable,
        user_id: Option<i64>,
        request_id: &str,
    ) {
        {
            let mut statuses = self.statuses.write().await;
            let now = Utc::now();
            statuses.retain(|_, status| is_fresh(status, now, self.status_ttl));
            statuses.insert(item_id.to_string(), JobStatus::pending(item_id, request_id));
        }

        let job = EnrichJob {
            item_id: item_id.to_string(),
            table,
            user_id,
            request_id: request_id.to_string(),
        };
        if self.tx.try_send(job).is_err() {
            // Dropping is safe: the cache check on the next foreground
            // request re-triggers the pass.
            tracing::warn!(item_id, "background queue full, dropping enrichment job");
            self.set_state(item_id, request_id, JobState::Failed).await;
        }
    }

    /// Poll the latest background job status for an item.
    pub async fn status(&self, item_id: &str) -> Option<JobStatus> {
        self.statuses.read().await.get(item_id).cloned()
    }

    async fn set_state(&self, item_id: &str, request_id: &str, state: JobState) {
        let mut statuses = self.statuses.write().await;
        if let Some(status) = statuses.get_mut(item_id) {
            if status.request_id == request_id {
                status.state = state;
            }
        }
    }
}

/// Pending entries are kept unconditionally; finished ones are kept only
/// while younger than the retention window.
fn is_fresh(status: &JobStatus, now: DateTime<Utc>, ttl: Duration) -> bool {
    status.state == JobState::Pending
        || now
            .signed_duration_since(status.started_at)
            .to_std()
            .map(|age| age < ttl)
            .unwrap_or(true)
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<EnrichJob>>>,
    service: Arc<EnrichmentService>,
    statuses: Arc<RwLock<HashMap<String, JobStatus>>>,
) {
    loop {
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };

        tracing::debug!(worker_id, item_id = %job.item_id, "background enrichment started");
        let state = match service
            .process_item(&job.item_id, job.table, job.user_id, 1)
            .await
        {
            Ok(_) => JobState::Done,
            Err(err) => {
                tracing::warn!(worker_id, item_id = %job.item_id, error = %err, "background enrichment failed");
                JobState::Failed
            }
        };

        let mut map = statuses.write().await;
        if let Some(status) = map.get_mut(&job.item_id) {
            // A newer request owns the entry; leave it alone.
            if status.request_id == job.request_id {
                status.state = state;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::crawlers::{CrawlMode, CrawlerRegistry, ItemDetailCrawler};
    use crate::images::ImagePipeline;
    use crate::lanes::{ClientLane, LanePool};
    use crate::models::{ItemRecord, RawCrawlResult};
    use crate::repository::Database;
    use async_trait::async_trait;
    use std::time::Duration;

    struct DescriptionCrawler;

    #[async_trait]
    impl ItemDetailCrawler for DescriptionCrawler {
        async fn crawl_item_details(
            &self,
            _item: &ItemRecord,
            _lane: Arc<ClientLane>,
        ) -> anyhow::Result<RawCrawlResult> {
            Ok(RawCrawlResult {
                description: Some("patina on handles".into()),
                ..Default::default()
            })
        }
    }

    fn bare_item(item_id: &str) -> ItemRecord {
        ItemRecord {
            item_id: item_id.to_string(),
            original_title: None,
            title: None,
            scheduled_date: None,
            auc_num: 1,
            category: None,
            brand: None,
            rank: None,
            starting_price: None,
            image: None,
            description: None,
            additional_images: None,
            accessory_code: None,
            final_price: None,
            kaijo_cd: None,
            kaisai_kaisu: None,
            bid_type: None,
            original_scheduled_date: None,
        }
    }

    async fn setup() -> (AsyncEnrichment, Database) {
        setup_with_ttl(Duration::from_secs(600)).await
    }

    async fn setup_with_ttl(status_ttl: Duration) -> (AsyncEnrichment, Database) {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            images_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };
        let pool = Arc::new(LanePool::new(&settings).unwrap());
        let pipeline = ImagePipeline::new(pool.clone(), &settings);

        let mut registry = CrawlerRegistry::new();
        registry.register(1, CrawlMode::Bid, Arc::new(DescriptionCrawler));

        let service = Arc::new(EnrichmentService::new(
            db.items(),
            db.bids(),
            Arc::new(registry),
            pool,
            pipeline,
        ));
        (AsyncEnrichment::new(service, 2, 8, status_ttl), db)
    }

    async fn wait_for_state(jobs: &AsyncEnrichment, item_id: &str, state: JobState) -> JobStatus {
        for _ in 0..100 {
            if let Some(status) = jobs.status(item_id).await {
                if status.state == state {
                    return status;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job for {item_id} never reached {state:?}");
    }

    #[tokio::test]
    async fn fast_path_then_background_completion() {
        let (jobs, db) = setup().await;
        db.items()
            .insert_item(ItemTable::Crawled, &bare_item("X1"))
            .await
            .unwrap();

        let basic = jobs
            .get_basic_info("X1", ItemTable::Crawled, None)
            .await
            .unwrap();
        assert!(basic.images_loading);
        assert!(basic.request_id.starts_with("X1_"));

        jobs.spawn_enrichment("X1", ItemTable::Crawled, None, &basic.request_id)
            .await;
        let status = wait_for_state(&jobs, "X1", JobState::Done).await;
        assert_eq!(status.request_id, basic.request_id);

        // Enrichment landed; a new fast-path call reports nothing to load.
        let again = jobs
            .get_basic_info("X1", ItemTable::Crawled, None)
            .await
            .unwrap();
        assert!(!again.images_loading);
        assert_eq!(
            again.detail.item.description.as_deref(),
            Some("patina on handles")
        );
    }

    #[tokio::test]
    async fn basic_info_unknown_item_is_not_found() {
        let (jobs, _db) = setup().await;
        let err = jobs
            .get_basic_info("ghost", ItemTable::Crawled, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::NotFound(_)));
    }

    #[tokio::test]
    async fn status_is_none_without_a_job() {
        let (jobs, _db) = setup().await;
        assert!(jobs.status("never-asked").await.is_none());
    }

    #[tokio::test]
    async fn finished_entries_fall_out_after_retention() {
        let (jobs, db) = setup_with_ttl(Duration::ZERO).await;
        db.items()
            .insert_item(ItemTable::Crawled, &bare_item("X3"))
            .await
            .unwrap();
        db.items()
            .insert_item(ItemTable::Crawled, &bare_item("X4"))
            .await
            .unwrap();

        jobs.spawn_enrichment("X3", ItemTable::Crawled, None, "X3_1")
            .await;
        wait_for_state(&jobs, "X3", JobState::Done).await;

        // The next spawn sweeps the expired finished entry.
        jobs.spawn_enrichment("X4", ItemTable::Crawled, None, "X4_1")
            .await;
        assert!(jobs.status("X3").await.is_none());
        assert!(jobs.status("X4").await.is_some(), "fresh pending entry kept");
    }

    #[tokio::test]
    async fn newer_request_overwrites_status_entry() {
        let (jobs, db) = setup().await;
        db.items()
            .insert_item(ItemTable::Crawled, &bare_item("X2"))
            .await
            .unwrap();

        jobs.spawn_enrichment("X2", ItemTable::Crawled, None, "X2_1")
            .await;
        jobs.spawn_enrichment("X2", ItemTable::Crawled, None, "X2_2")
            .await;

        let status = wait_for_state(&jobs, "X2", JobState::Done).await;
        assert_eq!(status.request_id, "X2_2");
    }
}
