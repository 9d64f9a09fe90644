//! Web server exposing the enrichment pipeline.
//!
//! Four routes: the two synchronous detail endpoints, the two-phase fast
//! path, and its status poll. Everything else in the back office (bids,
//! warehouse, invoices) lives elsewhere; this server owns only enrichment.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Settings;
use crate::crawlers::CrawlerRegistry;
use crate::images::ImagePipeline;
use crate::lanes::LanePool;
use crate::repository::Database;
use crate::services::{AsyncEnrichment, EnrichmentService};

/// Shared state for the enrichment server.
#[derive(Clone)]
pub struct AppState {
    pub enrichment: Arc<EnrichmentService>,
    pub jobs: Arc<AsyncEnrichment>,
}

impl AppState {
    /// Wire the full pipeline from settings and a crawler registry.
    pub async fn new(settings: &Settings, registry: CrawlerRegistry) -> anyhow::Result<Self> {
        let db = Database::open(&settings.database_path)?;
        db.init_schema().await?;

        let pool = Arc::new(LanePool::new(settings)?);
        let pipeline = ImagePipeline::new(pool.clone(), settings);
        let enrichment = Arc::new(EnrichmentService::new(
            db.items(),
            db.bids(),
            Arc::new(registry),
            pool,
            pipeline,
        ));
        let jobs = Arc::new(AsyncEnrichment::new(
            enrichment.clone(),
            settings.async_workers,
            settings.async_queue_depth,
            settings.status_ttl(),
        ));

        Ok(Self { enrichment, jobs })
    }
}

/// Start the enrichment server.
pub async fn serve(
    settings: &Settings,
    registry: CrawlerRegistry,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    let state = AppState::new(settings, registry).await?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
