//! Router configuration for the enrichment server.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the router with all enrichment routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Synchronous orchestrator
        .route("/item-details/:item_id", post(handlers::item_details))
        .route("/value-details/:item_id", post(handlers::value_details))
        // Two-phase orchestrator
        .route(
            "/item-details-fast/:item_id",
            post(handlers::item_details_fast),
        )
        .route(
            "/item-images-status/:item_id",
            get(handlers::item_images_status),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
