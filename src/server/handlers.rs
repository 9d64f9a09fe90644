//! HTTP handlers for the enrichment endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::error::EnrichError;
use crate::models::ItemTable;

/// Optional request body for the detail endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct DetailRequest {
    /// Requesting user, for the bid overlay.
    pub user_id: Option<i64>,
}

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Synchronous enrichment of an active-auction item.
pub async fn item_details(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    body: Option<Json<DetailRequest>>,
) -> Response {
    let user_id = body.and_then(|Json(body)| body.user_id);
    match state
        .enrichment
        .process_item(&item_id, ItemTable::Crawled, user_id, 1)
        .await
    {
        Ok(detail) => Json(detail).into_response(),
        Err(err) => error_response(err),
    }
}

/// Synchronous enrichment of a price-reference item.
pub async fn value_details(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    body: Option<Json<DetailRequest>>,
) -> Response {
    let user_id = body.and_then(|Json(body)| body.user_id);
    match state
        .enrichment
        .process_item(&item_id, ItemTable::Values, user_id, 1)
        .await
    {
        Ok(detail) => Json(detail).into_response(),
        Err(err) => error_response(err),
    }
}

/// Two-phase fast path: basic record now, enrichment in the background.
pub async fn item_details_fast(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    body: Option<Json<DetailRequest>>,
) -> Response {
    let user_id = body.and_then(|Json(body)| body.user_id);
    match state
        .jobs
        .get_basic_info(&item_id, ItemTable::Crawled, user_id)
        .await
    {
        Ok(basic) => {
            if basic.images_loading {
                state
                    .jobs
                    .spawn_enrichment(&item_id, ItemTable::Crawled, user_id, &basic.request_id)
                    .await;
            }
            Json(basic).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// Poll the background enrichment status for an item.
pub async fn item_images_status(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Response {
    match state.jobs.status(&item_id).await {
        Some(status) => Json(json!({
            "item_id": status.item_id,
            "state": status.state.as_str(),
            "request_id": status.request_id,
            "started_at": status.started_at,
        }))
        .into_response(),
        None => Json(json!({
            "item_id": item_id,
            "state": "unknown",
        }))
        .into_response(),
    }
}

fn error_response(err: EnrichError) -> Response {
    match err {
        EnrichError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Item not found" })),
        )
            .into_response(),
        EnrichError::Persistence(err) => {
            tracing::error!(error = %err, "database failure on detail request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Error getting item details" })),
            )
                .into_response()
        }
    }
}
