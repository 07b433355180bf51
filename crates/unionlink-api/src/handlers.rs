//! Route handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use unionlink_core::metrics::MetricsSnapshot;
use unionlink_core::types::LinkPair;

use crate::error::ApiError;
use crate::ApiState;

/// Body of `GET /allLinks`.
#[derive(Debug, Serialize)]
pub struct AllLinksResponse {
    pub data: Vec<LinkPair>,
}

pub async fn all_links(State(state): State<ApiState>) -> Result<Json<AllLinksResponse>, ApiError> {
    let data = state.store.all_links().await?;
    debug!(count = data.len(), "serving all links");
    Ok(Json(AllLinksResponse { data }))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn status(State(state): State<ApiState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
