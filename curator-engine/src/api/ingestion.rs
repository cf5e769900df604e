//! Ingestion endpoints

use crate::error::ApiResult;
use crate::ingest::scan;
use crate::AppState;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

pub fn ingestion_routes() -> Router<AppState> {
    Router::new().route("/ingestion/scan", post(dry_run_scan))
}

/// POST /ingestion/scan - dry run; reports pending operations, mutates
/// nothing
async fn dry_run_scan(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let watch_root = state.config.watch_root.clone();

    let pending =
        tokio::task::spawn_blocking(move || scan::dry_run_scan(&watch_root))
            .await
            .map_err(|e| crate::error::ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "pending_count": pending.len(),
        "pending": pending,
    })))
}
