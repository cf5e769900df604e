//! Catalogue read endpoints

use crate::error::ApiResult;
use crate::store::hubs;
use crate::AppState;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

/// Maximum hits returned by search
const SEARCH_LIMIT: i64 = 20;

/// Minimum query length for search
const MIN_QUERY_LEN: usize = 2;

pub fn hub_routes() -> Router<AppState> {
    Router::new()
        .route("/hubs", get(list_hubs))
        .route("/hubs/search", get(search_hubs))
}

/// GET /hubs - full catalogue view (two-query load)
async fn list_hubs(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let hubs = hubs::list_hubs(&state.db).await?;
    Ok(Json(json!({ "hubs": hubs })))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

/// GET /hubs/search?q=… - up to 20 hits, minimum 2-character query
async fn search_hubs(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Value>> {
    let query = params.q.trim();
    if query.chars().count() < MIN_QUERY_LEN {
        return Err(crate::error::ApiError::BadRequest(format!(
            "query must be at least {MIN_QUERY_LEN} characters"
        )));
    }

    let hits = hubs::search_hubs(&state.db, query, SEARCH_LIMIT).await?;
    Ok(Json(json!({ "results": hits })))
}
