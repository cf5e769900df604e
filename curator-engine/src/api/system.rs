//! System status

use crate::AppState;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

pub fn system_routes() -> Router<AppState> {
    Router::new().route("/system/status", get(status))
}

/// GET /system/status - always public
async fn status() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
