//! Curator engine library interface
//!
//! Exposes the engine's components for the binary and for integration
//! testing: the catalogue store, scoring engine, identity matcher and
//! arbiter, chain factory, hasher, processor registry, watcher + debounce
//! queue, bounded worker, ingestion orchestrator, and the HTTP shell.

pub mod api;
pub mod chain;
pub mod error;
pub mod hasher;
pub mod ingest;
pub mod matching;
pub mod models;
pub mod processors;
pub mod scoring;
pub mod store;
pub mod watch;
pub mod worker;

pub use crate::error::{ApiError, ApiResult};

use crate::scoring::ScoringEngine;
use axum::routing::get;
use axum::Router;
use curator_common::config::CuratorConfig;
use curator_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Catalogue connection pool
    pub db: SqlitePool,
    /// Event bus backing the SSE stream
    pub event_bus: EventBus,
    /// Immutable startup configuration
    pub config: Arc<CuratorConfig>,
    /// Scoring engine for manual re-scoring endpoints
    pub scoring: ScoringEngine,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        config: Arc<CuratorConfig>,
        scoring: ScoringEngine,
    ) -> Self {
        Self {
            db,
            event_bus,
            config,
            scoring,
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::hub_routes())
        .merge(api::ingestion_routes())
        .merge(api::metadata_routes())
        .merge(api::system_routes())
        .route("/events", get(api::event_stream))
        .with_state(state)
}
