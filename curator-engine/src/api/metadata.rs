//! Manual metadata overrides

use crate::error::{ApiError, ApiResult};
use crate::models::{EntityKind, MetadataClaim};
use crate::scoring::ScoringContext;
use crate::store::{claims, journal, providers};
use crate::AppState;
use axum::extract::State;
use axum::routing::patch;
use axum::{Json, Router};
use chrono::Utc;
use curator_common::events::CuratorEvent;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// Provider id recorded for explicit user actions
const USER_PROVIDER: &str = "user";

pub fn metadata_routes() -> Router<AppState> {
    Router::new()
        .route("/metadata/resolve", patch(resolve_canonical))
        .route("/metadata/lock-claim", patch(lock_claim))
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    entity_id: Uuid,
    key: String,
    value: String,
}

/// PATCH /metadata/resolve - upsert a canonical value directly
async fn resolve_canonical(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<Json<Value>> {
    let key = request.key.trim().to_lowercase();
    if key.is_empty() {
        return Err(ApiError::BadRequest("key must not be empty".to_string()));
    }

    claims::upsert_canonical(&state.db, request.entity_id, &key, &request.value, Utc::now())
        .await?;
    journal::log_event(&state.db, "CANONICAL_OVERRIDE", "entity", request.entity_id).await?;

    Ok(Json(json!({ "entity_id": request.entity_id, "key": key })))
}

#[derive(Debug, Deserialize)]
struct LockClaimRequest {
    entity_id: Uuid,
    key: String,
    value: String,
}

/// PATCH /metadata/lock-claim - append a user-locked claim and re-score
///
/// The lock is itself an append-only claim with confidence 1.0; re-scoring
/// makes it the canonical winner without touching history.
async fn lock_claim(
    State(state): State<AppState>,
    Json(request): Json<LockClaimRequest>,
) -> ApiResult<Json<Value>> {
    let key = request.key.trim().to_lowercase();
    if key.is_empty() {
        return Err(ApiError::BadRequest("key must not be empty".to_string()));
    }

    let claim = MetadataClaim {
        id: Uuid::new_v4(),
        entity_id: request.entity_id,
        entity_kind: EntityKind::Edition,
        provider_id: USER_PROVIDER.to_string(),
        claim_key: key.clone(),
        claim_value: request.value.clone(),
        confidence: 1.0,
        claimed_at: Utc::now(),
        is_user_locked: true,
    };
    claims::append_claim(&state.db, &claim).await?;
    journal::log_event(&state.db, "CLAIM_LOCKED", "entity", request.entity_id).await?;

    // Re-score the whole entity so every canonical value reflects the log
    let stored = claims::list_claims(&state.db, request.entity_id).await?;
    let (provider_weights, provider_field_weights) =
        providers::load_weight_maps(&state.db).await?;

    let result = state.scoring.score(&ScoringContext {
        entity_id: request.entity_id,
        claims: stored,
        provider_weights,
        provider_field_weights,
        config: state.scoring.config().clone(),
    });

    for field in &result.field_scores {
        claims::upsert_canonical(
            &state.db,
            request.entity_id,
            &field.key,
            &field.value,
            result.scored_at,
        )
        .await?;
    }

    state.event_bus.emit_lossy(CuratorEvent::MetadataHarvested {
        entity_id: request.entity_id,
        field_count: result.field_scores.len(),
        overall_confidence: result.overall_confidence,
        conflicted_fields: result.conflicted_fields(),
        timestamp: Utc::now(),
    });

    Ok(Json(json!({
        "entity_id": request.entity_id,
        "key": key,
        "overall_confidence": result.overall_confidence,
    })))
}
