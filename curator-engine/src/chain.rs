//! Chain factory
//!
//! Idempotently ensures a Hub→Work→Edition chain exists for a newly hashed
//! asset. Hub reuse is a case-insensitive lookup on display name; Work and
//! Edition are always created fresh (deduplication of works under a hub is
//! deliberately out of scope).

use crate::models::{Edition, Hub, MediaType, Work};
use crate::store::{hubs, StoreResult};
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Identifiers of a materialised chain
#[derive(Debug, Clone, Copy)]
pub struct ChainIds {
    pub hub_id: Uuid,
    pub work_id: Uuid,
    pub edition_id: Uuid,
}

/// Ensure a chain for the given media type and metadata
///
/// `work_id` and `edition_id` are pre-assigned by the caller (the engine
/// scopes claims to the edition id before the chain exists). The hub is
/// reused by display name or created fresh.
pub async fn ensure_chain(
    pool: &SqlitePool,
    work_id: Uuid,
    edition_id: Uuid,
    media_type: MediaType,
    metadata: &HashMap<String, String>,
) -> StoreResult<ChainIds> {
    let title = metadata
        .get("title")
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .unwrap_or("Unknown");

    let hub_id = match hubs::find_hub_by_display_name(pool, title).await? {
        Some(hub) => {
            debug!(hub_id = %hub.id, title, "Reusing hub by display name");
            hub.id
        }
        None => {
            let hub = Hub::new(title);
            hubs::insert_hub(pool, &hub).await?;
            debug!(hub_id = %hub.id, title, "Created hub");
            hub.id
        }
    };

    ensure_chain_in_hub(pool, hub_id, work_id, edition_id, media_type, metadata).await
}

/// Ensure a chain under a specific hub (arbiter-directed placement)
pub async fn ensure_chain_in_hub(
    pool: &SqlitePool,
    hub_id: Uuid,
    work_id: Uuid,
    edition_id: Uuid,
    media_type: MediaType,
    metadata: &HashMap<String, String>,
) -> StoreResult<ChainIds> {
    let sequence_index = metadata
        .get("series_index")
        .and_then(|s| s.trim().parse::<f64>().ok());

    let work = Work {
        id: work_id,
        hub_id: Some(hub_id),
        media_type,
        sequence_index,
        created_at: Utc::now(),
    };
    hubs::insert_work(pool, &work).await?;

    let format_label = metadata
        .get("format")
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());

    let edition = Edition {
        id: edition_id,
        work_id,
        format_label,
        created_at: Utc::now(),
    };
    hubs::insert_edition(pool, &edition).await?;

    Ok(ChainIds {
        hub_id,
        work_id,
        edition_id,
    })
}
