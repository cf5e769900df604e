//! Metadata claims and canonical values
//!
//! Claims are append-only: `append_claim` never updates, nothing ever
//! deletes, and `list_claims` returns every row unfiltered so historical
//! re-scoring stays reproducible. Canonical values are the mutable scored
//! winners, replaced wholesale on each re-scoring.

use super::{parse_timestamp, parse_uuid, StoreResult};
use crate::models::{CanonicalValue, EntityKind, MetadataClaim};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

/// Append one claim; always succeeds, never updates
pub async fn append_claim(pool: &SqlitePool, claim: &MetadataClaim) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO metadata_claims
            (id, entity_id, entity_kind, provider_id, claim_key, claim_value,
             confidence, claimed_at, is_user_locked)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(claim.id.to_string())
    .bind(claim.entity_id.to_string())
    .bind(claim.entity_kind.as_str())
    .bind(&claim.provider_id)
    .bind(&claim.claim_key)
    .bind(&claim.claim_value)
    .bind(claim.confidence)
    .bind(claim.claimed_at.to_rfc3339())
    .bind(claim.is_user_locked as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// All claims for an entity, in claim order, no filtering
pub async fn list_claims(pool: &SqlitePool, entity_id: Uuid) -> StoreResult<Vec<MetadataClaim>> {
    let rows = sqlx::query(
        r#"
        SELECT id, entity_id, entity_kind, provider_id, claim_key, claim_value,
               confidence, claimed_at, is_user_locked
        FROM metadata_claims
        WHERE entity_id = ?
        ORDER BY claimed_at, id
        "#,
    )
    .bind(entity_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let id: String = row.get("id");
            let entity_id: String = row.get("entity_id");
            let entity_kind: String = row.get("entity_kind");
            let claimed_at: String = row.get("claimed_at");
            let locked: i64 = row.get("is_user_locked");

            Ok(MetadataClaim {
                id: parse_uuid(&id)?,
                entity_id: parse_uuid(&entity_id)?,
                entity_kind: EntityKind::parse(&entity_kind),
                provider_id: row.get("provider_id"),
                claim_key: row.get("claim_key"),
                claim_value: row.get("claim_value"),
                confidence: row.get("confidence"),
                claimed_at: parse_timestamp(&claimed_at)?,
                is_user_locked: locked != 0,
            })
        })
        .collect()
}

/// Total number of claim rows in the catalogue
pub async fn count_claims(pool: &SqlitePool) -> StoreResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM metadata_claims")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Replace the canonical value for (entity, key)
pub async fn upsert_canonical(
    pool: &SqlitePool,
    entity_id: Uuid,
    key: &str,
    value: &str,
    scored_at: DateTime<Utc>,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO canonical_values (entity_id, key, value, last_scored_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(entity_id, key) DO UPDATE SET
            value = excluded.value,
            last_scored_at = excluded.last_scored_at
        "#,
    )
    .bind(entity_id.to_string())
    .bind(key)
    .bind(value)
    .bind(scored_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// All canonical values for one entity
pub async fn list_canonical(
    pool: &SqlitePool,
    entity_id: Uuid,
) -> StoreResult<Vec<CanonicalValue>> {
    let rows = sqlx::query(
        "SELECT entity_id, key, value, last_scored_at FROM canonical_values \
         WHERE entity_id = ? ORDER BY key",
    )
    .bind(entity_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let entity_id: String = row.get("entity_id");
            let last_scored_at: String = row.get("last_scored_at");
            Ok(CanonicalValue {
                entity_id: parse_uuid(&entity_id)?,
                key: row.get("key"),
                value: row.get("value"),
                last_scored_at: parse_timestamp(&last_scored_at)?,
            })
        })
        .collect()
}

/// Canonical values for one entity as a key → value map
pub async fn canonical_map(
    pool: &SqlitePool,
    entity_id: Uuid,
) -> StoreResult<HashMap<String, String>> {
    let values = list_canonical(pool, entity_id).await?;
    Ok(values.into_iter().map(|cv| (cv.key, cv.value)).collect())
}

/// Merged canonical values across a work's editions
///
/// Claims are scoped to edition ids during ingestion, so identity matching
/// against a work reads through its editions. Later editions win on key
/// collisions (ordered by edition creation).
pub async fn canonical_map_for_work(
    pool: &SqlitePool,
    work_id: Uuid,
) -> StoreResult<HashMap<String, String>> {
    let rows = sqlx::query(
        r#"
        SELECT cv.key, cv.value
        FROM canonical_values cv
        JOIN editions e ON e.id = cv.entity_id
        WHERE e.work_id = ?
        ORDER BY e.created_at
        "#,
    )
    .bind(work_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut map = HashMap::new();
    for row in rows {
        let key: String = row.get("key");
        let value: String = row.get("value");
        map.insert(key, value);
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;

    fn claim(entity_id: Uuid, key: &str, value: &str) -> MetadataClaim {
        MetadataClaim {
            id: Uuid::new_v4(),
            entity_id,
            entity_kind: EntityKind::Edition,
            provider_id: "local-filesystem".to_string(),
            claim_key: key.to_string(),
            claim_value: value.to_string(),
            confidence: 0.9,
            claimed_at: Utc::now(),
            is_user_locked: false,
        }
    }

    #[tokio::test]
    async fn test_append_and_list_claims() {
        let pool = store::init_memory_store().await.unwrap();
        let entity = Uuid::new_v4();

        append_claim(&pool, &claim(entity, "title", "Dune")).await.unwrap();
        append_claim(&pool, &claim(entity, "author", "Frank Herbert"))
            .await
            .unwrap();

        let claims = list_claims(&pool, entity).await.unwrap();
        assert_eq!(claims.len(), 2);
        assert!(claims.iter().all(|c| c.entity_id == entity));
    }

    #[tokio::test]
    async fn test_claims_only_grow() {
        let pool = store::init_memory_store().await.unwrap();
        let entity = Uuid::new_v4();

        let mut last = count_claims(&pool).await.unwrap();
        for i in 0..5 {
            append_claim(&pool, &claim(entity, "title", &format!("v{i}")))
                .await
                .unwrap();
            let now = count_claims(&pool).await.unwrap();
            assert!(now > last, "claim count must monotonically increase");
            last = now;
        }
    }

    #[tokio::test]
    async fn test_upsert_canonical_replaces() {
        let pool = store::init_memory_store().await.unwrap();
        let entity = Uuid::new_v4();

        upsert_canonical(&pool, entity, "title", "Dune", Utc::now())
            .await
            .unwrap();
        upsert_canonical(&pool, entity, "title", "Dune: Special", Utc::now())
            .await
            .unwrap();

        let values = list_canonical(&pool, entity).await.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, "Dune: Special");
    }

    #[tokio::test]
    async fn test_canonical_map() {
        let pool = store::init_memory_store().await.unwrap();
        let entity = Uuid::new_v4();

        upsert_canonical(&pool, entity, "title", "Dune", Utc::now())
            .await
            .unwrap();
        upsert_canonical(&pool, entity, "isbn", "9780441013593", Utc::now())
            .await
            .unwrap();

        let map = canonical_map(&pool, entity).await.unwrap();
        assert_eq!(map.get("title").map(String::as_str), Some("Dune"));
        assert_eq!(map.len(), 2);
    }
}
