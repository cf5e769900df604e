//! Transaction journal
//!
//! Append-only audit rows. Pruning deletes the oldest overflow with a
//! DELETE-with-subquery so it works without DELETE ... LIMIT support.

use super::StoreResult;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Append one audit row
pub async fn log_event(
    pool: &SqlitePool,
    event_type: &str,
    entity_type: &str,
    entity_id: Uuid,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO transaction_log (event_type, entity_type, entity_id) VALUES (?, ?, ?)",
    )
    .bind(event_type)
    .bind(entity_type)
    .bind(entity_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete oldest rows beyond `max_entries`; returns rows removed
pub async fn prune_log(pool: &SqlitePool, max_entries: i64) -> StoreResult<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM transaction_log
        WHERE id NOT IN (
            SELECT id FROM transaction_log
            ORDER BY id DESC
            LIMIT ?
        )
        "#,
    )
    .bind(max_entries)
    .execute(pool)
    .await?;

    let removed = result.rows_affected();
    if removed > 0 {
        tracing::debug!(removed, max_entries, "Pruned transaction log");
    }

    Ok(removed)
}

/// Number of journal rows recorded for an entity and event type
pub async fn count_events(
    pool: &SqlitePool,
    event_type: &str,
    entity_id: Uuid,
) -> StoreResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM transaction_log WHERE event_type = ? AND entity_id = ?",
    )
    .bind(event_type)
    .bind(entity_id.to_string())
    .fetch_one(pool)
    .await?;

    Ok(count)
}
