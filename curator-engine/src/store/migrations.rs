//! Catalogue schema migrations
//!
//! Versioned, idempotent migrations tracked in `schema_version`. Each
//! migration guards its DDL with `pragma_table_info` column-presence checks
//! so a partially migrated database can re-run startup safely.

use super::StoreResult;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version; increment when adding a migration
const CURRENT_SCHEMA_VERSION: i32 = 2;

async fn get_schema_version(pool: &SqlitePool) -> StoreResult<i32> {
    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> StoreResult<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> StoreResult<bool> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM pragma_table_info('{table}') WHERE name = ?"
    ))
    .bind(column)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> StoreResult<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Catalogue schema version ({}) is newer than code version ({}); \
             proceeding without migration",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running catalogue migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        // v1 is the base schema, created by schema::create_all
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed (base schema)");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    Ok(())
}

/// v2: multi-file manifest column on media_assets
async fn migrate_v2(pool: &SqlitePool) -> StoreResult<()> {
    if !column_exists(pool, "media_assets", "manifest").await? {
        sqlx::query("ALTER TABLE media_assets ADD COLUMN manifest TEXT")
            .execute(pool)
            .await?;
        info!("Migration v2: added manifest column to media_assets");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = store::init_memory_store().await.unwrap();

        // Running again must be a no-op
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let version = get_schema_version(&pool).await.unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_manifest_column_present_after_migration() {
        let pool = store::init_memory_store().await.unwrap();
        assert!(column_exists(&pool, "media_assets", "manifest")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_newer_schema_is_tolerated() {
        let pool = store::init_memory_store().await.unwrap();
        set_schema_version(&pool, 99).await.unwrap();
        // Must warn, not fail
        run_migrations(&pool).await.unwrap();
    }
}
