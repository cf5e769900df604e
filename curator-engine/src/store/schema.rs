//! Catalogue table definitions
//!
//! All creation is `CREATE TABLE IF NOT EXISTS` so startup is idempotent.
//! Identifiers are UUIDs stored as TEXT; timestamps are RFC 3339 TEXT
//! except audit columns that default to `CURRENT_TIMESTAMP`.

use super::StoreResult;
use sqlx::SqlitePool;

/// Create every catalogue table and index
pub async fn create_all(pool: &SqlitePool) -> StoreResult<()> {
    create_schema_version_table(pool).await?;
    create_hubs_table(pool).await?;
    create_works_table(pool).await?;
    create_editions_table(pool).await?;
    create_assets_table(pool).await?;
    create_claims_table(pool).await?;
    create_canonical_table(pool).await?;
    create_providers_table(pool).await?;
    create_journal_table(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_hubs_table(pool: &SqlitePool) -> StoreResult<()> {
    // display_name is a case-insensitive reuse key, deliberately not UNIQUE:
    // collisions are tolerated and merged by the arbiter later.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hubs (
            id TEXT PRIMARY KEY,
            universe_id TEXT,
            display_name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_hubs_display_name \
         ON hubs(display_name COLLATE NOCASE)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_works_table(pool: &SqlitePool) -> StoreResult<()> {
    // hub_id is nullable so deleting a Hub can orphan its Works for
    // recovery instead of cascading.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS works (
            id TEXT PRIMARY KEY,
            hub_id TEXT REFERENCES hubs(id) ON DELETE SET NULL,
            media_type TEXT NOT NULL DEFAULT 'Unknown',
            sequence_index REAL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_works_hub_id ON works(hub_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_editions_table(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS editions (
            id TEXT PRIMARY KEY,
            work_id TEXT NOT NULL REFERENCES works(id) ON DELETE CASCADE,
            format_label TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_editions_work_id ON editions(work_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_assets_table(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_assets (
            id TEXT PRIMARY KEY,
            edition_id TEXT NOT NULL REFERENCES editions(id) ON DELETE CASCADE,
            content_hash TEXT NOT NULL UNIQUE,
            file_path_root TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'Normal'
                CHECK (status IN ('Normal', 'Conflicted', 'Orphaned')),
            created_at TEXT NOT NULL,
            CHECK (length(content_hash) = 64)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_assets_hash ON media_assets(content_hash)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_assets_path ON media_assets(file_path_root)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_claims_table(pool: &SqlitePool) -> StoreResult<()> {
    // Append-only: rows are never updated or deleted, so historical
    // re-scoring stays reproducible.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metadata_claims (
            id TEXT PRIMARY KEY,
            entity_id TEXT NOT NULL,
            entity_kind TEXT NOT NULL DEFAULT 'edition'
                CHECK (entity_kind IN ('work', 'edition')),
            provider_id TEXT NOT NULL,
            claim_key TEXT NOT NULL,
            claim_value TEXT NOT NULL,
            confidence REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0),
            claimed_at TEXT NOT NULL,
            is_user_locked INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_claims_entity ON metadata_claims(entity_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_canonical_table(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS canonical_values (
            entity_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            last_scored_at TEXT NOT NULL,
            PRIMARY KEY (entity_id, key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_providers_table(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS providers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            enabled INTEGER NOT NULL DEFAULT 1,
            default_weight REAL NOT NULL DEFAULT 1.0,
            field_weights TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_journal_table(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transaction_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_journal_created_at ON transaction_log(created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
