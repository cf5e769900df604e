//! Catalogue store
//!
//! Append-only persistent catalogue: hubs, works, editions, assets,
//! metadata claims, canonical values, provider registrations, and the
//! transaction journal. Single relational database file (SQLite via sqlx),
//! WAL journal mode, foreign keys on.
//!
//! Startup discipline: open (creating if absent), apply pragmas, run the
//! integrity check (fatal on failure), create tables idempotently, then run
//! column-presence-guarded migrations.

pub mod assets;
pub mod claims;
pub mod hubs;
pub mod journal;
mod migrations;
pub mod providers;
mod schema;

use sqlx::SqlitePool;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Store errors
///
/// Transient read/write failures surface as `Unavailable`; structural
/// corruption found at startup is `Corrupt` and fatal. Duplicate asset
/// inserts are not errors (see [`assets::InsertOutcome`]).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient failure talking to the database
    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// Integrity check failed; the engine must refuse to start
    #[error("store corrupt: {0}")]
    Corrupt(String),

    /// A row holds data the model cannot represent
    #[error("invalid row: {0}")]
    InvalidRow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Open the catalogue, verify integrity, and bring the schema up to date
///
/// Safe to call on every startup: table creation is `IF NOT EXISTS` and
/// migrations are guarded by column-presence inspection.
pub async fn init_store(db_path: &Path, vacuum_on_startup: bool) -> StoreResult<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePool::connect(&db_url).await?;

    if newly_created {
        info!("Initialized new catalogue: {}", db_path.display());
    } else {
        info!("Opened existing catalogue: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    run_integrity_check(&pool).await?;

    schema::create_all(&pool).await?;
    migrations::run_migrations(&pool).await?;

    if vacuum_on_startup {
        info!("Running VACUUM on startup");
        sqlx::query("VACUUM").execute(&pool).await?;
    }

    Ok(pool)
}

/// Open an in-memory catalogue with the full schema (test hosts)
///
/// Pinned to a single connection: every pooled connection to
/// `sqlite::memory:` would otherwise get its own empty database.
pub async fn init_memory_store() -> StoreResult<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    schema::create_all(&pool).await?;
    migrations::run_migrations(&pool).await?;
    Ok(pool)
}

/// Run `PRAGMA integrity_check`; anything but `ok` refuses startup
async fn run_integrity_check(pool: &SqlitePool) -> StoreResult<()> {
    let verdict: String = sqlx::query_scalar("PRAGMA integrity_check")
        .fetch_one(pool)
        .await?;

    if verdict != "ok" {
        return Err(StoreError::Corrupt(verdict));
    }

    Ok(())
}

pub(crate) fn parse_uuid(raw: &str) -> StoreResult<uuid::Uuid> {
    uuid::Uuid::parse_str(raw)
        .map_err(|e| StoreError::InvalidRow(format!("bad UUID '{raw}': {e}")))
}

pub(crate) fn parse_timestamp(raw: &str) -> StoreResult<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| StoreError::InvalidRow(format!("bad timestamp '{raw}': {e}")))
}
