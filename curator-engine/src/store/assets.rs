//! Media asset persistence
//!
//! The content hash is the identity anchor: inserts are keyed on it, and a
//! duplicate hash is a silent non-event rather than an error.

use super::{parse_timestamp, parse_uuid, StoreResult};
use crate::models::{AssetStatus, MediaAsset};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Outcome of an asset insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New row persisted
    Inserted,
    /// An asset with this content hash already exists; nothing was written
    DuplicateHash,
}

/// Insert an asset unless its content hash is already catalogued
pub async fn insert_asset(pool: &SqlitePool, asset: &MediaAsset) -> StoreResult<InsertOutcome> {
    let manifest_json = match &asset.manifest {
        Some(paths) => Some(
            serde_json::to_string(paths)
                .map_err(|e| super::StoreError::InvalidRow(format!("manifest: {e}")))?,
        ),
        None => None,
    };

    let result = sqlx::query(
        r#"
        INSERT INTO media_assets (id, edition_id, content_hash, file_path_root, status, manifest, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(content_hash) DO NOTHING
        "#,
    )
    .bind(asset.id.to_string())
    .bind(asset.edition_id.to_string())
    .bind(&asset.content_hash)
    .bind(&asset.file_path_root)
    .bind(asset.status.as_str())
    .bind(manifest_json)
    .bind(asset.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        tracing::debug!(hash = %asset.content_hash, "Duplicate content hash, insert skipped");
        Ok(InsertOutcome::DuplicateHash)
    } else {
        Ok(InsertOutcome::Inserted)
    }
}

/// Look up an asset by its lowercase hex content hash
pub async fn find_asset_by_hash(pool: &SqlitePool, hash: &str) -> StoreResult<Option<MediaAsset>> {
    let row = sqlx::query(
        r#"
        SELECT id, edition_id, content_hash, file_path_root, status, manifest, created_at
        FROM media_assets
        WHERE content_hash = ?
        "#,
    )
    .bind(hash)
    .fetch_optional(pool)
    .await?;

    row.map(asset_from_row).transpose()
}

/// Update an asset's on-disk location after the organiser moves it
pub async fn update_asset_path(pool: &SqlitePool, asset_id: Uuid, path: &str) -> StoreResult<()> {
    sqlx::query("UPDATE media_assets SET file_path_root = ? WHERE id = ?")
        .bind(path)
        .bind(asset_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Mark assets whose file path matches as Orphaned, preserving their rows
///
/// Returns the affected assets so the caller can journal and publish.
pub async fn mark_orphaned_by_path(
    pool: &SqlitePool,
    path: &str,
) -> StoreResult<Vec<MediaAsset>> {
    let rows = sqlx::query(
        r#"
        SELECT id, edition_id, content_hash, file_path_root, status, manifest, created_at
        FROM media_assets
        WHERE file_path_root = ? AND status != 'Orphaned'
        "#,
    )
    .bind(path)
    .fetch_all(pool)
    .await?;

    let mut affected = Vec::with_capacity(rows.len());
    for row in rows {
        let asset = asset_from_row(row)?;
        sqlx::query("UPDATE media_assets SET status = 'Orphaned' WHERE id = ?")
            .bind(asset.id.to_string())
            .execute(pool)
            .await?;
        affected.push(asset);
    }

    Ok(affected)
}

fn asset_from_row(row: sqlx::sqlite::SqliteRow) -> StoreResult<MediaAsset> {
    let id: String = row.get("id");
    let edition_id: String = row.get("edition_id");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let manifest: Option<String> = row.get("manifest");

    let manifest = match manifest {
        Some(json) if !json.is_empty() => Some(
            serde_json::from_str(&json)
                .map_err(|e| super::StoreError::InvalidRow(format!("manifest: {e}")))?,
        ),
        _ => None,
    };

    Ok(MediaAsset {
        id: parse_uuid(&id)?,
        edition_id: parse_uuid(&edition_id)?,
        content_hash: row.get("content_hash"),
        file_path_root: row.get("file_path_root"),
        status: AssetStatus::parse(&status),
        manifest,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Edition, Hub, MediaType, Work};
    use crate::store::{self, hubs};
    use chrono::Utc;

    async fn seeded_edition(pool: &SqlitePool) -> Uuid {
        let hub = Hub::new("Test Hub");
        hubs::insert_hub(pool, &hub).await.unwrap();

        let work = Work {
            id: Uuid::new_v4(),
            hub_id: Some(hub.id),
            media_type: MediaType::Epub,
            sequence_index: None,
            created_at: Utc::now(),
        };
        hubs::insert_work(pool, &work).await.unwrap();

        let edition = Edition {
            id: Uuid::new_v4(),
            work_id: work.id,
            format_label: None,
            created_at: Utc::now(),
        };
        hubs::insert_edition(pool, &edition).await.unwrap();
        edition.id
    }

    fn asset_for(edition_id: Uuid, hash: &str) -> MediaAsset {
        MediaAsset {
            id: Uuid::new_v4(),
            edition_id,
            content_hash: hash.to_string(),
            file_path_root: "/library/test.epub".to_string(),
            status: AssetStatus::Normal,
            manifest: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_by_hash() {
        let pool = store::init_memory_store().await.unwrap();
        let edition_id = seeded_edition(&pool).await;

        let hash = "ab".repeat(32);
        let asset = asset_for(edition_id, &hash);

        let outcome = insert_asset(&pool, &asset).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);

        let found = find_asset_by_hash(&pool, &hash).await.unwrap().unwrap();
        assert_eq!(found.id, asset.id);
        assert_eq!(found.status, AssetStatus::Normal);
    }

    #[tokio::test]
    async fn test_duplicate_hash_is_silent() {
        let pool = store::init_memory_store().await.unwrap();
        let edition_id = seeded_edition(&pool).await;

        let hash = "cd".repeat(32);
        let first = asset_for(edition_id, &hash);
        let second = asset_for(edition_id, &hash);

        assert_eq!(
            insert_asset(&pool, &first).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            insert_asset(&pool, &second).await.unwrap(),
            InsertOutcome::DuplicateHash
        );

        // Exactly one row; the original survives
        let found = find_asset_by_hash(&pool, &hash).await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_mark_orphaned_preserves_row() {
        let pool = store::init_memory_store().await.unwrap();
        let edition_id = seeded_edition(&pool).await;

        let hash = "ef".repeat(32);
        let asset = asset_for(edition_id, &hash);
        insert_asset(&pool, &asset).await.unwrap();

        let affected = mark_orphaned_by_path(&pool, "/library/test.epub")
            .await
            .unwrap();
        assert_eq!(affected.len(), 1);

        let found = find_asset_by_hash(&pool, &hash).await.unwrap().unwrap();
        assert_eq!(found.status, AssetStatus::Orphaned);
    }

    #[tokio::test]
    async fn test_manifest_round_trip() {
        let pool = store::init_memory_store().await.unwrap();
        let edition_id = seeded_edition(&pool).await;

        let hash = "12".repeat(32);
        let mut asset = asset_for(edition_id, &hash);
        asset.manifest = Some(vec!["disc1.mp3".to_string(), "disc2.mp3".to_string()]);
        insert_asset(&pool, &asset).await.unwrap();

        let found = find_asset_by_hash(&pool, &hash).await.unwrap().unwrap();
        assert_eq!(found.manifest.unwrap().len(), 2);
    }
}
