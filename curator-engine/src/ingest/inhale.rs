//! The great inhale
//!
//! Disaster-recovery reconciliation: walk the data root, read every
//! sidecar descriptor, and rebuild hubs, works, editions, assets and
//! canonical values into the catalogue. Idempotent — entities already
//! present are left untouched, so the inhale can run against a partial
//! catalogue as well as an empty one.

use super::sidecar::{self, SidecarDoc};
use crate::models::{AssetStatus, Edition, Hub, MediaAsset, Work};
use crate::store::{assets, claims, hubs, StoreResult};
use chrono::Utc;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Summary of one inhale pass
#[derive(Debug, Default, Clone)]
pub struct InhaleReport {
    pub sidecars_read: usize,
    pub sidecars_failed: usize,
    pub assets_restored: usize,
    pub assets_already_present: usize,
}

/// Rebuild the catalogue from sidecars under `data_root`
pub async fn great_inhale(pool: &SqlitePool, data_root: &Path) -> StoreResult<InhaleReport> {
    let mut report = InhaleReport::default();

    let sidecar_paths: Vec<_> = WalkDir::new(data_root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| sidecar::is_sidecar(path))
        .collect();

    info!(
        count = sidecar_paths.len(),
        root = %data_root.display(),
        "Great inhale starting"
    );

    for path in sidecar_paths {
        let doc = match sidecar::read_sidecar(&path).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable sidecar");
                report.sidecars_failed += 1;
                continue;
            }
        };
        report.sidecars_read += 1;

        match restore_one(pool, &path, &doc).await? {
            true => report.assets_restored += 1,
            false => report.assets_already_present += 1,
        }
    }

    info!(
        restored = report.assets_restored,
        already_present = report.assets_already_present,
        failed = report.sidecars_failed,
        "Great inhale complete"
    );

    Ok(report)
}

/// Restore one sidecar's chain; returns true when the asset row was new
async fn restore_one(
    pool: &SqlitePool,
    sidecar_path: &Path,
    doc: &SidecarDoc,
) -> StoreResult<bool> {
    if assets::find_asset_by_hash(pool, &doc.content_hash)
        .await?
        .is_some()
    {
        return Ok(false);
    }

    // Reuse the named hub when it already exists; otherwise recreate it
    // with the recorded id so sidecars written against one catalogue stay
    // consistent with each other.
    let hub_id = match hubs::find_hub_by_display_name(pool, &doc.hub_name).await? {
        Some(hub) => hub.id,
        None => {
            let hub = Hub {
                id: doc.hub_id,
                universe_id: None,
                display_name: doc.hub_name.clone(),
                created_at: Utc::now(),
            };
            hubs::insert_hub(pool, &hub).await?;
            hub.id
        }
    };

    let work = Work {
        id: doc.work_id,
        hub_id: Some(hub_id),
        media_type: doc.media_type,
        sequence_index: None,
        created_at: Utc::now(),
    };
    hubs::insert_work(pool, &work).await?;

    let edition = Edition {
        id: doc.edition_id,
        work_id: doc.work_id,
        format_label: doc.format_label.clone(),
        created_at: Utc::now(),
    };
    hubs::insert_edition(pool, &edition).await?;

    for (key, value) in &doc.canonical_values {
        claims::upsert_canonical(pool, doc.edition_id, key, value, Utc::now()).await?;
    }

    // The media file sits beside its sidecar
    let media_path = sidecar_path
        .to_string_lossy()
        .trim_end_matches(sidecar::SIDECAR_SUFFIX)
        .to_string();

    let asset = MediaAsset {
        id: doc.asset_id,
        edition_id: doc.edition_id,
        content_hash: doc.content_hash.clone(),
        file_path_root: media_path,
        status: AssetStatus::Normal,
        manifest: None,
        created_at: Utc::now(),
    };
    assets::insert_asset(pool, &asset).await?;

    Ok(true)
}
