//! Watch-root scans
//!
//! Two flavours: the startup differential scan that feeds files which
//! appeared while the process was down into the debounce queue, and the
//! dry-run scan behind `POST /ingestion/scan` that reports pending
//! operations without mutating anything.
//!
//! Both walk sequentially and verify candidates in parallel, since the
//! verification step touches every file.

use crate::models::MediaType;
use crate::processors::FallbackProcessor;
use crate::watch::debounce::DebounceQueue;
use crate::watch::{FileEvent, FileEventKind};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Names never considered candidates
const IGNORED_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", ".git"];

/// One pending operation reported by the dry-run scan
#[derive(Debug, Clone, Serialize)]
pub struct PendingOperation {
    pub path: PathBuf,
    pub detected_type: MediaType,
    pub size_bytes: u64,
}

/// Walk the watch root and return verified candidate files
///
/// Phase 1 walks sequentially; phase 2 verifies readability and size in
/// parallel, dropping anything empty or unreadable.
pub fn collect_candidates(watch_root: &Path) -> Vec<(PathBuf, u64)> {
    let mut discovered = Vec::new();

    for entry in WalkDir::new(watch_root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Scan walk error");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if IGNORED_NAMES.iter().any(|ignored| name.contains(ignored)) {
            continue;
        }

        discovered.push(entry.into_path());
    }

    discovered
        .par_iter()
        .filter_map(|path| {
            let metadata = std::fs::metadata(path).ok()?;
            if metadata.len() == 0 {
                return None;
            }
            std::fs::File::open(path).ok()?;
            Some((path.clone(), metadata.len()))
        })
        .collect()
}

/// Startup differential scan: enqueue every candidate as a Created event
///
/// Files already catalogued fall out later at the duplicate-hash check, so
/// re-feeding them here is harmless.
pub fn differential_scan(watch_root: &Path, queue: &DebounceQueue) -> usize {
    let started = Instant::now();
    let candidates = collect_candidates(watch_root);
    let count = candidates.len();

    for (path, _) in candidates {
        queue.enqueue(FileEvent::now(path, FileEventKind::Created));
    }

    info!(
        root = %watch_root.display(),
        count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Startup differential scan complete"
    );

    count
}

/// Dry-run scan: report what ingestion would pick up, with no mutation
pub fn dry_run_scan(watch_root: &Path) -> Vec<PendingOperation> {
    collect_candidates(watch_root)
        .into_iter()
        .map(|(path, size_bytes)| {
            let detected_type = FallbackProcessor::type_from_extension(&path);
            PendingOperation {
                path,
                detected_type,
                size_bytes,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::debounce::{DebounceConfig, DebounceQueue};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_collect_skips_empty_and_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("book.epub"), b"bytes").unwrap();
        std::fs::write(dir.path().join("empty.epub"), b"").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), b"junk").unwrap();

        let candidates = collect_candidates(dir.path());
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].0.ends_with("book.epub"));
    }

    #[test]
    fn test_dry_run_reports_types() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("book.epub"), b"bytes").unwrap();
        std::fs::write(dir.path().join("film.mkv"), b"bytes").unwrap();

        let mut pending = dry_run_scan(dir.path());
        pending.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].detected_type, MediaType::Epub);
        assert_eq!(pending[1].detected_type, MediaType::Movie);
    }

    #[tokio::test]
    async fn test_differential_scan_feeds_queue() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("book.epub"), b"bytes").unwrap();

        let (queue, mut rx) = DebounceQueue::new(DebounceConfig {
            settle_delay: Duration::from_millis(20),
            probe_interval: Duration::from_millis(10),
            max_probe_delay: Duration::from_millis(50),
            max_probe_attempts: 2,
            channel_capacity: 8,
        });

        let count = differential_scan(dir.path(), &queue);
        assert_eq!(count, 1);

        let candidate = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(candidate.path.ends_with("book.epub"));
    }
}
