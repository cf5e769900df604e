//! File watching
//!
//! The watcher boundary is a raw [`FileEvent`] stream; anything able to
//! produce those events can feed the engine. The in-tree implementation is
//! a polling watcher ([`poller::PollWatcher`]) that diffs filesystem
//! snapshots; an OS-event watcher can plug into the same seam. Raw events
//! go straight into the [`debounce::DebounceQueue`], which owns settling
//! and lock probing.

pub mod debounce;
pub mod poller;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Raw filesystem event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileEventKind {
    Created,
    Modified,
    Deleted,
    /// Only produced by OS-event watchers; the polling watcher reports a
    /// rename as Deleted + Created
    Renamed,
}

/// One raw filesystem event
#[derive(Debug, Clone)]
pub struct FileEvent {
    pub path: PathBuf,
    /// Previous path for renames
    pub old_path: Option<PathBuf>,
    pub kind: FileEventKind,
    pub occurred_at: DateTime<Utc>,
}

impl FileEvent {
    pub fn now(path: impl Into<PathBuf>, kind: FileEventKind) -> Self {
        Self {
            path: path.into(),
            old_path: None,
            kind,
            occurred_at: Utc::now(),
        }
    }
}

/// Sink for non-fatal watch errors
///
/// Watch errors never crash the watcher; recovery is the caller's
/// responsibility.
pub trait WatchErrorSink: Send + Sync {
    fn watch_error(&self, error: &str);
}

/// Default sink: log and move on
pub struct TracingErrorSink;

impl WatchErrorSink for TracingErrorSink {
    fn watch_error(&self, error: &str) {
        tracing::warn!(error, "Watch error");
    }
}

/// Canonical per-path key used by the debounce queue
///
/// Full path, trailing separators stripped, upper-cased so the map is
/// case-insensitive on filesystems that are.
pub fn canonical_key(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim_end_matches(std::path::MAIN_SEPARATOR);
    trimmed.to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_key_strips_trailing_separator() {
        let sep = std::path::MAIN_SEPARATOR;
        let with = format!("{sep}inbox{sep}book.epub{sep}");
        let without = format!("{sep}inbox{sep}book.epub");
        assert_eq!(
            canonical_key(Path::new(&with)),
            canonical_key(Path::new(&without))
        );
    }

    #[test]
    fn test_canonical_key_uppercases() {
        assert_eq!(
            canonical_key(Path::new("/Inbox/Book.Epub")),
            canonical_key(Path::new("/inbox/book.epub"))
        );
    }
}
