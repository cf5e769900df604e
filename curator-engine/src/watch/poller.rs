//! Polling file watcher
//!
//! Diffs snapshots of the watch root on a fixed interval and feeds raw
//! events into the debounce queue. The snapshot walk runs on a blocking
//! thread so the poll loop never stalls the runtime. Renames surface as
//! Deleted + Created pairs; an OS-event watcher plugged into the same seam
//! can do better.

use super::debounce::DebounceQueue;
use super::{FileEvent, FileEventKind, WatchErrorSink};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

/// (size, mtime) fingerprint per file
type Snapshot = HashMap<PathBuf, (u64, SystemTime)>;

/// Polling watcher over one root directory
pub struct PollWatcher {
    root: PathBuf,
    interval: Duration,
}

impl PollWatcher {
    pub fn new(root: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            root: root.into(),
            interval,
        }
    }

    /// Run the poll loop until cancelled
    ///
    /// Events are handed to the debounce queue synchronously; `enqueue`
    /// never blocks, so the loop keeps pace regardless of pipeline load.
    pub fn spawn(
        self,
        queue: DebounceQueue,
        error_sink: Arc<dyn WatchErrorSink>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(root = %self.root.display(), "Poll watcher started");

            let mut previous: Snapshot = match self.take_snapshot(&error_sink).await {
                Some(snapshot) => snapshot,
                None => Snapshot::new(),
            };

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Poll watcher cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(self.interval) => {}
                }

                let Some(current) = self.take_snapshot(&error_sink).await else {
                    continue;
                };

                for (path, fingerprint) in &current {
                    match previous.get(path) {
                        None => queue.enqueue(FileEvent::now(path, FileEventKind::Created)),
                        Some(old) if old != fingerprint => {
                            queue.enqueue(FileEvent::now(path, FileEventKind::Modified))
                        }
                        Some(_) => {}
                    }
                }

                for path in previous.keys() {
                    if !current.contains_key(path) {
                        queue.enqueue(FileEvent::now(path, FileEventKind::Deleted));
                    }
                }

                previous = current;
            }
        })
    }

    /// Walk the root on a blocking thread; None when the walk itself fails
    async fn take_snapshot(&self, error_sink: &Arc<dyn WatchErrorSink>) -> Option<Snapshot> {
        let root = self.root.clone();
        let sink = Arc::clone(error_sink);

        let result = tokio::task::spawn_blocking(move || {
            let mut snapshot = Snapshot::new();

            for entry in WalkDir::new(&root).follow_links(false) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        sink.watch_error(&format!("walk error under {}: {e}", root.display()));
                        continue;
                    }
                };

                if !entry.file_type().is_file() {
                    continue;
                }

                match entry.metadata() {
                    Ok(metadata) => {
                        let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                        snapshot.insert(entry.into_path(), (metadata.len(), mtime));
                    }
                    Err(e) => {
                        sink.watch_error(&format!(
                            "metadata error for {}: {e}",
                            entry.path().display()
                        ));
                    }
                }
            }

            snapshot
        })
        .await;

        match result {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error_sink.watch_error(&format!("snapshot task failed: {e}"));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::debounce::DebounceConfig;
    use crate::watch::TracingErrorSink;
    use std::io::Write;
    use tempfile::TempDir;

    fn quick_debounce() -> DebounceConfig {
        DebounceConfig {
            settle_delay: Duration::from_millis(50),
            probe_interval: Duration::from_millis(20),
            max_probe_delay: Duration::from_millis(100),
            max_probe_attempts: 2,
            channel_capacity: 16,
        }
    }

    #[tokio::test]
    async fn test_new_file_produces_candidate() {
        let dir = TempDir::new().unwrap();
        let (queue, mut rx) = DebounceQueue::new(quick_debounce());
        let cancel = CancellationToken::new();

        let watcher = PollWatcher::new(dir.path(), Duration::from_millis(30));
        let handle = watcher.spawn(queue, Arc::new(TracingErrorSink), cancel.clone());

        // Let the watcher take its baseline snapshot, then drop a file in
        tokio::time::sleep(Duration::from_millis(60)).await;
        let path = dir.path().join("novel.epub");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"epub bytes").unwrap();
        drop(file);

        let candidate =
            tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("candidate within timeout")
                .expect("channel open");

        assert_eq!(candidate.kind, FileEventKind::Created);
        assert_eq!(candidate.path, path);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_deletion_produces_deleted_candidate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doomed.epub");
        std::fs::write(&path, b"bytes").unwrap();

        let (queue, mut rx) = DebounceQueue::new(quick_debounce());
        let cancel = CancellationToken::new();

        let watcher = PollWatcher::new(dir.path(), Duration::from_millis(30));
        let handle = watcher.spawn(queue, Arc::new(TracingErrorSink), cancel.clone());

        tokio::time::sleep(Duration::from_millis(60)).await;
        std::fs::remove_file(&path).unwrap();

        let candidate = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("candidate within timeout")
            .expect("channel open");

        assert_eq!(candidate.kind, FileEventKind::Deleted);

        cancel.cancel();
        handle.await.unwrap();
    }
}
