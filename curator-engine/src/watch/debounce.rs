//! Debounce queue
//!
//! Coalesces bursts of raw file events into at most one candidate per
//! path. Every incoming event replaces the path's "latest known event" and
//! restarts its settle timer; when a path stays quiet for the settle delay
//! the queue probes it for writer locks with exponential backoff and then
//! promotes it onto a bounded candidate channel (wait-on-full, so a slow
//! orchestrator back-pressures the watcher).
//!
//! Thread-safe for concurrent enqueue; no single-producer assumption.

use super::{canonical_key, FileEvent, FileEventKind};
use crate::models::IngestCandidate;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Debounce and probe tuning
#[derive(Debug, Clone)]
pub struct DebounceConfig {
    /// Quiet period after the last event before probing
    pub settle_delay: Duration,
    /// Base delay of the exponential probe backoff
    pub probe_interval: Duration,
    /// Cap on any single probe backoff
    pub max_probe_delay: Duration,
    /// Probe attempts before the candidate is emitted as failed
    pub max_probe_attempts: u32,
    /// Capacity of the bounded candidate channel
    pub channel_capacity: usize,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            probe_interval: Duration::from_secs(1),
            max_probe_delay: Duration::from_secs(30),
            max_probe_attempts: 8,
            channel_capacity: 512,
        }
    }
}

struct PathState {
    latest: FileEvent,
    /// Timestamp of the first event in the current burst
    first_seen: DateTime<Utc>,
    /// Bumped on every superseding event; settle tasks compare against it
    generation: u64,
    /// Cancels the currently running settle task
    cancel: CancellationToken,
}

struct DebounceInner {
    config: DebounceConfig,
    states: Mutex<HashMap<String, PathState>>,
    tx: mpsc::Sender<IngestCandidate>,
}

/// Per-path debouncer feeding the ingestion orchestrator
#[derive(Clone)]
pub struct DebounceQueue {
    inner: Arc<DebounceInner>,
}

impl DebounceQueue {
    /// Create the queue and its bounded candidate receiver
    pub fn new(config: DebounceConfig) -> (Self, mpsc::Receiver<IngestCandidate>) {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        (
            Self {
                inner: Arc::new(DebounceInner {
                    config,
                    states: Mutex::new(HashMap::new()),
                    tx,
                }),
            },
            rx,
        )
    }

    /// Record a raw event and (re)start the path's settle task
    ///
    /// Non-blocking: watcher callbacks may call this directly. Must run
    /// inside a tokio runtime.
    pub fn enqueue(&self, event: FileEvent) {
        let key = canonical_key(&event.path);

        let (generation, token) = {
            let mut states = self.inner.states.lock();
            match states.get_mut(&key) {
                Some(state) => {
                    // Newer event supersedes: cancel the running settle task
                    state.cancel.cancel();
                    state.cancel = CancellationToken::new();
                    state.generation += 1;
                    state.latest = event;
                    (state.generation, state.cancel.clone())
                }
                None => {
                    let token = CancellationToken::new();
                    let first_seen = event.occurred_at;
                    states.insert(
                        key.clone(),
                        PathState {
                            latest: event,
                            first_seen,
                            generation: 0,
                            cancel: token.clone(),
                        },
                    );
                    (0, token)
                }
            }
        };

        trace!(%key, generation, "Debounce event recorded, settle task started");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(settle_task(inner, key, generation, token));
    }

    /// Paths currently being debounced (diagnostics)
    pub fn pending_paths(&self) -> usize {
        self.inner.states.lock().len()
    }
}

/// One settle-and-probe cycle for a path generation
async fn settle_task(
    inner: Arc<DebounceInner>,
    key: String,
    generation: u64,
    cancel: CancellationToken,
) {
    // Settle: wait out the quiet period; a newer event cancels us silently.
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(inner.config.settle_delay) => {}
    }

    let Some((event, first_seen)) = snapshot_if_current(&inner, &key, generation) else {
        return;
    };

    // Deletions promote immediately: there is nothing left to probe.
    if event.kind == FileEventKind::Deleted {
        emit(&inner, &key, generation, event, first_seen, None).await;
        return;
    }

    // Lock probe with exponential backoff.
    let mut attempt = 1u32;
    loop {
        if snapshot_if_current(&inner, &key, generation).is_none() {
            return; // superseded while waiting
        }

        match probe_shared_read(&event.path).await {
            Ok(()) => {
                emit(&inner, &key, generation, event, first_seen, None).await;
                return;
            }
            Err(probe_err) => {
                if attempt >= inner.config.max_probe_attempts {
                    let reason = format!(
                        "lock probe exhausted after {attempt} attempts: {probe_err}"
                    );
                    debug!(%key, %reason, "Promoting failed candidate");
                    emit(&inner, &key, generation, event, first_seen, Some(reason)).await;
                    return;
                }

                let backoff = inner
                    .config
                    .probe_interval
                    .saturating_mul(1u32 << (attempt - 1).min(16))
                    .min(inner.config.max_probe_delay);

                trace!(%key, attempt, backoff_ms = backoff.as_millis() as u64, "Probe denied, backing off");

                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
                attempt += 1;
            }
        }
    }
}

/// Attempt a shared-read open off the runtime
///
/// The open syscall can stall on network filesystems, so it runs on a
/// blocking thread rather than pinning a tokio worker.
async fn probe_shared_read(path: &std::path::Path) -> std::io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || std::fs::File::open(&path).map(|_| ()))
        .await
        .unwrap_or_else(|join_err| {
            Err(std::io::Error::new(std::io::ErrorKind::Other, join_err))
        })
}

/// Latest event for the path if this settle task is still current
fn snapshot_if_current(
    inner: &DebounceInner,
    key: &str,
    generation: u64,
) -> Option<(FileEvent, DateTime<Utc>)> {
    let states = inner.states.lock();
    let state = states.get(key)?;
    if state.generation != generation {
        return None;
    }
    Some((state.latest.clone(), state.first_seen))
}

/// Send the candidate and clear the path state if still current
async fn emit(
    inner: &DebounceInner,
    key: &str,
    generation: u64,
    event: FileEvent,
    first_seen: DateTime<Utc>,
    failure_reason: Option<String>,
) {
    {
        let mut states = inner.states.lock();
        match states.get(key) {
            Some(state) if state.generation == generation => {
                states.remove(key);
            }
            // Superseded while probing: the newer settle task owns the path
            _ => return,
        }
    }

    let candidate = IngestCandidate {
        path: event.path,
        kind: event.kind,
        detected_at: first_seen,
        ready_at: Utc::now(),
        is_failed: failure_reason.is_some(),
        failure_reason,
    };

    // Bounded send: a full channel back-pressures this settle task
    if inner.tx.send(candidate).await.is_err() {
        debug!(%key, "Candidate channel closed, dropping candidate");
    }
}
