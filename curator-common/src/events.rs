//! Event types for the Curator event system
//!
//! Provides the shared event enum, the broadcast `EventBus`, and the
//! `EventPublisher` seam the engine publishes through. A headless host can
//! swap in [`NullPublisher`] and the engine behaves identically.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Curator lifecycle events
///
/// Events are broadcast via [`EventBus`] and can be serialized for SSE
/// transmission. All events carry a UTC timestamp so subscribers never have
/// to guess ordering across reconnects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CuratorEvent {
    /// A new asset completed ingestion and was persisted to the catalogue
    MediaAdded {
        /// Asset UUID
        asset_id: Uuid,
        /// Hub the asset's work was placed under
        hub_id: Uuid,
        /// Work created for this asset
        work_id: Uuid,
        /// Edition created for this asset
        edition_id: Uuid,
        /// Current on-disk location
        path: String,
        /// When the asset was persisted
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Metadata claims for an entity were scored into canonical values
    MetadataHarvested {
        /// Entity (work or edition) that was scored
        entity_id: Uuid,
        /// Number of fields that produced a canonical value
        field_count: usize,
        /// Mean confidence across winning fields
        overall_confidence: f64,
        /// Field keys whose runner-up came within the conflict epsilon
        conflicted_fields: Vec<String>,
        /// When scoring completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A candidate's content hash already exists in the catalogue
    ///
    /// Duplicate hashes are not errors; the candidate is skipped silently
    /// apart from this notification.
    DuplicateSkipped {
        /// Path of the skipped candidate
        path: String,
        /// Hash shared with the existing asset
        content_hash: String,
        /// Asset already holding this hash
        existing_asset_id: Uuid,
        /// When the duplicate was detected
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A processor reported the candidate file as corrupt
    AssetCorrupt {
        /// Path of the corrupt candidate
        path: String,
        /// Processor-supplied reason
        reason: String,
        /// Where the file was quarantined, if the move succeeded
        quarantined_to: Option<String>,
        /// When corruption was detected
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A candidate failed before reaching the catalogue
    ///
    /// Covers lock-probe exhaustion and files that vanished between the
    /// watcher and the orchestrator.
    IngestFailed {
        /// Path of the failed candidate
        path: String,
        /// Failure description
        reason: String,
        /// When the failure was recorded
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An asset's backing file was deleted from the watch root
    ///
    /// The asset row is preserved with status Orphaned for recovery.
    AssetOrphaned {
        /// Asset UUID
        asset_id: Uuid,
        /// Path that disappeared
        path: String,
        /// When orphaning was recorded
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A scan of the watch root completed
    ScanCompleted {
        /// Root folder that was scanned
        root: String,
        /// Candidates handed to the debounce queue
        candidates_found: usize,
        /// Scan duration in milliseconds
        duration_ms: u64,
        /// When the scan finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The on-disk configuration was mutated and re-persisted
    ///
    /// Components holding derived state (provider weights, thresholds)
    /// subscribe to this and reload.
    ConfigChanged {
        /// When the configuration was saved
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl CuratorEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            CuratorEvent::MediaAdded { .. } => "MediaAdded",
            CuratorEvent::MetadataHarvested { .. } => "MetadataHarvested",
            CuratorEvent::DuplicateSkipped { .. } => "DuplicateSkipped",
            CuratorEvent::AssetCorrupt { .. } => "AssetCorrupt",
            CuratorEvent::IngestFailed { .. } => "IngestFailed",
            CuratorEvent::AssetOrphaned { .. } => "AssetOrphaned",
            CuratorEvent::ScanCompleted { .. } => "ScanCompleted",
            CuratorEvent::ConfigChanged { .. } => "ConfigChanged",
        }
    }
}

/// Publisher seam between the engine and whoever is listening
///
/// `publish` must never fail: delivering to zero subscribers is a success.
/// The engine only ever talks to this trait, so headless hosts can run with
/// [`NullPublisher`] and tests can capture events with their own impl.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: CuratorEvent);
}

/// Central event distribution bus
///
/// Wraps `tokio::sync::broadcast`, providing non-blocking publish (slow
/// subscribers never block producers), multiple concurrent subscribers, and
/// automatic cleanup when receivers drop.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CuratorEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Old events are dropped once the buffer fills; lagged subscribers see
    /// a `RecvError::Lagged` and can resynchronise from the catalogue.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CuratorEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CuratorEvent,
    ) -> Result<usize, broadcast::error::SendError<CuratorEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    pub fn emit_lossy(&self, event: CuratorEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: CuratorEvent) {
        self.emit_lossy(event);
    }
}

/// Publisher that drops every event
///
/// Explicitly permitted for headless hosts and handy in tests that do not
/// assert on events.
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: CuratorEvent) {}
}
