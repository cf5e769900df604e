//! Ingestion candidate and its state machine

use crate::watch::FileEventKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A settled, lock-probed file handed from the debounce queue to the
/// ingestion orchestrator
#[derive(Debug, Clone)]
pub struct IngestCandidate {
    pub path: PathBuf,
    /// Kind of the most recent event for this path
    pub kind: FileEventKind,
    /// Timestamp of the first event in the coalesced burst
    pub detected_at: DateTime<Utc>,
    /// When the candidate cleared (or gave up on) the lock probe
    pub ready_at: DateTime<Utc>,
    /// True when the lock probe exhausted its attempts
    pub is_failed: bool,
    pub failure_reason: Option<String>,
}

/// Lifecycle of a candidate through ingestion
///
/// `Watch → Staging → (Library | Rejected | LockTimeout)`. Only `Library`
/// terminates with a persisted asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateState {
    /// Seen by the watcher, not yet settled
    Watch,
    /// Being hashed/processed/scored
    Staging,
    /// Persisted to the catalogue
    Library,
    /// Corrupt, duplicate, or otherwise refused
    Rejected,
    /// Lock probe exhausted its attempts
    LockTimeout,
}

impl CandidateState {
    /// Whether the state terminates the candidate's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CandidateState::Library | CandidateState::Rejected | CandidateState::LockTimeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateState::Watch => "Watch",
            CandidateState::Staging => "Staging",
            CandidateState::Library => "Library",
            CandidateState::Rejected => "Rejected",
            CandidateState::LockTimeout => "LockTimeout",
        }
    }
}
