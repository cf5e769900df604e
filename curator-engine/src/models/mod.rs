//! Domain model types
//!
//! Entities persisted by the store plus the candidate passed between the
//! debounce queue and the ingestion orchestrator.

mod candidate;
mod entities;

pub use candidate::{CandidateState, IngestCandidate};
pub use entities::{
    AssetStatus, CanonicalPair, CanonicalValue, Edition, EntityKind, Hub, HubView, MediaAsset,
    MediaType, MetadataClaim, ProviderRegistration, Work, WorkView,
};
