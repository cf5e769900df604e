//! HTTP API
//!
//! Thin shell over the engine core. Route groups mirror the surface:
//! catalogue reads, dry-run scans, manual metadata overrides, system
//! status, and the SSE event stream.

mod hubs;
mod ingestion;
mod metadata;
mod sse;
mod system;

pub use hubs::hub_routes;
pub use ingestion::ingestion_routes;
pub use metadata::metadata_routes;
pub use sse::event_stream;
pub use system::system_routes;
