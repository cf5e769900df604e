//! Identity matching and hub arbitration
//!
//! The matcher compares two entities' canonical values: a hard-identifier
//! pass that short-circuits on any shared normalised identifier, then a
//! fuzzy pass over the remaining shared keys. The arbiter uses the matcher
//! to decide how a work joins (or does not join) an existing hub.

mod arbiter;
mod comparators;
mod matcher;

pub use arbiter::{ArbiterDecision, HubArbiter};
pub use comparators::{
    normalize_identifier, ExactIdentifierComparator, FieldComparator, LevenshteinComparator,
    HARD_IDENTIFIER_KEYS,
};
pub use matcher::{Disposition, IdentityMatcher, MatchOutcome, MatchThresholds};
