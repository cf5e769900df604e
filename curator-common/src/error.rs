//! Common error types for Curator
//!
//! The shared surface is deliberately small: configuration loading/saving
//! is the only concern living in this crate that can fail. Components with
//! richer failure modes (the store, the organiser, the hasher) define
//! their own error enums next to their code.

use thiserror::Error;

/// Common result type for Curator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures shared across Curator crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration unreadable or unserializable; fatal outside first run
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
