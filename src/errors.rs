//! Relay error taxonomy.
//!
//! # Design Decisions
//! - Three classes, handled at the controller/transport boundary:
//!   validation (reported to the originating caller), persistence
//!   (transition aborted, prior state retained), malformed frames
//!   (dropped). None of them crash the process.
//! - Startup failures (bind, DDL, config) are fatal and surface through
//!   `anyhow` in `main` instead.

use thiserror::Error;

/// Errors produced by the warning lifecycle engine.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Command failed validation before any state mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Storage I/O failure; the attempted transition was aborted.
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Inbound frame that cannot be parsed into a recognized command.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
