//! Engine error types.
//!
//! Restore is fail-closed: any inconsistency in a serialized index rejects
//! the whole blob rather than yielding a partial tree.

use thiserror::Error;

/// Errors raised while saving or restoring an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid index format: {0}")]
    InvalidFormat(String),

    #[error("Index too large to encode: {0}")]
    TooLarge(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
