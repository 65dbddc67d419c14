//! Load and query error types.
//!
//! Per-record parse problems never surface here; they are counted in
//! [`crate::corpus::ParseStats`]. Everything below ends a load attempt or a
//! read.

use thiserror::Error;

/// Errors that terminate a load attempt.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Corpus source not found: {0}")]
    SourceNotFound(String),

    #[error("Artifact corrupt: {0}")]
    ArtifactCorrupt(String),

    #[error("Transfer failed for {location}: {reason}")]
    TransferFailure { location: String, reason: String },

    #[error("Index build failed: {0}")]
    BuildFailure(String),

    #[error("No corpus source or artifact configured")]
    NotConfigured,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    /// Returns true for failures a raw-corpus fallback can recover from.
    pub fn is_artifact_error(&self) -> bool {
        matches!(self, Self::ArtifactCorrupt(_) | Self::TransferFailure { .. })
    }

    /// Short label used for metrics and span fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceNotFound(_) => "source_not_found",
            Self::ArtifactCorrupt(_) => "artifact_corrupt",
            Self::TransferFailure { .. } => "transfer_failure",
            Self::BuildFailure(_) => "build_failure",
            Self::NotConfigured => "not_configured",
            Self::Io(_) => "io",
        }
    }

    pub(crate) fn corrupt(context: &str, err: impl std::fmt::Display) -> Self {
        Self::ArtifactCorrupt(format!("{}: {}", context, err))
    }

    pub(crate) fn transfer(location: impl ToString, err: impl std::fmt::Display) -> Self {
        Self::TransferFailure {
            location: location.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Errors returned to readers of the published index.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueryError {
    #[error("Index not ready")]
    NotReady,

    #[error("Baseline comparator unavailable: no retained terms")]
    BaselineUnavailable,
}

impl QueryError {
    /// Returns true if the caller should retry once loading completes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady)
    }
}
