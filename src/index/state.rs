//! Load state and the published generation.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::source::CorpusSource;
use crate::artifact::ArtifactMetadata;

/// Lifecycle of the serving index.
///
/// `Empty | Failed -> Loading -> Ready | Failed`. A forced reload moves
/// `Ready -> Loading` only on explicit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Empty,
    Loading,
    Ready,
    Failed,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable generation of the index. Readers hold an `Arc` to it, so
/// engine, count and metadata always belong together.
#[derive(Debug)]
pub struct Published<E> {
    pub generation: u64,
    pub engine: Arc<E>,
    pub term_count: u64,
    pub metadata: Option<ArtifactMetadata>,
    pub retained: Arc<Vec<String>>,
    pub source: CorpusSource,
}

impl<E> Published<E> {
    pub fn from_artifact(&self) -> bool {
        self.metadata.is_some()
    }

    /// Artifact reference this generation was restored from.
    pub fn artifact_path(&self) -> Option<String> {
        self.source
            .is_artifact()
            .then(|| self.source.location.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    /// This call built and published a new generation.
    Loaded,
    /// A generation was already serving; nothing was done.
    AlreadyLoaded,
    /// Another attempt holds the builder role; the published count was returned.
    Loading,
}

/// Response of the load trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub status: LoadStatus,
    pub term_count: u64,
}

impl LoadOutcome {
    pub fn new(status: LoadStatus, term_count: u64) -> Self {
        Self { status, term_count }
    }
}
