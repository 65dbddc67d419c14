//! Matching engine capability set.
//!
//! The load path talks to engines only through [`IndexEngine`]. The BK-tree
//! is the production implementation; [`BaselineComparator`] is an exhaustive
//! scan kept for cross-checking and low-volume queries.

mod baseline;
mod bktree;
mod error;

pub use baseline::BaselineComparator;
pub use bktree::BkTree;
pub use error::EngineError;

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A stored term paired with its edit distance from the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub term: String,
    pub distance: u32,
}

impl Match {
    pub fn new(term: impl Into<String>, distance: u32) -> Self {
        Self { term: term.into(), distance }
    }
}

/// Capabilities required from a matching engine.
///
/// Engines are built on a background thread, then published behind an `Arc`
/// and only read afterwards, so they must be `Send + Sync`.
pub trait IndexEngine: Default + Send + Sync + 'static {
    /// Insert a term. Inserting a term already present is a no-op.
    fn insert(&mut self, term: &str);

    /// All stored terms within `max_distance` of `query`, ascending by
    /// distance (ties broken by term).
    fn search(&self, query: &str, max_distance: u32) -> Vec<Match>;

    /// Serialize the engine to `path`.
    fn save(&self, path: &Path) -> Result<(), EngineError>;

    /// Reconstruct an engine previously written by [`IndexEngine::save`].
    fn restore(path: &Path) -> Result<Self, EngineError>;

    /// Number of distinct stored terms.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Levenshtein distance over Unicode scalar values.
pub fn edit_distance(a: &str, b: &str) -> u32 {
    u32::try_from(strsim::levenshtein(a, b)).unwrap_or(u32::MAX)
}

pub(crate) fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.term.cmp(&b.term)));
}
