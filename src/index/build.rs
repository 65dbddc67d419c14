//! Raw corpus to engine.

use std::path::Path;
use std::time::Instant;

use crate::corpus::{self, CorpusFormat, ParseStats};
use crate::engine::IndexEngine;
use crate::error::LoadError;

/// Insert progress is logged every this many terms.
const INSERT_PROGRESS_INTERVAL: u64 = 500_000;

/// Engine built from a raw corpus.
pub struct RawBuild<E> {
    pub engine: E,
    pub stats: ParseStats,
    /// Every parsed term in corpus order; empty unless retention was asked for.
    pub retained: Vec<String>,
}

/// Parse the corpus at `path` and insert every term into a fresh engine.
///
/// Blocking; run it off the async executor.
pub fn build_from_path<E: IndexEngine>(
    path: &Path,
    format: CorpusFormat,
    max_terms: Option<usize>,
    retain_terms: bool,
) -> Result<RawBuild<E>, LoadError> {
    let mut stream = corpus::open(path, format, max_terms).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LoadError::SourceNotFound(path.display().to_string()),
        _ => LoadError::Io(e),
    })?;

    tracing::info!(path = %path.display(), format = %format, "Building index from raw corpus");
    let started = Instant::now();
    let mut engine = E::default();
    let mut retained = Vec::new();
    let mut inserted: u64 = 0;

    for term in stream.by_ref() {
        let term = term?;
        engine.insert(&term);
        if retain_terms {
            retained.push(term);
        }
        inserted += 1;
        if inserted % INSERT_PROGRESS_INTERVAL == 0 {
            tracing::info!(terms = inserted, "Inserted terms into index");
        }
    }

    let stats = stream.stats();
    tracing::info!(
        terms = stats.terms,
        distinct = engine.len(),
        skipped = stats.skipped,
        truncated = stats.truncated,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Index build finished"
    );
    Ok(RawBuild { engine, stats, retained })
}
