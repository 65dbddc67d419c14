//! Load metrics recorded through the `metrics` facade.
//!
//! No exporter is installed here; the embedding process decides where the
//! facade's values go.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::index::{LoadStatus, SourceKind};

pub const LOADS_TOTAL: &str = "term_index_loads_total";
pub const TERMS: &str = "term_index_terms";
pub const LOAD_SECONDS: &str = "term_index_load_seconds";
pub const SKIPPED_RECORDS_TOTAL: &str = "term_index_skipped_records_total";
pub const ARTIFACT_FALLBACKS_TOTAL: &str = "term_index_artifact_fallbacks_total";

pub fn record_load_success(source: SourceKind, term_count: u64, elapsed: Duration) {
    let source = match source {
        SourceKind::Raw => "raw",
        SourceKind::Artifact => "artifact",
    };
    counter!(LOADS_TOTAL, "outcome" => "loaded", "source" => source).increment(1);
    gauge!(TERMS).set(term_count as f64);
    histogram!(LOAD_SECONDS, "outcome" => "loaded").record(elapsed.as_secs_f64());
}

pub fn record_load_failure(kind: &'static str, elapsed: Duration) {
    counter!(LOADS_TOTAL, "outcome" => "failed", "error" => kind).increment(1);
    histogram!(LOAD_SECONDS, "outcome" => "failed").record(elapsed.as_secs_f64());
}

/// A trigger that returned without running an attempt.
pub fn record_fast_return(status: LoadStatus) {
    let outcome = match status {
        LoadStatus::AlreadyLoaded => "already_loaded",
        LoadStatus::Loading => "loading",
        LoadStatus::Loaded => "loaded",
    };
    counter!(LOADS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_skipped_records(count: u64) {
    if count > 0 {
        counter!(SKIPPED_RECORDS_TOTAL).increment(count);
    }
}

pub fn record_artifact_fallback() {
    counter!(ARTIFACT_FALLBACKS_TOTAL).increment(1);
}
