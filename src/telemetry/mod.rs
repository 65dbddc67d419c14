//! Telemetry: structured logging, load spans, and metrics.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    record_artifact_fallback, record_fast_return, record_load_failure, record_load_success,
    record_skipped_records, ARTIFACT_FALLBACKS_TOTAL, LOADS_TOTAL, LOAD_SECONDS,
    SKIPPED_RECORDS_TOTAL, TERMS,
};
pub use spans::{LoadSpan, SpanExt};
