//! Span helpers for load attempts.

use tracing::{info_span, Span};

/// Extension trait for recording outcomes on spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for load attempt spans.
pub struct LoadSpan;

impl LoadSpan {
    /// Fields filled in later: `source`, `term_count`, `elapsed_ms`,
    /// `status`, `error.message`.
    pub fn new(attempt_id: &str, force: bool) -> Span {
        info_span!(
            "load_attempt",
            attempt_id = %attempt_id,
            force,
            source = tracing::field::Empty,
            term_count = tracing::field::Empty,
            elapsed_ms = tracing::field::Empty,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }
}
