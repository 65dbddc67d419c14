//! Health snapshots for liveness and readiness polling.
//!
//! Snapshots are assembled from one consistent coordinator view, so they
//! are safe to take while a load is in flight.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::index::{CoordinatorView, LoadState};

/// Read-only health surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: LoadState,
    pub term_count: u64,
    pub loaded: bool,
    pub loading: bool,
    pub baseline_enabled: bool,
    pub shutdown_after_seconds: Option<u64>,
    pub shutdown_timer_active: bool,
    pub last_error: Option<String>,
    pub artifact_loaded: bool,
    pub artifact_path: Option<String>,
    pub artifact_term_count: Option<u64>,
    pub generation: u64,
    pub uptime_secs: u64,
}

/// Builds health snapshots for one service instance.
#[derive(Debug, Clone)]
pub struct HealthChecker {
    baseline_enabled: bool,
    shutdown_after: Option<Duration>,
    start_time: Instant,
}

impl HealthChecker {
    pub fn new(baseline_enabled: bool, shutdown_after: Option<Duration>) -> Self {
        Self {
            baseline_enabled,
            shutdown_after,
            start_time: Instant::now(),
        }
    }

    /// Liveness: the process is responsive.
    pub fn is_alive(&self) -> bool {
        true
    }

    /// Readiness: a generation is published and can answer queries.
    pub fn is_ready<E>(&self, view: &CoordinatorView<E>) -> bool {
        view.current.is_some()
    }

    pub fn report<E>(&self, view: &CoordinatorView<E>, shutdown_timer_active: bool) -> HealthSnapshot {
        let current = view.current.as_ref();
        let artifact = current.and_then(|p| p.metadata.as_ref());

        HealthSnapshot {
            status: view.state,
            term_count: view.term_count(),
            loaded: current.is_some(),
            loading: view.state == LoadState::Loading,
            baseline_enabled: self.baseline_enabled,
            shutdown_after_seconds: self.shutdown_after.map(|d| d.as_secs()),
            shutdown_timer_active,
            last_error: view.last_error.clone(),
            artifact_loaded: artifact.is_some(),
            artifact_path: current.and_then(|p| p.artifact_path()),
            artifact_term_count: artifact.map(|m| m.term_count),
            generation: current.map_or(0, |p| p.generation),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}
