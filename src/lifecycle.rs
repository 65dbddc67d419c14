//! Service lifecycle: load trigger, health snapshots, deferred shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::engine::{BkTree, IndexEngine, Match};
use crate::error::{LoadError, QueryError};
use crate::health::{HealthChecker, HealthSnapshot};
use crate::index::{LoadCoordinator, LoadOutcome, LoadStatus};
use crate::shutdown::ShutdownTimer;

/// Front door of the service. Owns the coordinator and the shutdown timer.
pub struct LifecycleManager<E: IndexEngine = BkTree> {
    coordinator: Arc<LoadCoordinator<E>>,
    timer: ShutdownTimer,
    health: HealthChecker,
    shutdown_after: Option<Duration>,
}

impl<E: IndexEngine> LifecycleManager<E> {
    pub fn new(
        coordinator: Arc<LoadCoordinator<E>>,
        baseline_enabled: bool,
        shutdown_after: Option<Duration>,
    ) -> Self {
        Self {
            coordinator,
            timer: ShutdownTimer::new(),
            health: HealthChecker::new(baseline_enabled, shutdown_after),
            shutdown_after,
        }
    }

    /// Load trigger. Safe to call repeatedly and concurrently.
    ///
    /// A call that publishes a new generation arms the shutdown timer when
    /// one is configured.
    pub async fn trigger_load(&self, force: bool) -> Result<LoadOutcome, LoadError> {
        let outcome = self.coordinator.request_load(force).await?;
        if outcome.status == LoadStatus::Loaded {
            if let Some(delay) = self.shutdown_after {
                self.timer.arm(delay).await;
            }
        }
        Ok(outcome)
    }

    /// Run [`Self::trigger_load`] on a background task.
    pub fn spawn_load(self: &Arc<Self>, force: bool) -> JoinHandle<Result<LoadOutcome, LoadError>> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let result = manager.trigger_load(force).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "Background load failed");
            }
            result
        })
    }

    pub async fn snapshot(&self) -> HealthSnapshot {
        let view = self.coordinator.view();
        let timer_active = self.timer.is_active().await;
        self.health.report(&view, timer_active)
    }

    pub fn is_ready(&self) -> bool {
        self.health.is_ready(&self.coordinator.view())
    }

    /// Schedule shutdown after `delay`, replacing any pending timer.
    pub async fn arm_shutdown(&self, delay: Duration) {
        self.timer.arm(delay).await;
    }

    /// Cancel the pending shutdown timer and wait for it to stop.
    pub async fn cancel_shutdown(&self) -> bool {
        self.timer.cancel().await
    }

    /// Resolves once the shutdown timer elapses.
    pub async fn shutdown_requested(&self) {
        self.timer.wait().await;
    }

    pub fn shutdown_fired(&self) -> bool {
        self.timer.has_fired()
    }

    /// Orderly teardown: no timer may fire after this returns.
    pub async fn teardown(&self) {
        if self.timer.cancel().await {
            tracing::info!("Pending shutdown timer cancelled during teardown");
        }
    }

    pub fn search(&self, query: &str, max_distance: u32) -> Result<Vec<Match>, QueryError> {
        self.coordinator.search(query, max_distance)
    }

    pub fn baseline_search(&self, query: &str, max_distance: u32) -> Result<Vec<Match>, QueryError> {
        self.coordinator.baseline_search(query, max_distance)
    }

    pub fn baseline_nearest(&self, query: &str) -> Result<Match, QueryError> {
        self.coordinator.baseline_nearest(query)
    }

    pub fn coordinator(&self) -> &Arc<LoadCoordinator<E>> {
        &self.coordinator
    }
}
