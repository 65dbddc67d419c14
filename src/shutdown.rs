//! Deferred self-termination.
//!
//! A one-shot timer that, when it elapses, cancels the service's shutdown
//! token. At most one timer is pending; arming again cancels the previous
//! one and waits for its task to finish before scheduling the new one.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct PendingShutdown {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    delay: Duration,
}

impl PendingShutdown {
    /// Cancel the timer task and wait until it has exited.
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Shutdown timer task ended abnormally");
        }
    }
}

/// Cancellable one-shot shutdown timer.
pub struct ShutdownTimer {
    slot: Mutex<Option<PendingShutdown>>,
    fired: CancellationToken,
}

impl ShutdownTimer {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            fired: CancellationToken::new(),
        }
    }

    /// Schedule shutdown after `delay`, replacing any pending timer.
    pub async fn arm(&self, delay: Duration) {
        let mut slot = self.slot.lock().await;
        if let Some(previous) = slot.take() {
            tracing::info!(previous_secs = previous.delay.as_secs(), "Replacing pending shutdown timer");
            previous.stop().await;
        }

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let fired = self.fired.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    tracing::warn!(delay_secs = delay.as_secs(), "Shutdown timer elapsed, requesting shutdown");
                    fired.cancel();
                }
            }
        });

        tracing::info!(delay_secs = delay.as_secs(), "Shutdown timer armed");
        *slot = Some(PendingShutdown { cancel, handle, delay });
    }

    /// Cancel the pending timer, if any, and wait for its task to exit.
    /// Returns true if a timer was pending.
    pub async fn cancel(&self) -> bool {
        let pending = self.slot.lock().await.take();
        match pending {
            Some(pending) => {
                pending.stop().await;
                tracing::info!("Shutdown timer cancelled");
                true
            }
            None => false,
        }
    }

    /// True while a timer is scheduled and has not yet elapsed.
    pub async fn is_active(&self) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(|pending| !pending.handle.is_finished())
    }

    /// Delay of the pending timer.
    pub async fn pending_delay(&self) -> Option<Duration> {
        self.slot.lock().await.as_ref().map(|pending| pending.delay)
    }

    pub fn has_fired(&self) -> bool {
        self.fired.is_cancelled()
    }

    /// Resolves once a timer elapses.
    pub async fn wait(&self) {
        self.fired.cancelled().await;
    }

    /// Token cancelled when a timer elapses.
    pub fn fired_token(&self) -> CancellationToken {
        self.fired.clone()
    }
}

impl Default for ShutdownTimer {
    fn default() -> Self {
        Self::new()
    }
}
