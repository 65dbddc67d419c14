//! Single-flight index loading and atomic publication.
//!
//! At most one attempt holds the builder role. A trigger that cannot take it
//! returns the currently published term count instead of waiting. A
//! successful attempt replaces the published generation with one pointer
//! swap; a failed attempt leaves the previous generation serving.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use super::resolver::{BuiltIndex, SourceResolver};
use super::state::{LoadOutcome, LoadState, LoadStatus, Published};
use crate::engine::{BaselineComparator, BkTree, IndexEngine, Match};
use crate::error::{LoadError, QueryError};
use crate::telemetry::{self, LoadSpan, SpanExt};

struct Inner<E> {
    state: LoadState,
    last_error: Option<String>,
    current: Option<Arc<Published<E>>>,
}

/// Consistent view of the coordinator taken under one lock.
#[derive(Debug)]
pub struct CoordinatorView<E> {
    pub state: LoadState,
    pub last_error: Option<String>,
    pub current: Option<Arc<Published<E>>>,
}

impl<E> CoordinatorView<E> {
    pub fn term_count(&self) -> u64 {
        self.current.as_ref().map_or(0, |p| p.term_count)
    }
}

/// State shared with the task that runs an attempt.
struct Shared<E> {
    resolver: SourceResolver,
    retain_terms: bool,
    inner: RwLock<Inner<E>>,
    generation: AtomicU64,
}

/// Owns the serving index and every transition of its state.
pub struct LoadCoordinator<E: IndexEngine = BkTree> {
    shared: Arc<Shared<E>>,
    builder: Arc<Mutex<()>>,
}

impl<E: IndexEngine> LoadCoordinator<E> {
    /// `retain_terms` keeps the parsed term list for the baseline comparator.
    pub fn new(resolver: SourceResolver, retain_terms: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                resolver,
                retain_terms,
                inner: RwLock::new(Inner {
                    state: LoadState::Empty,
                    last_error: None,
                    current: None,
                }),
                generation: AtomicU64::new(0),
            }),
            builder: Arc::new(Mutex::new(())),
        }
    }

    /// Build or restore the index unless one is already serving.
    ///
    /// Returns immediately with `AlreadyLoaded` when ready and not forced,
    /// and with `Loading` when another attempt is in flight. Errors are
    /// returned only by the attempt that ran.
    ///
    /// The attempt runs on its own task, which holds the builder role until
    /// the build ends. Dropping the returned future does not abandon the
    /// build: it still publishes, and no second build starts meanwhile.
    pub async fn request_load(&self, force: bool) -> Result<LoadOutcome, LoadError> {
        if let Some(outcome) = self.shared.ready_outcome(force) {
            return Ok(outcome);
        }

        let Ok(role) = Arc::clone(&self.builder).try_lock_owned() else {
            let term_count = self.term_count();
            tracing::info!(term_count, "Load already in progress");
            telemetry::record_fast_return(LoadStatus::Loading);
            return Ok(LoadOutcome::new(LoadStatus::Loading, term_count));
        };

        // Another attempt may have published while we raced for the role.
        if let Some(outcome) = self.shared.ready_outcome(force) {
            return Ok(outcome);
        }

        self.shared.inner.write().state = LoadState::Loading;
        let shared = Arc::clone(&self.shared);
        let attempt = tokio::spawn(async move {
            let _role = role;
            shared.run_attempt(force).await
        });
        match attempt.await {
            Ok(result) => result,
            Err(e) => Err(LoadError::BuildFailure(format!("load task failed: {}", e))),
        }
    }

    /// Current generation, if any was ever published.
    pub fn published(&self) -> Option<Arc<Published<E>>> {
        self.shared.inner.read().current.clone()
    }

    pub fn view(&self) -> CoordinatorView<E> {
        let inner = self.shared.inner.read();
        CoordinatorView {
            state: inner.state,
            last_error: inner.last_error.clone(),
            current: inner.current.clone(),
        }
    }

    pub fn state(&self) -> LoadState {
        self.shared.inner.read().state
    }

    pub fn is_loading(&self) -> bool {
        self.state() == LoadState::Loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.inner.read().last_error.clone()
    }

    pub fn term_count(&self) -> u64 {
        self.shared.inner.read().current.as_ref().map_or(0, |p| p.term_count)
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.shared.resolver
    }

    pub fn retains_terms(&self) -> bool {
        self.shared.retain_terms
    }

    /// Fuzzy lookup against the published engine.
    pub fn search(&self, query: &str, max_distance: u32) -> Result<Vec<Match>, QueryError> {
        let current = self.published().ok_or(QueryError::NotReady)?;
        Ok(current.engine.search(query, max_distance))
    }

    /// Linear-scan lookup over the retained terms.
    pub fn baseline_search(&self, query: &str, max_distance: u32) -> Result<Vec<Match>, QueryError> {
        let current = self.published().ok_or(QueryError::NotReady)?;
        let baseline = BaselineComparator::new(&current.retained).ok_or(QueryError::BaselineUnavailable)?;
        Ok(baseline.search(query, max_distance))
    }

    /// Closest retained term by linear scan.
    pub fn baseline_nearest(&self, query: &str) -> Result<Match, QueryError> {
        let current = self.published().ok_or(QueryError::NotReady)?;
        let baseline = BaselineComparator::new(&current.retained).ok_or(QueryError::BaselineUnavailable)?;
        Ok(baseline.nearest(query))
    }
}

impl<E: IndexEngine> Shared<E> {
    async fn run_attempt(&self, force: bool) -> Result<LoadOutcome, LoadError> {
        let guard = AttemptGuard { inner: &self.inner, armed: true };

        let attempt_id = Uuid::new_v4().to_string();
        let span = LoadSpan::new(&attempt_id, force);
        let started = Instant::now();
        let result = self
            .resolver
            .resolve::<E>(self.retain_terms)
            .instrument(span.clone())
            .await;
        let elapsed = started.elapsed();
        span.record("elapsed_ms", elapsed.as_millis() as u64);
        span.record_result(&result);

        let outcome = match result {
            Ok(built) => {
                span.record("source", built.source.to_string().as_str());
                let published = self.publish(built);
                span.record("term_count", published.term_count);
                telemetry::record_load_success(published.source.kind, published.term_count, elapsed);
                tracing::info!(
                    parent: &span,
                    generation = published.generation,
                    term_count = published.term_count,
                    source = %published.source,
                    "Index ready"
                );
                Ok(LoadOutcome::new(LoadStatus::Loaded, published.term_count))
            }
            Err(e) => {
                self.fail(&e);
                telemetry::record_load_failure(e.kind(), elapsed);
                tracing::error!(parent: &span, error = %e, kind = e.kind(), "Index load failed");
                Err(e)
            }
        };
        guard.disarm();
        outcome
    }

    fn ready_outcome(&self, force: bool) -> Option<LoadOutcome> {
        if force {
            return None;
        }
        let inner = self.inner.read();
        match (&inner.state, &inner.current) {
            (LoadState::Ready, Some(current)) => {
                telemetry::record_fast_return(LoadStatus::AlreadyLoaded);
                Some(LoadOutcome::new(LoadStatus::AlreadyLoaded, current.term_count))
            }
            _ => None,
        }
    }

    fn publish(&self, built: BuiltIndex<E>) -> Arc<Published<E>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let published = Arc::new(Published {
            generation,
            engine: Arc::new(built.engine),
            term_count: built.term_count,
            metadata: built.metadata,
            retained: Arc::new(built.retained),
            source: built.source,
        });

        let mut inner = self.inner.write();
        inner.current = Some(Arc::clone(&published));
        inner.state = LoadState::Ready;
        inner.last_error = None;
        published
    }

    fn fail(&self, error: &LoadError) {
        let mut inner = self.inner.write();
        inner.state = LoadState::Failed;
        inner.last_error = Some(error.to_string());
    }
}

/// Marks the attempt failed if it ends without reaching a result, e.g. when
/// the resolve panics or the runtime shuts down under the attempt task.
struct AttemptGuard<'a, E> {
    inner: &'a RwLock<Inner<E>>,
    armed: bool,
}

impl<E> AttemptGuard<'_, E> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<E> Drop for AttemptGuard<'_, E> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.inner.write();
            inner.state = LoadState::Failed;
            inner.last_error = Some("load attempt was interrupted".to_string());
            tracing::warn!("Load attempt dropped before completion");
        }
    }
}
