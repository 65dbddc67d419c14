//! term-index
//!
//! Fuzzy term lookup over a large corpus, backed by a BK-tree that is
//! either restored from a prebuilt artifact or built from the raw corpus.
//!
//! # Components
//!
//! - [`corpus`]: lazy term extraction from delimited records or line lists
//! - [`artifact`]: fetch, unpack, and package `tar.gz` index artifacts
//! - [`engine`]: the matching engine capability set and its BK-tree
//! - [`index`]: source resolution and single-flight load coordination
//! - [`lifecycle`]: load trigger, health snapshots, deferred shutdown

pub mod artifact;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod health;
pub mod index;
pub mod lifecycle;
pub mod shutdown;
pub mod telemetry;

use std::sync::Arc;

use artifact::ArtifactFetcher;
use config::EnvConfig;
use engine::{BkTree, IndexEngine};
use index::{LoadCoordinator, SourceResolver};
use lifecycle::LifecycleManager;

pub use error::{LoadError, QueryError};

/// A wired service instance.
pub struct Service<E: IndexEngine = BkTree> {
    pub config: EnvConfig,
    pub fetcher: Arc<ArtifactFetcher>,
    pub lifecycle: Arc<LifecycleManager<E>>,
}

impl<E: IndexEngine> Service<E> {
    /// Create a service that resolves remote references from the URL.
    pub fn new(config: EnvConfig) -> Self {
        let fetcher = ArtifactFetcher::new(config.sources.scratch_dir.clone());
        Self::with_fetcher(config, fetcher)
    }

    /// Create a service with a preconfigured fetcher, e.g. one with
    /// registered object stores.
    pub fn with_fetcher(config: EnvConfig, fetcher: ArtifactFetcher) -> Self {
        let fetcher = Arc::new(fetcher);
        let resolver = SourceResolver::new(config.sources.clone(), Arc::clone(&fetcher));
        let coordinator = Arc::new(LoadCoordinator::new(resolver, config.enable_baseline));
        let lifecycle = Arc::new(LifecycleManager::new(
            coordinator,
            config.enable_baseline,
            config.shutdown_after,
        ));
        Self {
            config,
            fetcher,
            lifecycle,
        }
    }
}
