//! Source selection: prebuilt artifact first, raw corpus as fallback.

use std::path::PathBuf;
use std::sync::Arc;

use crate::artifact::{ArtifactFetcher, ArtifactMetadata, ArtifactUnpacker, Location};
use crate::corpus::CorpusFormat;
use crate::engine::IndexEngine;
use crate::error::LoadError;
use crate::telemetry;

use super::build::build_from_path;
use super::source::CorpusSource;

/// Where the service may take its index from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcesConfig {
    /// Raw corpus file or remote reference.
    pub corpus_path: Option<String>,
    pub corpus_format: CorpusFormat,
    /// Prebuilt artifact archive, tried before the raw corpus.
    pub artifact_path: Option<String>,
    /// Cap on parsed terms for raw builds. `None` or zero means no cap.
    pub max_terms: Option<usize>,
    /// Scratch directory for downloads and extracted blobs.
    pub scratch_dir: Option<PathBuf>,
}

impl SourcesConfig {
    pub fn has_raw(&self) -> bool {
        non_empty(&self.corpus_path).is_some()
    }

    pub fn has_artifact(&self) -> bool {
        non_empty(&self.artifact_path).is_some()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// An engine ready to publish, with everything that belongs to it.
#[derive(Debug)]
pub struct BuiltIndex<E> {
    pub engine: E,
    pub term_count: u64,
    pub metadata: Option<ArtifactMetadata>,
    pub retained: Vec<String>,
    pub source: CorpusSource,
}

/// Picks a source for each load attempt and produces an engine from it.
pub struct SourceResolver {
    config: SourcesConfig,
    fetcher: Arc<ArtifactFetcher>,
    unpacker: ArtifactUnpacker,
}

impl SourceResolver {
    pub fn new(config: SourcesConfig, fetcher: Arc<ArtifactFetcher>) -> Self {
        let unpacker = ArtifactUnpacker::new(config.scratch_dir.clone());
        Self { config, fetcher, unpacker }
    }

    pub fn config(&self) -> &SourcesConfig {
        &self.config
    }

    /// Produce an engine from the first source that works.
    ///
    /// Artifact errors (transfer failures and corrupt or unrestorable
    /// archives) are absorbed when a raw corpus is configured. Any other
    /// error from the artifact path, such as a crashed restore task, is
    /// returned as is. The raw path's error is always returned.
    pub async fn resolve<E: IndexEngine>(&self, retain_terms: bool) -> Result<BuiltIndex<E>, LoadError> {
        let artifact = non_empty(&self.config.artifact_path);
        let raw = non_empty(&self.config.corpus_path);

        if let Some(reference) = artifact {
            match self.restore_artifact::<E>(reference).await {
                Ok(built) => return Ok(built),
                Err(e) if raw.is_some() && e.is_artifact_error() => {
                    tracing::warn!(
                        artifact = reference,
                        error = %e,
                        kind = e.kind(),
                        "Artifact load failed, falling back to raw corpus"
                    );
                    telemetry::record_artifact_fallback();
                }
                Err(e) => return Err(e),
            }
        }

        match raw {
            Some(reference) => self.build_raw::<E>(reference, retain_terms).await,
            None => Err(LoadError::NotConfigured),
        }
    }

    async fn restore_artifact<E: IndexEngine>(&self, reference: &str) -> Result<BuiltIndex<E>, LoadError> {
        let location = Location::parse(reference)?;
        let source = CorpusSource::artifact(location.clone(), self.config.corpus_format);
        let fetched = self.fetcher.fetch(&location).await?;
        let unpacker = self.unpacker.clone();

        let (engine, metadata) = tokio::task::spawn_blocking(move || {
            let result = unpacker.unpack::<E>(fetched.path());
            drop(fetched);
            result
        })
        .await
        .map_err(|e| LoadError::BuildFailure(format!("artifact restore task failed: {}", e)))??;

        Ok(BuiltIndex {
            engine,
            term_count: metadata.term_count,
            metadata: Some(metadata),
            retained: Vec::new(),
            source,
        })
    }

    async fn build_raw<E: IndexEngine>(
        &self,
        reference: &str,
        retain_terms: bool,
    ) -> Result<BuiltIndex<E>, LoadError> {
        let location = Location::parse(reference)?;
        if let Location::Local(path) = &location {
            if !path.exists() {
                return Err(LoadError::SourceNotFound(path.display().to_string()));
            }
        }
        let format = self.config.corpus_format;
        let source = CorpusSource::raw(location.clone(), format);
        let fetched = self.fetcher.fetch(&location).await?;
        let max_terms = self.config.max_terms;

        let built = tokio::task::spawn_blocking(move || {
            let result = build_from_path::<E>(fetched.path(), format, max_terms, retain_terms);
            drop(fetched);
            result
        })
        .await
        .map_err(|e| LoadError::BuildFailure(format!("corpus build task failed: {}", e)))??;

        Ok(BuiltIndex {
            engine: built.engine,
            term_count: built.stats.terms,
            metadata: None,
            retained: built.retained,
            source,
        })
    }
}
