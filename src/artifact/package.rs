//! Precompute job: build an index from a raw corpus and publish it as an
//! artifact archive.
//!
//! Steps: fetch the corpus, parse and build, serialize the engine, write
//! `metadata.json`, pack both into a gzip tar, store the archive at its
//! destination. All intermediate files live in a scratch work directory
//! that is removed when the job ends.

use std::fs::File;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Instant;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;

use super::fetch::{select_scratch_dir, ArtifactFetcher, Location};
use super::metadata::{ArtifactMetadata, BLOB_MEMBER, METADATA_MEMBER};
use crate::corpus::{CorpusFormat, ParseStats};
use crate::engine::IndexEngine;
use crate::error::LoadError;
use crate::index::build_from_path;

const ARCHIVE_NAME: &str = "term_index.tar.gz";

/// Inputs for one precompute run.
#[derive(Debug, Clone)]
pub struct PackageRequest {
    pub source: String,
    pub source_format: CorpusFormat,
    pub destination: String,
    pub max_terms: Option<usize>,
}

/// Result of a successful precompute run.
#[derive(Debug, Clone)]
pub struct PackageReport {
    pub metadata: ArtifactMetadata,
    pub stats: ParseStats,
    pub bytes: u64,
}

/// One-line JSON summary emitted by the `build` command.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job: &'static str,
    pub status: &'static str,
    pub source: String,
    pub artifact: String,
    pub max_terms: Option<usize>,
    pub term_count: Option<u64>,
    pub skipped: Option<u64>,
    pub truncated: Option<bool>,
    pub bytes: Option<u64>,
    pub error: Option<String>,
    pub elapsed_seconds: f64,
}

impl JobSummary {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Pack a serialized engine and its metadata into a gzip tar at `archive`.
pub fn write_archive(blob: &Path, metadata: &ArtifactMetadata, archive: &Path) -> io::Result<()> {
    let json = metadata
        .to_json()
        .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;

    let encoder = GzEncoder::new(File::create(archive)?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_path_with_name(blob, BLOB_MEMBER)?;

    let mut header = tar::Header::new_gnu();
    header.set_size(json.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(metadata.created_at.timestamp().max(0) as u64);
    header.set_cksum();
    builder.append_data(&mut header, METADATA_MEMBER, json.as_bytes())?;

    builder.into_inner()?.finish()?;
    Ok(())
}

/// Build and publish an artifact.
pub async fn build_artifact<E: IndexEngine>(
    fetcher: &ArtifactFetcher,
    request: &PackageRequest,
) -> Result<PackageReport, LoadError> {
    let source = Location::parse(&request.source)?;
    let destination = Location::parse(&request.destination)?;
    if let Location::Local(path) = &source {
        if !path.exists() {
            return Err(LoadError::SourceNotFound(path.display().to_string()));
        }
    }

    let scratch = select_scratch_dir(fetcher.scratch_dir());
    let work_dir = tempfile::Builder::new()
        .prefix("term_index_job_")
        .tempdir_in(&scratch)?;
    let fetched = fetcher.fetch(&source).await?;

    let work_path: PathBuf = work_dir.path().to_path_buf();
    let source_label = request.source.clone();
    let format = request.source_format;
    let max_terms = request.max_terms.filter(|&cap| cap > 0);

    let (archive, metadata, stats) = tokio::task::spawn_blocking(move || {
        let built = build_from_path::<E>(fetched.path(), format, max_terms, false)?;
        drop(fetched);

        let blob = work_path.join(BLOB_MEMBER);
        tracing::info!(dest = %blob.display(), "Serializing index");
        built
            .engine
            .save(&blob)
            .map_err(|e| LoadError::BuildFailure(format!("cannot serialize index: {}", e)))?;

        let metadata = ArtifactMetadata::new(
            source_label,
            format,
            max_terms.map(|cap| cap as u64),
            built.stats.terms,
        );
        let archive = work_path.join(ARCHIVE_NAME);
        tracing::info!(archive = %archive.display(), "Creating artifact archive");
        write_archive(&blob, &metadata, &archive)?;
        Ok::<_, LoadError>((archive, metadata, built.stats))
    })
    .await
    .map_err(|e| LoadError::BuildFailure(format!("background build task failed: {}", e)))??;

    let bytes = fetcher.store(&archive, &destination).await?;
    tracing::info!(
        dest = %destination,
        bytes,
        term_count = metadata.term_count,
        "Artifact published"
    );
    drop(work_dir);

    Ok(PackageReport { metadata, stats, bytes })
}

/// Run the precompute job and fold the outcome into a summary.
pub async fn run_job<E: IndexEngine>(fetcher: &ArtifactFetcher, request: &PackageRequest) -> JobSummary {
    let started = Instant::now();
    let mut summary = JobSummary {
        job: "precompute-index",
        status: "success",
        source: request.source.clone(),
        artifact: request.destination.clone(),
        max_terms: request.max_terms.filter(|&cap| cap > 0),
        term_count: None,
        skipped: None,
        truncated: None,
        bytes: None,
        error: None,
        elapsed_seconds: 0.0,
    };

    match build_artifact::<E>(fetcher, request).await {
        Ok(report) => {
            summary.term_count = Some(report.metadata.term_count);
            summary.skipped = Some(report.stats.skipped);
            summary.truncated = Some(report.stats.truncated);
            summary.bytes = Some(report.bytes);
        }
        Err(e) => {
            tracing::error!(error = %e, "Index precomputation failed");
            summary.status = "error";
            summary.error = Some(e.to_string());
        }
    }

    summary.elapsed_seconds = (started.elapsed().as_secs_f64() * 1000.0).round() / 1000.0;
    summary
}
