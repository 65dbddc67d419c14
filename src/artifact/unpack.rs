//! Extraction of packaged index artifacts.
//!
//! The archive is a gzip tar with exactly two members, `metadata.json` and
//! `bktree.bin`. The blob is streamed to a scratch file in fixed-size chunks
//! so peak memory does not depend on its size; the scratch file is removed
//! on every exit path.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use flate2::read::GzDecoder;
use tempfile::TempPath;

use super::fetch::select_scratch_dir;
use super::metadata::{ArtifactMetadata, BLOB_MEMBER, METADATA_MEMBER};
use crate::engine::IndexEngine;
use crate::error::LoadError;

/// Bytes copied per read while extracting the blob.
pub const CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Extraction progress is logged every this many bytes.
pub const PROGRESS_INTERVAL_BYTES: u64 = 256 * 1024 * 1024;

/// Upper bound on the metadata document.
pub const MAX_METADATA_BYTES: u64 = 1024 * 1024;

/// Restores engines from local artifact archives.
#[derive(Debug, Clone, Default)]
pub struct ArtifactUnpacker {
    scratch_dir: Option<PathBuf>,
}

impl ArtifactUnpacker {
    pub fn new(scratch_dir: Option<PathBuf>) -> Self {
        Self { scratch_dir }
    }

    /// Extract `archive` and restore the engine it contains.
    ///
    /// Blocking; run it off the async executor.
    pub fn unpack<E: IndexEngine>(&self, archive: &Path) -> Result<(E, ArtifactMetadata), LoadError> {
        let started = Instant::now();
        let file = File::open(archive)
            .map_err(|e| LoadError::corrupt(&format!("cannot open {}", archive.display()), e))?;
        let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

        let mut metadata: Option<ArtifactMetadata> = None;
        let mut blob: Option<TempPath> = None;

        let entries = tar.entries().map_err(|e| LoadError::corrupt("unreadable archive", e))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| LoadError::corrupt("unreadable archive entry", e))?;
            let name = member_name(&entry)?;
            match name.as_str() {
                METADATA_MEMBER => {
                    if metadata.is_some() {
                        return Err(LoadError::ArtifactCorrupt("duplicate metadata.json".into()));
                    }
                    metadata = Some(read_metadata(&mut entry)?);
                }
                BLOB_MEMBER => {
                    if blob.is_some() {
                        return Err(LoadError::ArtifactCorrupt("duplicate bktree.bin".into()));
                    }
                    blob = Some(self.extract_blob(&mut entry)?);
                }
                other => {
                    tracing::warn!(member = other, "Skipping unexpected archive member");
                }
            }
        }

        let metadata = metadata
            .ok_or_else(|| LoadError::ArtifactCorrupt(format!("archive is missing {}", METADATA_MEMBER)))?;
        let blob = blob
            .ok_or_else(|| LoadError::ArtifactCorrupt(format!("archive is missing {}", BLOB_MEMBER)))?;

        let restore_started = Instant::now();
        let engine = E::restore(&blob).map_err(|e| LoadError::corrupt("restore failed", e))?;
        tracing::info!(
            term_count = metadata.term_count,
            nodes = engine.len(),
            restore_ms = restore_started.elapsed().as_millis() as u64,
            total_ms = started.elapsed().as_millis() as u64,
            "Restored index from artifact"
        );
        Ok((engine, metadata))
    }

    fn extract_blob<R: Read>(&self, entry: &mut R) -> Result<TempPath, LoadError> {
        let scratch = select_scratch_dir(self.scratch_dir.as_deref());
        let temp = tempfile::Builder::new()
            .prefix("term_index_blob_")
            .suffix(".bin")
            .tempfile_in(&scratch)
            .map_err(|e| LoadError::corrupt("cannot create scratch file", e))?;
        let (mut file, path) = temp.into_parts();
        tracing::info!(dest = %path.display(), "Extracting index blob");

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written: u64 = 0;
        let mut next_report = PROGRESS_INTERVAL_BYTES;
        loop {
            let n = match entry.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(LoadError::corrupt("blob extraction failed", e)),
            };
            file.write_all(&buf[..n])
                .map_err(|e| LoadError::corrupt("blob extraction failed", e))?;
            written += n as u64;
            if written >= next_report {
                tracing::info!(mib = written / (1024 * 1024), "Extracting index blob");
                next_report += PROGRESS_INTERVAL_BYTES;
            }
        }
        file.flush().map_err(|e| LoadError::corrupt("blob extraction failed", e))?;

        tracing::info!(bytes = written, "Index blob extracted");
        Ok(path)
    }
}

fn member_name<R: Read>(entry: &tar::Entry<'_, R>) -> Result<String, LoadError> {
    let path = entry
        .path()
        .map_err(|e| LoadError::corrupt("invalid member name", e))?;
    let name = path.to_string_lossy();
    Ok(name.trim_start_matches("./").to_string())
}

fn read_metadata<R: Read>(entry: &mut R) -> Result<ArtifactMetadata, LoadError> {
    let mut json = String::new();
    entry
        .take(MAX_METADATA_BYTES + 1)
        .read_to_string(&mut json)
        .map_err(|e| LoadError::corrupt("unreadable metadata.json", e))?;
    if json.len() as u64 > MAX_METADATA_BYTES {
        return Err(LoadError::ArtifactCorrupt(format!(
            "metadata.json exceeds {} bytes",
            MAX_METADATA_BYTES
        )));
    }
    ArtifactMetadata::from_json(&json)
}
