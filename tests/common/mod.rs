//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use term_index::artifact::{write_archive, ArtifactFetcher, ArtifactMetadata, BLOB_MEMBER, METADATA_MEMBER};
use term_index::corpus::CorpusFormat;
use term_index::engine::{BkTree, EngineError, IndexEngine, Match};
use term_index::index::{LoadCoordinator, LoadState, SourceResolver, SourcesConfig};

/// One MRCONSO-style row with `term` in the string column.
pub fn rrf_row(n: usize, term: &str) -> String {
    format!("C{n:07}|ENG|P|L{n:07}|PF|S{n:07}|Y|A{n:07}||||SNOMEDCT_US|PT|{n}|{term}|0|N|256|")
}

pub fn write_rrf(path: &Path, terms: &[&str]) {
    let body: String = terms
        .iter()
        .enumerate()
        .map(|(n, term)| rrf_row(n, term) + "\n")
        .collect();
    std::fs::write(path, body).unwrap();
}

pub fn write_terms(path: &Path, terms: &[&str]) {
    std::fs::write(path, terms.join("\n") + "\n").unwrap();
}

/// Which members to put in a test archive.
#[derive(Clone, Copy)]
pub enum Members {
    Both,
    MetadataOnly,
    BlobOnly,
    /// Both members, with the blob cut short so restoring it fails.
    TruncatedBlob,
}

/// Build an artifact archive for `terms` whose metadata declares
/// `declared_count` terms.
pub fn make_artifact(dir: &Path, terms: &[&str], declared_count: u64, members: Members) -> PathBuf {
    let blob = dir.join("bktree.bin");
    BkTree::from_terms(terms.iter().copied()).save(&blob).unwrap();
    let metadata = ArtifactMetadata::new("test", CorpusFormat::LineList, None, declared_count);
    let archive = dir.join("index.tar.gz");

    match members {
        Members::Both => write_archive(&blob, &metadata, &archive).unwrap(),
        Members::TruncatedBlob => {
            let bytes = std::fs::read(&blob).unwrap();
            std::fs::write(&blob, &bytes[..bytes.len() / 2]).unwrap();
            write_archive(&blob, &metadata, &archive).unwrap();
        }
        Members::MetadataOnly | Members::BlobOnly => {
            let encoder = GzEncoder::new(File::create(&archive).unwrap(), Compression::default());
            let mut builder = tar::Builder::new(encoder);
            if matches!(members, Members::BlobOnly) {
                builder.append_path_with_name(&blob, BLOB_MEMBER).unwrap();
            } else {
                let json = metadata.to_json().unwrap();
                let mut header = tar::Header::new_gnu();
                header.set_size(json.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append_data(&mut header, METADATA_MEMBER, json.as_bytes()).unwrap();
            }
            builder.into_inner().unwrap().finish().unwrap();
        }
    }
    std::fs::remove_file(&blob).unwrap();
    archive
}

pub fn coordinator_for<E: IndexEngine>(
    sources: SourcesConfig,
    fetcher: ArtifactFetcher,
    retain_terms: bool,
) -> Arc<LoadCoordinator<E>> {
    let resolver = SourceResolver::new(sources, Arc::new(fetcher));
    Arc::new(LoadCoordinator::new(resolver, retain_terms))
}

pub fn line_list(path: &Path) -> SourcesConfig {
    SourcesConfig {
        corpus_path: Some(path.display().to_string()),
        corpus_format: CorpusFormat::LineList,
        ..Default::default()
    }
}

/// Number of entries in `dir`.
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

// ============================================================================
// Gated engine: inserts block until the test opens the gate
// ============================================================================

static GATE: Mutex<bool> = Mutex::new(false);
static GATE_CHANGED: Condvar = Condvar::new();

pub fn close_gate() {
    *GATE.lock().unwrap() = false;
}

pub fn open_gate() {
    *GATE.lock().unwrap() = true;
    GATE_CHANGED.notify_all();
}

#[derive(Default)]
pub struct GatedEngine {
    inner: BkTree,
}

impl IndexEngine for GatedEngine {
    fn insert(&mut self, term: &str) {
        let mut open = GATE.lock().unwrap();
        while !*open {
            open = GATE_CHANGED.wait(open).unwrap();
        }
        drop(open);
        self.inner.insert(term);
    }

    fn search(&self, query: &str, max_distance: u32) -> Vec<Match> {
        self.inner.search(query, max_distance)
    }

    fn save(&self, path: &Path) -> Result<(), EngineError> {
        self.inner.save(path)
    }

    fn restore(path: &Path) -> Result<Self, EngineError> {
        Ok(Self { inner: BkTree::restore(path)? })
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

pub async fn wait_for_state<E: IndexEngine>(
    coordinator: &LoadCoordinator<E>,
    state: LoadState,
) {
    for _ in 0..500 {
        if coordinator.state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("coordinator never reached {:?}", state);
}
