//! Tests for artifact restore, raw-corpus fallback, and scratch cleanup.

mod common;

use std::sync::Arc;

use object_store::memory::InMemory;
use object_store::path::Path as ObjPath;
use object_store::{ObjectStore, PutPayload};
use term_index::artifact::{ArtifactFetcher, ArtifactUnpacker};
use term_index::corpus::CorpusFormat;
use term_index::engine::{BkTree, IndexEngine, Match};
use term_index::index::{LoadStatus, SourceKind, SourcesConfig};
use term_index::{LoadError, QueryError};

use common::{coordinator_for, entries, make_artifact, write_rrf, Members};

// ============================================================================
// Unpacking
// ============================================================================

#[test]
fn test_unpack_restores_engine_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let archive = make_artifact(dir.path(), &["Carditis", "Carditid"], 2, Members::Both);

    let unpacker = ArtifactUnpacker::new(Some(scratch.path().to_path_buf()));
    let (engine, metadata) = unpacker.unpack::<BkTree>(&archive).unwrap();
    assert_eq!(metadata.term_count, 2);
    assert_eq!(metadata.schema_version, 1);
    assert_eq!(
        engine.search("Carditis", 1),
        vec![Match::new("Carditis", 0), Match::new("Carditid", 1)]
    );
    assert_eq!(entries(scratch.path()), 0, "extracted blob must be removed");
}

#[test]
fn test_unpack_missing_blob_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let archive = make_artifact(dir.path(), &["Carditis"], 1, Members::MetadataOnly);

    let unpacker = ArtifactUnpacker::new(Some(scratch.path().to_path_buf()));
    let err = unpacker.unpack::<BkTree>(&archive).unwrap_err();
    assert!(matches!(err, LoadError::ArtifactCorrupt(ref m) if m.contains("bktree.bin")));
}

#[test]
fn test_unpack_missing_metadata_is_corrupt_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let archive = make_artifact(dir.path(), &["Carditis"], 1, Members::BlobOnly);

    let unpacker = ArtifactUnpacker::new(Some(scratch.path().to_path_buf()));
    let err = unpacker.unpack::<BkTree>(&archive).unwrap_err();
    assert!(matches!(err, LoadError::ArtifactCorrupt(ref m) if m.contains("metadata.json")));
    assert_eq!(entries(scratch.path()), 0);
}

#[test]
fn test_unrestorable_blob_is_corrupt_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let archive = make_artifact(dir.path(), &["Carditis", "Carditid", "Nephritis"], 3, Members::TruncatedBlob);

    let unpacker = ArtifactUnpacker::new(Some(scratch.path().to_path_buf()));
    let err = unpacker.unpack::<BkTree>(&archive).unwrap_err();
    assert!(matches!(err, LoadError::ArtifactCorrupt(ref m) if m.contains("restore failed")));
    assert_eq!(entries(scratch.path()), 0, "extracted blob must be removed");
}

// ============================================================================
// Source resolution
// ============================================================================

#[tokio::test]
async fn test_artifact_term_count_comes_from_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let archive = make_artifact(dir.path(), &["Carditis", "Carditid"], 5, Members::Both);
    let sources = SourcesConfig {
        artifact_path: Some(archive.display().to_string()),
        ..Default::default()
    };

    let coordinator = coordinator_for::<BkTree>(sources, ArtifactFetcher::default(), true);
    let outcome = coordinator.request_load(false).await.unwrap();
    assert_eq!(outcome.status, LoadStatus::Loaded);
    assert_eq!(outcome.term_count, 5);

    let published = coordinator.published().unwrap();
    assert_eq!(published.source.kind, SourceKind::Artifact);
    assert!(published.metadata.is_some());
    assert!(published.retained.is_empty());

    // Restoring never reconstructs the raw term list.
    assert_eq!(
        coordinator.baseline_search("Carditis", 1),
        Err(QueryError::BaselineUnavailable)
    );
    assert_eq!(coordinator.search("Carditid", 0).unwrap(), vec![Match::new("Carditid", 0)]);
}

#[tokio::test]
async fn test_missing_blob_falls_back_to_raw_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let archive = make_artifact(dir.path(), &["A", "B", "C"], 3, Members::MetadataOnly);
    let corpus = dir.path().join("MRCONSO.RRF");
    write_rrf(&corpus, &["Carditis", "Carditid"]);

    let sources = SourcesConfig {
        corpus_path: Some(corpus.display().to_string()),
        corpus_format: CorpusFormat::DelimitedRecords,
        artifact_path: Some(archive.display().to_string()),
        ..Default::default()
    };
    let coordinator = coordinator_for::<BkTree>(sources, ArtifactFetcher::default(), true);
    let outcome = coordinator.request_load(false).await.unwrap();

    assert_eq!(outcome.term_count, 2, "count must come from the raw parse");
    let published = coordinator.published().unwrap();
    assert_eq!(published.source.kind, SourceKind::Raw);
    assert!(published.metadata.is_none());
    assert_eq!(
        coordinator.baseline_nearest("Carditiz").unwrap(),
        Match::new("Carditis", 1)
    );
}

#[tokio::test]
async fn test_corrupt_artifact_without_fallback_fails() {
    let dir = tempfile::tempdir().unwrap();
    let archive = make_artifact(dir.path(), &["A"], 1, Members::MetadataOnly);
    let sources = SourcesConfig {
        artifact_path: Some(archive.display().to_string()),
        ..Default::default()
    };

    let coordinator = coordinator_for::<BkTree>(sources, ArtifactFetcher::default(), false);
    let err = coordinator.request_load(false).await.unwrap_err();
    assert!(matches!(err, LoadError::ArtifactCorrupt(_)));
    assert!(coordinator.published().is_none());
}

// ============================================================================
// Remote artifacts and scratch cleanup
// ============================================================================

async fn remote_fixture(members: Members) -> (tempfile::TempDir, Arc<InMemory>) {
    let dir = tempfile::tempdir().unwrap();
    let archive = make_artifact(dir.path(), &["Carditis", "Carditid"], 2, members);
    let store = Arc::new(InMemory::new());
    let bytes = std::fs::read(&archive).unwrap();
    store
        .put(&ObjPath::from("artifacts/index.tar.gz"), PutPayload::from(bytes))
        .await
        .unwrap();
    (dir, store)
}

#[tokio::test]
async fn test_remote_artifact_leaves_no_scratch_files_on_success() {
    let (_dir, store) = remote_fixture(Members::Both).await;
    let scratch = tempfile::tempdir().unwrap();
    let fetcher = ArtifactFetcher::new(Some(scratch.path().to_path_buf())).with_store("mem://bucket", store);
    let sources = SourcesConfig {
        artifact_path: Some("mem://bucket/artifacts/index.tar.gz".into()),
        scratch_dir: Some(scratch.path().to_path_buf()),
        ..Default::default()
    };

    let coordinator = coordinator_for::<BkTree>(sources, fetcher, false);
    let outcome = coordinator.request_load(false).await.unwrap();
    assert_eq!(outcome.term_count, 2);
    assert_eq!(
        coordinator.published().unwrap().artifact_path().as_deref(),
        Some("mem://bucket/artifacts/index.tar.gz")
    );
    assert_eq!(entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_remote_artifact_leaves_no_scratch_files_on_failure() {
    let (_dir, store) = remote_fixture(Members::BlobOnly).await;
    let scratch = tempfile::tempdir().unwrap();
    let fetcher = ArtifactFetcher::new(Some(scratch.path().to_path_buf())).with_store("mem://bucket", store);
    let sources = SourcesConfig {
        artifact_path: Some("mem://bucket/artifacts/index.tar.gz".into()),
        scratch_dir: Some(scratch.path().to_path_buf()),
        ..Default::default()
    };

    let coordinator = coordinator_for::<BkTree>(sources, fetcher, false);
    assert!(coordinator.request_load(false).await.is_err());
    assert_eq!(entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_missing_remote_object_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("terms.txt");
    common::write_terms(&corpus, &["Carditis"]);

    let fetcher = ArtifactFetcher::new(Some(scratch.path().to_path_buf()))
        .with_store("mem://bucket", Arc::new(InMemory::new()));
    let sources = SourcesConfig {
        corpus_path: Some(corpus.display().to_string()),
        corpus_format: CorpusFormat::LineList,
        artifact_path: Some("mem://bucket/missing.tar.gz".into()),
        scratch_dir: Some(scratch.path().to_path_buf()),
        ..Default::default()
    };

    let coordinator = coordinator_for::<BkTree>(sources, fetcher, false);
    let outcome = coordinator.request_load(false).await.unwrap();
    assert_eq!(outcome.term_count, 1);
    assert_eq!(coordinator.published().unwrap().source.kind, SourceKind::Raw);
    assert_eq!(entries(scratch.path()), 0);
}
