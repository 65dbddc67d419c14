//! Prebuilt index artifacts.
//!
//! An artifact is a gzip tar holding a serialized engine (`bktree.bin`) and
//! a versioned metadata document (`metadata.json`). Artifacts let a service
//! restore a ready index instead of rebuilding it from the raw corpus.

mod fetch;
mod metadata;
mod package;
mod unpack;

pub use fetch::{select_scratch_dir, ArtifactFetcher, DynStore, FetchedFile, Location, MEMORY_SCRATCH_DIR};
pub use metadata::{ArtifactMetadata, ARTIFACT_TYPE, BLOB_MEMBER, METADATA_MEMBER, SCHEMA_VERSION};
pub use package::{build_artifact, run_job, write_archive, JobSummary, PackageReport, PackageRequest};
pub use unpack::{ArtifactUnpacker, CHUNK_SIZE, MAX_METADATA_BYTES, PROGRESS_INTERVAL_BYTES};
