//! Materializes corpus and artifact locations as local files.
//!
//! Local paths pass through untouched. Remote references
//! (`scheme://container/key`) are streamed into a scratch file that is
//! deleted when the returned [`FetchedFile`] is dropped.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::TryStreamExt;
use object_store::path::Path as ObjPath;
use object_store::{ObjectStore, WriteMultipart};
use tempfile::TempPath;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;

use crate::error::LoadError;

pub type DynStore = Arc<dyn ObjectStore>;

/// Memory-backed scratch directory, preferred when writable.
pub const MEMORY_SCRATCH_DIR: &str = "/dev/shm";

const UPLOAD_CHUNK_BYTES: usize = 8 * 1024 * 1024;
const UPLOAD_CONCURRENCY: usize = 4;

/// Where a corpus or artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(Url),
}

impl Location {
    /// Parse a local path, `file://` URL, or `scheme://container/key`.
    pub fn parse(raw: &str) -> Result<Self, LoadError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(LoadError::SourceNotFound("empty location".into()));
        }
        let Some((scheme, rest)) = raw.split_once("://") else {
            return Ok(Self::Local(PathBuf::from(raw)));
        };
        if scheme.eq_ignore_ascii_case("file") {
            return Ok(Self::Local(PathBuf::from(rest)));
        }

        let url = Url::parse(raw).map_err(|e| LoadError::transfer(raw, e))?;
        let container = url.host_str().unwrap_or_default();
        let key = url.path().trim_start_matches('/');
        if container.is_empty() || key.is_empty() {
            return Err(LoadError::transfer(raw, "expected scheme://container/key"));
        }
        Ok(Self::Remote(url))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// A location materialized on local storage.
#[derive(Debug)]
pub struct FetchedFile {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl FetchedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when this file is a scratch download removed on drop.
    pub fn needs_cleanup(&self) -> bool {
        self.temp.is_some()
    }
}

/// Pick the scratch directory for downloads and extracted blobs.
///
/// An explicit directory is created if needed and used when writable.
/// Otherwise the memory-backed directory is tried before the system temp
/// directory. Each candidate is probed by creating a file in it.
pub fn select_scratch_dir(preferred: Option<&Path>) -> PathBuf {
    let candidates: Vec<PathBuf> = match preferred {
        Some(dir) => {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "Cannot create scratch directory");
            }
            vec![dir.to_path_buf(), std::env::temp_dir()]
        }
        None => vec![PathBuf::from(MEMORY_SCRATCH_DIR), std::env::temp_dir()],
    };

    candidates
        .into_iter()
        .find(|dir| is_writable(dir))
        .unwrap_or_else(std::env::temp_dir)
}

fn is_writable(dir: &Path) -> bool {
    tempfile::Builder::new()
        .prefix(".term_index_probe_")
        .tempfile_in(dir)
        .is_ok()
}

/// Resolves locations to local files and stores files at locations.
pub struct ArtifactFetcher {
    scratch_dir: Option<PathBuf>,
    stores: HashMap<String, DynStore>,
}

impl ArtifactFetcher {
    pub fn new(scratch_dir: Option<PathBuf>) -> Self {
        Self { scratch_dir, stores: HashMap::new() }
    }

    /// Serve `scheme://container` from `store` instead of building a client
    /// from the URL.
    pub fn with_store(mut self, scheme_and_container: &str, store: DynStore) -> Self {
        self.stores
            .insert(scheme_and_container.trim_end_matches('/').to_string(), store);
        self
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    /// Make `location` available as a local file.
    pub async fn fetch(&self, location: &Location) -> Result<FetchedFile, LoadError> {
        match location {
            Location::Local(path) => {
                tracing::info!(path = %path.display(), "Using local file");
                Ok(FetchedFile { path: path.clone(), temp: None })
            }
            Location::Remote(url) => self.download(url).await,
        }
    }

    async fn download(&self, url: &Url) -> Result<FetchedFile, LoadError> {
        let (store, key) = self.resolve_store(url)?;
        let scratch = select_scratch_dir(self.scratch_dir.as_deref());
        let temp = tempfile::Builder::new()
            .prefix("term_index_fetch_")
            .tempfile_in(&scratch)
            .map_err(|e| LoadError::transfer(url, e))?;
        let (file, temp_path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);

        tracing::info!(
            source = %url,
            dest = %temp_path.display(),
            "Downloading remote object"
        );
        let started = Instant::now();
        let mut stream = store
            .get(&key)
            .await
            .map_err(|e| LoadError::transfer(url, e))?
            .into_stream();

        let mut written: u64 = 0;
        while let Some(chunk) = stream.try_next().await.map_err(|e| LoadError::transfer(url, e))? {
            file.write_all(&chunk).await.map_err(|e| LoadError::transfer(url, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| LoadError::transfer(url, e))?;
        drop(file);

        tracing::info!(
            source = %url,
            bytes = written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Download complete"
        );
        Ok(FetchedFile { path: temp_path.to_path_buf(), temp: Some(temp_path) })
    }

    /// Copy a local file to `destination`. Returns the number of bytes.
    pub async fn store(&self, source: &Path, destination: &Location) -> Result<u64, LoadError> {
        match destination {
            Location::Local(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                Ok(tokio::fs::copy(source, path).await?)
            }
            Location::Remote(url) => self.upload(source, url).await,
        }
    }

    async fn upload(&self, source: &Path, url: &Url) -> Result<u64, LoadError> {
        let (store, key) = self.resolve_store(url)?;
        let upload = store
            .put_multipart(&key)
            .await
            .map_err(|e| LoadError::transfer(url, e))?;
        let mut writer = WriteMultipart::new(upload);

        let mut file = tokio::fs::File::open(source).await?;
        let mut buf = vec![0u8; UPLOAD_CHUNK_BYTES];
        let mut sent: u64 = 0;
        loop {
            let n = match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    let _ = writer.abort().await;
                    return Err(LoadError::Io(e));
                }
            };
            writer
                .wait_for_capacity(UPLOAD_CONCURRENCY)
                .await
                .map_err(|e| LoadError::transfer(url, e))?;
            writer.write(&buf[..n]);
            sent += n as u64;
        }
        writer.finish().await.map_err(|e| LoadError::transfer(url, e))?;

        tracing::info!(dest = %url, bytes = sent, "Upload complete");
        Ok(sent)
    }

    fn resolve_store(&self, url: &Url) -> Result<(DynStore, ObjPath), LoadError> {
        let container = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
        if let Some(store) = self.stores.get(&container) {
            let key = ObjPath::from_url_path(url.path()).map_err(|e| LoadError::transfer(url, e))?;
            return Ok((store.clone(), key));
        }

        // Builders pick out the keys they recognize (aws_*, google_*, ...).
        let options = std::env::vars_os().filter_map(|(k, v)| {
            Some((k.into_string().ok()?.to_ascii_lowercase(), v.into_string().ok()?))
        });
        let (store, key) =
            object_store::parse_url_opts(url, options).map_err(|e| LoadError::transfer(url, e))?;
        Ok((Arc::from(store), key))
    }
}

impl Default for ArtifactFetcher {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use object_store::PutPayload;

    #[test]
    fn test_parse_local_and_file_urls() {
        assert_eq!(
            Location::parse("data/MRCONSO.RRF").unwrap(),
            Location::Local(PathBuf::from("data/MRCONSO.RRF"))
        );
        assert_eq!(
            Location::parse("file:///srv/terms.txt").unwrap(),
            Location::Local(PathBuf::from("/srv/terms.txt"))
        );
    }

    #[test]
    fn test_parse_remote_requires_container_and_key() {
        assert!(Location::parse("gs://umls-bucket/artifacts/index.tar.gz").unwrap().is_remote());
        assert!(Location::parse("gs://umls-bucket").is_err());
        assert!(matches!(Location::parse("  "), Err(LoadError::SourceNotFound(_))));
    }

    #[test]
    fn test_scratch_prefers_explicit_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("scratch");
        assert_eq!(select_scratch_dir(Some(&nested)), nested);
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_local_fetch_needs_no_cleanup() {
        let fetcher = ArtifactFetcher::default();
        let fetched = fetcher.fetch(&Location::parse("/tmp/terms.txt").unwrap()).await.unwrap();
        assert!(!fetched.needs_cleanup());
        assert_eq!(fetched.path(), Path::new("/tmp/terms.txt"));
    }

    #[tokio::test]
    async fn test_remote_fetch_removed_on_drop() {
        let scratch = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemory::new());
        store
            .put(&ObjPath::from("corpus/terms.txt"), PutPayload::from_static(b"Alpha\nBeta\n"))
            .await
            .unwrap();
        let fetcher = ArtifactFetcher::new(Some(scratch.path().to_path_buf()))
            .with_store("mem://bucket", store);

        let location = Location::parse("mem://bucket/corpus/terms.txt").unwrap();
        let fetched = fetcher.fetch(&location).await.unwrap();
        assert!(fetched.needs_cleanup());
        assert!(fetched.path().starts_with(scratch.path()));
        assert_eq!(std::fs::read(fetched.path()).unwrap(), b"Alpha\nBeta\n");

        let path = fetched.path().to_path_buf();
        drop(fetched);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_remote_object_leaves_no_scratch_file() {
        let scratch = tempfile::tempdir().unwrap();
        let fetcher = ArtifactFetcher::new(Some(scratch.path().to_path_buf()))
            .with_store("mem://bucket", Arc::new(InMemory::new()));

        let location = Location::parse("mem://bucket/missing.tar.gz").unwrap();
        let err = fetcher.fetch(&location).await.unwrap_err();
        assert!(matches!(err, LoadError::TransferFailure { .. }));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_store_uploads_to_registered_store() {
        let scratch = tempfile::tempdir().unwrap();
        let source = scratch.path().join("archive.tar.gz");
        std::fs::write(&source, b"payload").unwrap();

        let store = Arc::new(InMemory::new());
        let fetcher = ArtifactFetcher::new(Some(scratch.path().to_path_buf()))
            .with_store("mem://bucket", store.clone());
        let dest = Location::parse("mem://bucket/out/archive.tar.gz").unwrap();
        assert_eq!(fetcher.store(&source, &dest).await.unwrap(), 7);

        let stored = store
            .get(&ObjPath::from("out/archive.tar.gz"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(&stored[..], b"payload");
    }
}
