//! Artifact metadata document (`metadata.json`).
//!
//! The document is versioned. Readers accept only [`SCHEMA_VERSION`]; any
//! other version is rejected as corrupt rather than guessed at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::corpus::CorpusFormat;
use crate::error::LoadError;

/// Current metadata schema.
pub const SCHEMA_VERSION: u32 = 1;

/// Archive member holding the serialized engine.
pub const BLOB_MEMBER: &str = "bktree.bin";

/// Archive member holding this document.
pub const METADATA_MEMBER: &str = "metadata.json";

/// Archive container type recorded in the document.
pub const ARTIFACT_TYPE: &str = "tar.gz";

fn default_artifact_type() -> String {
    ARTIFACT_TYPE.to_string()
}

fn default_tree_encoding() -> String {
    BLOB_MEMBER.to_string()
}

/// Build-time description of a packaged index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_format: CorpusFormat,
    #[serde(default)]
    pub max_terms: Option<u64>,
    pub term_count: u64,
    #[serde(default = "default_artifact_type")]
    pub artifact_type: String,
    #[serde(default = "default_tree_encoding")]
    pub tree_encoding: String,
}

impl ArtifactMetadata {
    /// Describe an index built now from `source`.
    pub fn new(
        source: impl Into<String>,
        source_format: CorpusFormat,
        max_terms: Option<u64>,
        term_count: u64,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            source: source.into(),
            source_format,
            max_terms,
            term_count,
            artifact_type: default_artifact_type(),
            tree_encoding: default_tree_encoding(),
        }
    }

    /// Parse and validate a metadata document.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let metadata: Self = serde_json::from_str(json)
            .map_err(|e| LoadError::corrupt("invalid metadata.json", e))?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(LoadError::ArtifactCorrupt(format!(
                "unsupported schema_version {} (expected {})",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        if self.tree_encoding != BLOB_MEMBER {
            return Err(LoadError::ArtifactCorrupt(format!(
                "unsupported tree_encoding {:?}",
                self.tree_encoding
            )));
        }
        Ok(())
    }
}
