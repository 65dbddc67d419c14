//! Resolved corpus sources.

use std::fmt;

use serde::Serialize;

use crate::artifact::Location;
use crate::corpus::CorpusFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Raw,
    Artifact,
}

/// Where one load attempt takes its terms from. Fixed for the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSource {
    pub kind: SourceKind,
    pub location: Location,
    pub format: CorpusFormat,
}

impl CorpusSource {
    pub fn raw(location: Location, format: CorpusFormat) -> Self {
        Self {
            kind: SourceKind::Raw,
            location,
            format,
        }
    }

    pub fn artifact(location: Location, format: CorpusFormat) -> Self {
        Self {
            kind: SourceKind::Artifact,
            location,
            format,
        }
    }

    pub fn is_artifact(&self) -> bool {
        self.kind == SourceKind::Artifact
    }
}

impl fmt::Display for CorpusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SourceKind::Raw => write!(f, "raw:{} ({})", self.location, self.format),
            SourceKind::Artifact => write!(f, "artifact:{}", self.location),
        }
    }
}
