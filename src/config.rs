//! Service configuration loaded from environment variables.
//!
//! All values come from `TERM_INDEX_*` environment variables with sensible
//! defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `TERM_INDEX_CORPUS_PATH` | `data/umls/2025AA/MRCONSO.RRF` | Raw corpus path or remote reference (empty disables) |
//! | `TERM_INDEX_CORPUS_FORMAT` | `rrf` | `rrf` (delimited records) or `terms` (one per line) |
//! | `TERM_INDEX_ARTIFACT_PATH` | unset | Prebuilt artifact archive, tried first |
//! | `TERM_INDEX_MAX_TERMS` | 0 | Cap on parsed terms (0 = no cap) |
//! | `TERM_INDEX_ENABLE_BASELINE` | false | Retain terms for the linear-scan comparator |
//! | `TERM_INDEX_AUTO_LOAD` | true | Start loading in the background at startup |
//! | `TERM_INDEX_SHUTDOWN_AFTER_SECS` | 0 | Exit this long after a successful load (0 = never) |
//! | `TERM_INDEX_TMP_DIR` | unset | Scratch directory for downloads and extracted blobs |
//! | `TERM_INDEX_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `TERM_INDEX_LOG_LEVEL` | `info` | Tracing filter directive |
//! | `TERM_INDEX_LOG_FILE` | unset | Log file (stderr when unset) |

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::corpus::CorpusFormat;
use crate::index::SourcesConfig;
use crate::telemetry::{LogConfig, LogFormat};

pub const DEFAULT_CORPUS_PATH: &str = "data/umls/2025AA/MRCONSO.RRF";

pub const CORPUS_PATH: &str = "TERM_INDEX_CORPUS_PATH";
pub const CORPUS_FORMAT: &str = "TERM_INDEX_CORPUS_FORMAT";
pub const ARTIFACT_PATH: &str = "TERM_INDEX_ARTIFACT_PATH";
pub const MAX_TERMS: &str = "TERM_INDEX_MAX_TERMS";
pub const ENABLE_BASELINE: &str = "TERM_INDEX_ENABLE_BASELINE";
pub const AUTO_LOAD: &str = "TERM_INDEX_AUTO_LOAD";
pub const SHUTDOWN_AFTER_SECS: &str = "TERM_INDEX_SHUTDOWN_AFTER_SECS";
pub const TMP_DIR: &str = "TERM_INDEX_TMP_DIR";
pub const LOG_FORMAT: &str = "TERM_INDEX_LOG_FORMAT";
pub const LOG_LEVEL: &str = "TERM_INDEX_LOG_LEVEL";
pub const LOG_FILE: &str = "TERM_INDEX_LOG_FILE";

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub corpus_path: Option<String>,
    pub corpus_format: CorpusFormat,
    pub artifact_path: Option<String>,
    pub max_terms: usize,
    pub enable_baseline: bool,
    pub auto_load: bool,
    pub shutdown_after_secs: u64,
    pub tmp_dir: Option<String>,
    pub log_format: &'static str,
    pub log_level: String,
    pub log_file: Option<String>,
}

/// All configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub sources: SourcesConfig,
    pub enable_baseline: bool,
    pub auto_load: bool,
    pub shutdown_after: Option<Duration>,
    pub log: LogConfig,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean env var (`1/true/yes/on`, `0/false/no/off`).
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Non-empty string env var.
fn parse_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn load_sources() -> SourcesConfig {
    // Unset means the default corpus; an explicit empty value disables it.
    let corpus_path = match std::env::var(CORPUS_PATH) {
        Ok(val) => Some(val.trim().to_string()).filter(|v| !v.is_empty()),
        Err(_) => Some(DEFAULT_CORPUS_PATH.to_string()),
    };
    let corpus_format = std::env::var(CORPUS_FORMAT)
        .ok()
        .and_then(|v| v.parse::<CorpusFormat>().ok())
        .unwrap_or_default();
    let max_terms = Some(parse_usize(MAX_TERMS, 0)).filter(|&cap| cap > 0);

    SourcesConfig {
        corpus_path,
        corpus_format,
        artifact_path: parse_string(ARTIFACT_PATH),
        max_terms,
        scratch_dir: parse_string(TMP_DIR).map(PathBuf::from),
    }
}

fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    LogConfig {
        format: std::env::var(LOG_FORMAT)
            .ok()
            .and_then(|v| v.parse::<LogFormat>().ok())
            .unwrap_or(defaults.format),
        level: parse_string(LOG_LEVEL).unwrap_or(defaults.level),
        output_path: parse_string(LOG_FILE).map(PathBuf::from),
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to defaults without panicking.
pub fn load() -> EnvConfig {
    let shutdown_secs = parse_u64(SHUTDOWN_AFTER_SECS, 0);

    EnvConfig {
        sources: load_sources(),
        enable_baseline: parse_bool(ENABLE_BASELINE, false),
        auto_load: parse_bool(AUTO_LOAD, true),
        shutdown_after: (shutdown_secs > 0).then(|| Duration::from_secs(shutdown_secs)),
        log: load_log_config(),
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            corpus_path: self.sources.corpus_path.clone(),
            corpus_format: self.sources.corpus_format,
            artifact_path: self.sources.artifact_path.clone(),
            max_terms: self.sources.max_terms.unwrap_or(0),
            enable_baseline: self.enable_baseline,
            auto_load: self.auto_load,
            shutdown_after_secs: self.shutdown_after.map_or(0, |d| d.as_secs()),
            tmp_dir: self
                .sources
                .scratch_dir
                .as_ref()
                .map(|p| p.display().to_string()),
            log_format: self.log.format.as_str(),
            log_level: self.log.level.clone(),
            log_file: self
                .log
                .output_path
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }
}

/// Serializes tests that mutate process environment.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) const ENV_KEYS: &[&str] = &[
    CORPUS_PATH,
    CORPUS_FORMAT,
    ARTIFACT_PATH,
    MAX_TERMS,
    ENABLE_BASELINE,
    AUTO_LOAD,
    SHUTDOWN_AFTER_SECS,
    TMP_DIR,
    LOG_FORMAT,
    LOG_LEVEL,
    LOG_FILE,
];

#[cfg(test)]
pub(crate) fn clear_env_vars() {
    for k in ENV_KEYS {
        std::env::remove_var(k);
    }
}
