//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration directly from environment variables
//! and never touch the corpus or artifact.

use std::path::Path;

use crate::artifact::Location;
use crate::config::{self, EffectiveConfig, EnvConfig};
use crate::corpus::CorpusFormat;
use crate::telemetry::LogFormat;

/// Print effective config as key-value pairs to stdout.
pub fn run_show() {
    let cfg = config::load().effective_config();
    print_config(&cfg);
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    println!("{}={}", config::CORPUS_PATH, config::DEFAULT_CORPUS_PATH);
    println!("{}=rrf", config::CORPUS_FORMAT);
    println!("{}=", config::ARTIFACT_PATH);
    println!("{}=0", config::MAX_TERMS);
    println!("{}=false", config::ENABLE_BASELINE);
    println!("{}=true", config::AUTO_LOAD);
    println!("{}=0", config::SHUTDOWN_AFTER_SECS);
    println!("{}=", config::TMP_DIR);
    println!("{}=json", config::LOG_FORMAT);
    println!("{}=info", config::LOG_LEVEL);
    println!("{}=", config::LOG_FILE);
}

/// Collect warnings about configuration that cannot work as intended.
pub fn check(env: &EnvConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let sources = &env.sources;

    if !sources.has_raw() && !sources.has_artifact() {
        warnings.push(format!(
            "Neither {} nor {} is set; loads will fail",
            config::CORPUS_PATH,
            config::ARTIFACT_PATH
        ));
    }

    for (key, value) in [
        (config::CORPUS_PATH, &sources.corpus_path),
        (config::ARTIFACT_PATH, &sources.artifact_path),
    ] {
        let Some(value) = value.as_deref().filter(|v| !v.is_empty()) else {
            continue;
        };
        match Location::parse(value) {
            Ok(Location::Local(path)) if !path.exists() => {
                warnings.push(format!("{} points to a missing file: {}", key, path.display()));
            }
            Ok(_) => {}
            Err(e) => warnings.push(format!("{} is not a valid location: {}", key, e)),
        }
    }

    if env.enable_baseline && !sources.has_raw() {
        warnings.push(format!(
            "{} is set but only an artifact is configured; artifact restores retain no terms",
            config::ENABLE_BASELINE
        ));
    }

    if let Some(dir) = &sources.scratch_dir {
        if !Path::new(dir).is_dir() {
            warnings.push(format!("{} does not exist: {}", config::TMP_DIR, dir.display()));
        }
    }

    if let Ok(raw) = std::env::var(config::CORPUS_FORMAT) {
        if raw.parse::<CorpusFormat>().is_err() {
            warnings.push(format!("{}={} is not recognized; using rrf", config::CORPUS_FORMAT, raw));
        }
    }
    if let Ok(raw) = std::env::var(config::LOG_FORMAT) {
        if raw.parse::<LogFormat>().is_err() {
            warnings.push(format!("{}={} is not recognized; using json", config::LOG_FORMAT, raw));
        }
    }

    warnings
}

/// Validate configuration for obvious misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found.
pub fn run_validate() -> i32 {
    let warnings = check(&config::load());
    for warning in &warnings {
        eprintln!("WARNING: {}", warning);
    }
    if warnings.is_empty() {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}

fn print_config(cfg: &EffectiveConfig) {
    println!("{}={}", config::CORPUS_PATH, cfg.corpus_path.as_deref().unwrap_or(""));
    println!("{}={}", config::CORPUS_FORMAT, cfg.corpus_format);
    println!("{}={}", config::ARTIFACT_PATH, cfg.artifact_path.as_deref().unwrap_or(""));
    println!("{}={}", config::MAX_TERMS, cfg.max_terms);
    println!("{}={}", config::ENABLE_BASELINE, cfg.enable_baseline);
    println!("{}={}", config::AUTO_LOAD, cfg.auto_load);
    println!("{}={}", config::SHUTDOWN_AFTER_SECS, cfg.shutdown_after_secs);
    println!("{}={}", config::TMP_DIR, cfg.tmp_dir.as_deref().unwrap_or(""));
    println!("{}={}", config::LOG_FORMAT, cfg.log_format);
    println!("{}={}", config::LOG_LEVEL, cfg.log_level);
    println!("{}={}", config::LOG_FILE, cfg.log_file.as_deref().unwrap_or(""));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{clear_env_vars, ENV_LOCK};

    #[test]
    fn test_validate_passes_with_existing_corpus() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("MRCONSO.RRF");
        std::fs::write(&corpus, "").unwrap();
        std::env::set_var(config::CORPUS_PATH, &corpus);

        assert_eq!(run_validate(), 0);
        clear_env_vars();
    }

    #[test]
    fn test_validate_warns_on_missing_sources() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        std::env::set_var(config::CORPUS_PATH, "");

        let warnings = check(&config::load());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Neither"));
        assert_eq!(run_validate(), 1);
        clear_env_vars();
    }

    #[test]
    fn test_validate_warns_on_baseline_with_artifact_only() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        std::env::set_var(config::CORPUS_PATH, "");
        std::env::set_var(config::ARTIFACT_PATH, "gs://bucket/index.tar.gz");
        std::env::set_var(config::ENABLE_BASELINE, "true");

        let warnings = check(&config::load());
        assert!(warnings.iter().any(|w| w.contains(config::ENABLE_BASELINE)));
        clear_env_vars();
    }

    #[test]
    fn test_validate_flags_unknown_format() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        std::env::set_var(config::CORPUS_PATH, "");
        std::env::set_var(config::ARTIFACT_PATH, "gs://bucket/index.tar.gz");
        std::env::set_var(config::CORPUS_FORMAT, "xml");

        let warnings = check(&config::load());
        assert!(warnings.iter().any(|w| w.contains("xml")));
        clear_env_vars();
    }
}
