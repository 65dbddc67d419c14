//! `build`: precompute an index artifact from a raw corpus.
//!
//! Source and destination default to the configured corpus and artifact
//! paths. Prints a one-line JSON job summary on stdout.

use crate::artifact::{run_job, ArtifactFetcher, PackageRequest};
use crate::config::EnvConfig;
use crate::corpus::CorpusFormat;
use crate::engine::BkTree;

/// Parse `build` arguments on top of the environment configuration.
pub fn parse_args(args: &[String], config: &EnvConfig) -> Result<PackageRequest, String> {
    let mut source = config.sources.corpus_path.clone();
    let mut destination = config.sources.artifact_path.clone();
    let mut source_format = config.sources.corpus_format;
    let mut max_terms = config.sources.max_terms;

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = args.get(i + 1).ok_or_else(|| format!("Missing value for {}", flag))?;
        match flag {
            "--source" => source = Some(value.clone()),
            "--dest" | "--artifact" => destination = Some(value.clone()),
            "--format" => {
                source_format = value
                    .parse::<CorpusFormat>()
                    .map_err(|e| e.to_string())?;
            }
            "--max-terms" => {
                let cap = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --max-terms: {}", value))?;
                max_terms = Some(cap).filter(|&cap| cap > 0);
            }
            _ => return Err(format!("Unknown argument: {}", flag)),
        }
        i += 2;
    }

    let source = source
        .filter(|s| !s.trim().is_empty())
        .ok_or("No corpus source: pass --source or set TERM_INDEX_CORPUS_PATH")?;
    let destination = destination
        .filter(|s| !s.trim().is_empty())
        .ok_or("No destination: pass --dest or set TERM_INDEX_ARTIFACT_PATH")?;

    Ok(PackageRequest {
        source,
        source_format,
        destination,
        max_terms,
    })
}

/// Run the precompute job. Exit code 0 on success, 1 on failure, 2 on
/// usage errors.
pub async fn run_build(args: &[String], config: &EnvConfig) -> i32 {
    let request = match parse_args(args, config) {
        Ok(request) => request,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!(
                "Usage: term-index build [--source REF] [--dest REF] [--format rrf|terms] [--max-terms N]"
            );
            return 2;
        }
    };

    let fetcher = ArtifactFetcher::new(config.sources.scratch_dir.clone());
    let summary = run_job::<BkTree>(&fetcher, &request).await;
    match serde_json::to_string(&summary) {
        Ok(line) => println!("{}", line),
        Err(e) => eprintln!("Failed to encode job summary: {}", e),
    }
    if summary.is_success() {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SourcesConfig;
    use crate::telemetry::LogConfig;

    fn config() -> EnvConfig {
        EnvConfig {
            sources: SourcesConfig {
                corpus_path: Some("data/MRCONSO.RRF".into()),
                ..Default::default()
            },
            enable_baseline: false,
            auto_load: true,
            shutdown_after: None,
            log: LogConfig::default(),
        }
    }

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flags_override_environment() {
        let request = parse_args(
            &args(&["--dest", "gs://bucket/index.tar.gz", "--format", "terms", "--max-terms", "50"]),
            &config(),
        )
        .unwrap();
        assert_eq!(request.source, "data/MRCONSO.RRF");
        assert_eq!(request.destination, "gs://bucket/index.tar.gz");
        assert_eq!(request.source_format, CorpusFormat::LineList);
        assert_eq!(request.max_terms, Some(50));
    }

    #[test]
    fn test_missing_destination_is_usage_error() {
        let err = parse_args(&[], &config()).unwrap_err();
        assert!(err.contains("--dest"));
    }

    #[test]
    fn test_flag_without_value_is_rejected() {
        assert!(parse_args(&args(&["--source"]), &config()).is_err());
        assert!(parse_args(&args(&["--format", "xml", "--dest", "out.tar.gz"]), &config()).is_err());
    }
}
