//! term-index entry point.
//!
//! ## CLI Subcommands
//!
//! - `term-index` or `term-index serve` - Run the request loop (default)
//! - `term-index query <TERM>` - One-shot lookup
//! - `term-index health` - Load and print the health snapshot (exit 0/1)
//! - `term-index build` - Precompute an index artifact
//! - `term-index config show|defaults|validate`

use std::process::ExitCode;

use term_index::cli::{config_cmd, run_build, run_health, run_query, run_serve};
use term_index::config as term_config;
use term_index::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");
    let rest = args.get(2..).unwrap_or_default();

    match command {
        "serve" | "" => {
            let config = term_config::load();
            init_logging(&config.log);
            ExitCode::from(run_serve(config).await as u8)
        }
        "query" => {
            let config = term_config::load();
            init_logging(&config.log);
            ExitCode::from(run_query(rest, config).await as u8)
        }
        "health" => {
            let config = term_config::load();
            init_logging(&config.log);
            ExitCode::from(run_health(config).await as u8)
        }
        "build" => {
            let config = term_config::load();
            init_logging(&config.log);
            ExitCode::from(run_build(rest, &config).await as u8)
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    config_cmd::run_show();
                    ExitCode::SUCCESS
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => {
                    let code = config_cmd::run_validate();
                    ExitCode::from(code as u8)
                }
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("term-index {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &telemetry::LogConfig) {
    if let Err(e) = telemetry::init_logging(config) {
        eprintln!("Logging disabled: {}", e);
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "term-index - fuzzy term lookup over a BK-tree index v{}

USAGE:
    term-index [COMMAND] [OPTIONS]

COMMANDS:
    serve        Run the JSON-line request loop on stdin (default)
    query        Load the index and run one lookup
    health       Load the index and print the health snapshot
    build        Precompute an index artifact from a raw corpus
    config       Show or validate configuration
    version      Show version information
    help         Show this help message

EXAMPLES:
    term-index                                   # Serve with auto-load
    term-index query --max 1 Carditis            # One-shot lookup
    term-index build --dest gs://bucket/idx.tar.gz
    term-index config validate

ENVIRONMENT:
    TERM_INDEX_CORPUS_PATH          Raw corpus path or remote reference
    TERM_INDEX_CORPUS_FORMAT        rrf | terms (default: rrf)
    TERM_INDEX_ARTIFACT_PATH        Prebuilt artifact, tried before the corpus
    TERM_INDEX_MAX_TERMS            Cap on parsed terms (0 = no cap)
    TERM_INDEX_ENABLE_BASELINE      Retain terms for linear-scan lookups
    TERM_INDEX_AUTO_LOAD            Load in the background at startup
    TERM_INDEX_SHUTDOWN_AFTER_SECS  Exit this long after a successful load
    TERM_INDEX_TMP_DIR              Scratch directory for downloads
    TERM_INDEX_LOG_FORMAT           json | pretty
    TERM_INDEX_LOG_LEVEL            Tracing filter (default: info)

EXIT CODES:
    0  Success / Healthy
    1  Failure / Unhealthy
    2  Usage error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "serve" => {
            eprintln!(
                "term-index serve - Run the request loop

USAGE:
    term-index serve

DESCRIPTION:
    Reads one JSON request per line from stdin and writes one JSON
    response per line to stdout. Loading starts in the background when
    TERM_INDEX_AUTO_LOAD is true; queries fail with a retryable
    not_ready error until a generation is published.

REQUESTS:
    {{\"op\":\"search\",\"query\":\"Carditis\",\"max_distance\":1}}
    {{\"op\":\"baseline\",\"query\":\"Carditis\",\"max_distance\":1}}
    {{\"op\":\"nearest\",\"query\":\"Carditis\"}}
    {{\"op\":\"health\"}}
    {{\"op\":\"load\"}}
    {{\"op\":\"reload\"}}

The loop exits on end of input, Ctrl+C, or when the shutdown timer
elapses.
"
            );
        }
        "query" => {
            eprintln!(
                "term-index query - One-shot lookup

USAGE:
    term-index query [--max N] [--baseline] <TERM>

OPTIONS:
    --max N       Maximum edit distance (default: 1)
    --baseline    Use the linear-scan comparator (needs TERM_INDEX_ENABLE_BASELINE)
"
            );
        }
        "health" => {
            eprintln!(
                "term-index health - Load and report

USAGE:
    term-index health

EXIT CODES:
    0  An index generation was published
    1  Loading failed
"
            );
        }
        "build" => {
            eprintln!(
                "term-index build - Precompute an index artifact

USAGE:
    term-index build [--source REF] [--dest REF] [--format rrf|terms] [--max-terms N]

DESCRIPTION:
    Parses the corpus, builds the BK-tree, and writes a tar.gz holding
    bktree.bin and metadata.json to the destination. REF is a local path
    or scheme://container/key. Prints a JSON job summary.
"
            );
        }
        "config" => {
            eprintln!(
                "term-index config - Inspect configuration

USAGE:
    term-index config <SUBCOMMAND>

SUBCOMMANDS:
    show           Show effective configuration
    defaults       Show default configuration
    validate       Check for misconfiguration (exit 1 on warnings)
"
            );
        }
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'term-index help' for general usage.",
                command
            );
        }
    }
}
