//! CLI subcommands for the `term-index` binary.
//!
//! ```bash
//! term-index serve            # JSON-line request loop on stdin (default)
//! term-index query Carditis   # Load in-process and run one lookup
//! term-index health           # Load in-process and print the health snapshot
//! term-index build --dest gs://bucket/index.tar.gz
//! term-index config show
//! ```

pub mod build_cmd;
pub mod config_cmd;
pub mod query_cmd;
pub mod serve_cmd;

pub use build_cmd::run_build;
pub use query_cmd::{run_health, run_query};
pub use serve_cmd::run_serve;
