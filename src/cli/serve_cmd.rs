//! `serve`: answer JSON-line requests on stdin until stdin closes, Ctrl+C,
//! or the shutdown timer elapses.
//!
//! One request per line, one response per line on stdout:
//!
//! ```text
//! {"op":"search","query":"Carditis","max_distance":1}
//! {"op":"baseline","query":"Carditis"}
//! {"op":"nearest","query":"Carditis"}
//! {"op":"health"}
//! {"op":"load"}
//! {"op":"reload"}
//! ```

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::EnvConfig;
use crate::engine::IndexEngine;
use crate::error::QueryError;
use crate::lifecycle::LifecycleManager;
use crate::Service;

pub const DEFAULT_MAX_DISTANCE: u32 = 1;

fn default_max_distance() -> u32 {
    DEFAULT_MAX_DISTANCE
}

/// A single line of the serve protocol.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Search {
        query: String,
        #[serde(default = "default_max_distance", alias = "maxdist")]
        max_distance: u32,
    },
    Baseline {
        query: String,
        #[serde(default = "default_max_distance", alias = "maxdist")]
        max_distance: u32,
    },
    Nearest {
        query: String,
    },
    Health,
    Load,
    Reload,
}

fn query_error(e: QueryError) -> Value {
    let code = match e {
        QueryError::NotReady => "not_ready",
        QueryError::BaselineUnavailable => "baseline_unavailable",
    };
    json!({ "error": code, "message": e.to_string(), "retryable": e.is_retryable() })
}

/// Answer one request.
pub async fn handle<E: IndexEngine>(lifecycle: &LifecycleManager<E>, request: Request) -> Value {
    match request {
        Request::Search { query, max_distance } => match lifecycle.search(&query, max_distance) {
            Ok(matches) => json!({ "matches": matches }),
            Err(e) => query_error(e),
        },
        Request::Baseline { query, max_distance } => {
            match lifecycle.baseline_search(&query, max_distance) {
                Ok(matches) => json!({ "matches": matches }),
                Err(e) => query_error(e),
            }
        }
        Request::Nearest { query } => match lifecycle.baseline_nearest(&query) {
            Ok(best) => json!({ "matches": [best] }),
            Err(e) => query_error(e),
        },
        Request::Health => json!(lifecycle.snapshot().await),
        Request::Load => load(lifecycle, false).await,
        Request::Reload => load(lifecycle, true).await,
    }
}

async fn load<E: IndexEngine>(lifecycle: &LifecycleManager<E>, force: bool) -> Value {
    match lifecycle.trigger_load(force).await {
        Ok(outcome) => json!(outcome),
        Err(e) => json!({ "error": e.kind(), "message": e.to_string(), "retryable": false }),
    }
}

fn parse_line(line: &str) -> Result<Request, Value> {
    serde_json::from_str::<Request>(line)
        .map_err(|e| json!({ "error": "bad_request", "message": e.to_string(), "retryable": false }))
}

/// Parse and answer one protocol line.
pub async fn handle_line<E: IndexEngine>(lifecycle: &LifecycleManager<E>, line: &str) -> Value {
    match parse_line(line) {
        Ok(request) => handle(lifecycle, request).await,
        Err(response) => response,
    }
}

async fn write_response<W: AsyncWrite + Unpin>(output: &mut W, response: &Value) -> std::io::Result<()> {
    let mut out = response.to_string();
    out.push('\n');
    output.write_all(out.as_bytes()).await?;
    output.flush().await
}

/// Answer protocol lines from `input` until it closes, Ctrl+C, or the
/// shutdown timer elapses. Returns the process exit code.
///
/// `load` and `reload` run on their own tasks and answer when the attempt
/// ends, so health and search lines keep being answered during a build.
/// Responses to those two ops may therefore arrive out of order.
pub async fn serve_lines<E, R, W>(lifecycle: Arc<LifecycleManager<E>>, input: R, mut output: W) -> i32
where
    E: IndexEngine,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    let mut loads = JoinSet::new();
    let mut exit_code = 0;
    let mut input_closed = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            _ = lifecycle.shutdown_requested() => {
                tracing::info!("Shutdown timer elapsed, exiting");
                break;
            }
            Some(joined) = loads.join_next() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Load request task failed");
                }
            }
            Some(response) = rx.recv() => {
                if let Err(e) = write_response(&mut output, &response).await {
                    tracing::error!(error = %e, "Failed to write response");
                    exit_code = 1;
                    break;
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        input_closed = true;
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read request");
                        exit_code = 1;
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = match parse_line(&line) {
                    Ok(request @ (Request::Load | Request::Reload)) => {
                        let lifecycle = Arc::clone(&lifecycle);
                        let tx = tx.clone();
                        loads.spawn(async move {
                            let _ = tx.send(handle(&lifecycle, request).await);
                        });
                        continue;
                    }
                    Ok(request) => handle(&lifecycle, request).await,
                    Err(response) => response,
                };
                if let Err(e) = write_response(&mut output, &response).await {
                    tracing::error!(error = %e, "Failed to write response");
                    exit_code = 1;
                    break;
                }
            }
        }
    }

    // Piped input still gets answers to the loads it asked for.
    if input_closed {
        while loads.join_next().await.is_some() {}
        while let Ok(response) = rx.try_recv() {
            if let Err(e) = write_response(&mut output, &response).await {
                tracing::error!(error = %e, "Failed to write response");
                exit_code = 1;
                break;
            }
        }
    } else if !loads.is_empty() {
        tracing::info!(pending = loads.len(), "Dropping unanswered load requests");
        loads.abort_all();
    }
    exit_code
}

/// Run the serve loop on stdin/stdout. Returns the process exit code.
pub async fn run_serve(config: EnvConfig) -> i32 {
    let auto_load = config.auto_load;
    let service: Service = Service::new(config);
    let lifecycle = service.lifecycle;

    tracing::info!(
        corpus = ?service.config.sources.corpus_path,
        artifact = ?service.config.sources.artifact_path,
        auto_load,
        "Service starting"
    );
    let background = auto_load.then(|| lifecycle.spawn_load(false));

    let input = BufReader::new(tokio::io::stdin());
    let exit_code = serve_lines(Arc::clone(&lifecycle), input, tokio::io::stdout()).await;

    lifecycle.teardown().await;
    if let Some(handle) = background {
        if !handle.is_finished() {
            tracing::info!("Abandoning in-flight background load");
        }
        handle.abort();
    }
    tracing::info!("Service stopped");
    exit_code
}
