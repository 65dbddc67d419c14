//! One-shot commands that load the index in-process: `query` and `health`.

use crate::config::EnvConfig;
use crate::Service;

/// Arguments for `query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryArgs {
    pub query: String,
    pub max_distance: u32,
    pub baseline: bool,
}

pub fn parse_query_args(args: &[String]) -> Result<QueryArgs, String> {
    let mut max_distance = super::serve_cmd::DEFAULT_MAX_DISTANCE;
    let mut baseline = false;
    let mut words = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--max" | "--max-distance" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| format!("Missing value for {}", args[i]))?;
                max_distance = value
                    .parse()
                    .map_err(|_| format!("Invalid max distance: {}", value))?;
                i += 2;
            }
            "--baseline" => {
                baseline = true;
                i += 1;
            }
            word => {
                words.push(word.to_string());
                i += 1;
            }
        }
    }

    if words.is_empty() {
        return Err("Missing query term".to_string());
    }
    Ok(QueryArgs {
        query: words.join(" "),
        max_distance,
        baseline,
    })
}

/// Load the index, run one lookup, print matches as JSON.
pub async fn run_query(args: &[String], config: EnvConfig) -> i32 {
    let query = match parse_query_args(args) {
        Ok(query) => query,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!("Usage: term-index query [--max N] [--baseline] <TERM>");
            return 2;
        }
    };

    let service: Service = Service::new(config);
    let lifecycle = service.lifecycle;
    if let Err(e) = lifecycle.trigger_load(false).await {
        eprintln!("Load failed: {}", e);
        return 1;
    }

    let result = if query.baseline {
        lifecycle.baseline_search(&query.query, query.max_distance)
    } else {
        lifecycle.search(&query.query, query.max_distance)
    };
    lifecycle.teardown().await;

    match result {
        Ok(matches) => {
            println!("{}", serde_json::json!({ "matches": matches }));
            0
        }
        Err(e) => {
            eprintln!("Query failed: {}", e);
            1
        }
    }
}

/// Load the index and print the health snapshot. Exit 0 when loaded.
pub async fn run_health(config: EnvConfig) -> i32 {
    let service: Service = Service::new(config);
    let lifecycle = service.lifecycle;
    if let Err(e) = lifecycle.trigger_load(false).await {
        tracing::error!(error = %e, "Load failed during health check");
    }

    let snapshot = lifecycle.snapshot().await;
    lifecycle.teardown().await;
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode health snapshot: {}", e),
    }
    if snapshot.loaded {
        0
    } else {
        1
    }
}
