//! Tests for the lifecycle manager: load trigger, health, deferred shutdown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use term_index::artifact::ArtifactFetcher;
use term_index::config::EnvConfig;
use term_index::engine::{BkTree, Match};
use term_index::index::{LoadState, LoadStatus, SourcesConfig};
use term_index::lifecycle::LifecycleManager;
use term_index::telemetry::LogConfig;
use term_index::{QueryError, Service};

use common::{
    close_gate, coordinator_for, line_list, make_artifact, open_gate, wait_for_state, write_terms, GatedEngine, Members,
};

fn manager(
    sources: SourcesConfig,
    baseline: bool,
    shutdown_after: Option<Duration>,
) -> Arc<LifecycleManager<BkTree>> {
    let coordinator = coordinator_for::<BkTree>(sources, ArtifactFetcher::default(), baseline);
    Arc::new(LifecycleManager::new(coordinator, baseline, shutdown_after))
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_snapshot_before_and_after_load() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("terms.txt");
    write_terms(&corpus, &["Carditis", "Carditid"]);
    let lifecycle = manager(line_list(&corpus), true, None);

    let before = lifecycle.snapshot().await;
    assert_eq!(before.status, LoadState::Empty);
    assert!(!before.loaded);
    assert!(!lifecycle.is_ready());
    assert_eq!(lifecycle.search("Carditis", 1), Err(QueryError::NotReady));

    lifecycle.trigger_load(false).await.unwrap();
    let after = lifecycle.snapshot().await;
    assert_eq!(after.status, LoadState::Ready);
    assert_eq!(after.term_count, 2);
    assert!(after.loaded);
    assert!(!after.loading);
    assert!(after.baseline_enabled);
    assert!(!after.artifact_loaded);
    assert!(!after.shutdown_timer_active);
    assert_eq!(after.generation, 1);
    assert!(lifecycle.is_ready());
    assert_eq!(lifecycle.baseline_nearest("Carditiz").unwrap(), Match::new("Carditis", 1));
}

#[tokio::test]
async fn test_snapshot_reports_artifact_details() {
    let dir = tempfile::tempdir().unwrap();
    let archive = make_artifact(dir.path(), &["Carditis"], 1, Members::Both);
    let sources = SourcesConfig {
        artifact_path: Some(archive.display().to_string()),
        ..Default::default()
    };
    let lifecycle = manager(sources, false, None);

    lifecycle.trigger_load(false).await.unwrap();
    let snapshot = lifecycle.snapshot().await;
    assert!(snapshot.artifact_loaded);
    assert_eq!(snapshot.artifact_path, Some(archive.display().to_string()));
    assert_eq!(snapshot.artifact_term_count, Some(1));
    assert_eq!(
        lifecycle.baseline_search("Carditis", 0),
        Err(QueryError::BaselineUnavailable)
    );
}

#[tokio::test]
async fn test_failed_load_reports_last_error() {
    let dir = tempfile::tempdir().unwrap();
    let lifecycle = manager(line_list(&dir.path().join("absent.txt")), false, None);

    assert!(lifecycle.trigger_load(false).await.is_err());
    let snapshot = lifecycle.snapshot().await;
    assert_eq!(snapshot.status, LoadState::Failed);
    assert!(!snapshot.loaded);
    assert!(snapshot.last_error.unwrap().contains("absent.txt"));
}

// ============================================================================
// Deferred shutdown
// ============================================================================

#[tokio::test]
async fn test_successful_load_arms_shutdown_timer() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("terms.txt");
    write_terms(&corpus, &["Carditis"]);
    let lifecycle = manager(line_list(&corpus), false, Some(Duration::from_secs(3600)));

    let outcome = lifecycle.trigger_load(false).await.unwrap();
    assert_eq!(outcome.status, LoadStatus::Loaded);
    let snapshot = lifecycle.snapshot().await;
    assert!(snapshot.shutdown_timer_active);
    assert_eq!(snapshot.shutdown_after_seconds, Some(3600));

    // A no-op load does not re-arm; teardown stops the pending timer.
    let again = lifecycle.trigger_load(false).await.unwrap();
    assert_eq!(again.status, LoadStatus::AlreadyLoaded);
    lifecycle.teardown().await;
    assert!(!lifecycle.snapshot().await.shutdown_timer_active);
    assert!(!lifecycle.shutdown_fired());
}

#[tokio::test]
async fn test_failed_load_does_not_arm_timer() {
    let dir = tempfile::tempdir().unwrap();
    let lifecycle = manager(line_list(&dir.path().join("absent.txt")), false, Some(Duration::from_secs(60)));

    assert!(lifecycle.trigger_load(false).await.is_err());
    assert!(!lifecycle.snapshot().await.shutdown_timer_active);
}

#[tokio::test]
async fn test_shutdown_fires_after_delay() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("terms.txt");
    write_terms(&corpus, &["Carditis"]);
    let lifecycle = manager(line_list(&corpus), false, Some(Duration::from_millis(50)));

    lifecycle.spawn_load(false).await.unwrap().unwrap();
    tokio::time::timeout(Duration::from_secs(5), lifecycle.shutdown_requested())
        .await
        .expect("shutdown timer never fired");
    assert!(lifecycle.shutdown_fired());
}

#[tokio::test]
async fn test_cancel_shutdown_prevents_firing() {
    let lifecycle = manager(SourcesConfig::default(), false, None);

    lifecycle.arm_shutdown(Duration::from_millis(30)).await;
    assert!(lifecycle.cancel_shutdown().await);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(!lifecycle.shutdown_fired());
    assert!(!lifecycle.cancel_shutdown().await);
}

// ============================================================================
// Service wiring
// ============================================================================

#[tokio::test]
async fn test_service_wires_config_through() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("terms.txt");
    write_terms(&corpus, &["Carditis", "Nephritis"]);

    let config = EnvConfig {
        sources: line_list(&corpus),
        enable_baseline: true,
        auto_load: false,
        shutdown_after: None,
        log: LogConfig::default(),
    };
    let service: Service = Service::new(config);
    let outcome = service.lifecycle.trigger_load(false).await.unwrap();
    assert_eq!(outcome.term_count, 2);
    assert!(service.lifecycle.coordinator().retains_terms());
    assert_eq!(
        service.lifecycle.baseline_search("Nephritis", 0).unwrap(),
        vec![Match::new("Nephritis", 0)]
    );
}

// ============================================================================
// Serve protocol
// ============================================================================

#[tokio::test]
async fn test_serve_protocol_lines() {
    use term_index::cli::serve_cmd::handle_line;

    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("terms.txt");
    write_terms(&corpus, &["Carditis", "Carditid"]);
    let lifecycle = manager(line_list(&corpus), false, None);

    let early = handle_line(&lifecycle, r#"{"op":"search","query":"Carditis"}"#).await;
    assert_eq!(early["error"], "not_ready");
    assert_eq!(early["retryable"], true);

    let loaded = handle_line(&lifecycle, r#"{"op":"load"}"#).await;
    assert_eq!(loaded["status"], "loaded");
    assert_eq!(loaded["term_count"], 2);
    let again = handle_line(&lifecycle, r#"{"op":"load"}"#).await;
    assert_eq!(again["status"], "already_loaded");

    let found = handle_line(&lifecycle, r#"{"op":"search","query":"Carditis","maxdist":1}"#).await;
    assert_eq!(found["matches"][0]["term"], "Carditis");
    assert_eq!(found["matches"][1]["distance"], 1);

    let baseline = handle_line(&lifecycle, r#"{"op":"nearest","query":"Carditis"}"#).await;
    assert_eq!(baseline["error"], "baseline_unavailable");

    let health = handle_line(&lifecycle, r#"{"op":"health"}"#).await;
    assert_eq!(health["status"], "ready");
    assert_eq!(health["loaded"], true);

    let bad = handle_line(&lifecycle, "not json").await;
    assert_eq!(bad["error"], "bad_request");
}

async fn next_response<R: tokio::io::AsyncBufRead + Unpin>(lines: &mut tokio::io::Lines<R>) -> serde_json::Value {
    let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
        .await
        .expect("no response within five seconds")
        .unwrap()
        .expect("serve loop closed its output");
    serde_json::from_str(&line).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_health_answers_while_reload_is_building() {
    use term_index::cli::serve_cmd::serve_lines;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("terms.txt");
    write_terms(&corpus, &["Carditis", "Carditid", "Nephritis"]);

    open_gate();
    let coordinator =
        coordinator_for::<GatedEngine>(line_list(&corpus), ArtifactFetcher::default(), false);
    let lifecycle = Arc::new(LifecycleManager::new(Arc::clone(&coordinator), false, None));
    lifecycle.trigger_load(false).await.unwrap();

    // Block the reload inside the engine.
    close_gate();
    write_terms(&corpus, &["Carditis", "Carditid", "Nephritis", "Nephrosis", "Neuritis"]);
    let (mut requests, server_in) = tokio::io::duplex(4096);
    let (server_out, server_replies) = tokio::io::duplex(4096);
    let server = tokio::spawn(serve_lines(
        Arc::clone(&lifecycle),
        BufReader::new(server_in),
        server_out,
    ));
    let mut replies = BufReader::new(server_replies).lines();

    requests.write_all(b"{\"op\":\"reload\"}\n").await.unwrap();
    wait_for_state(&coordinator, LoadState::Loading).await;
    requests
        .write_all(b"{\"op\":\"health\"}\n{\"op\":\"search\",\"query\":\"Carditis\",\"max_distance\":0}\n")
        .await
        .unwrap();

    let health = next_response(&mut replies).await;
    assert_eq!(health["loading"], true);
    assert_eq!(health["loaded"], true);
    assert_eq!(health["term_count"], 3);
    let found = next_response(&mut replies).await;
    assert_eq!(found["matches"][0]["term"], "Carditis");

    open_gate();
    let reloaded = next_response(&mut replies).await;
    assert_eq!(reloaded["status"], "loaded");
    assert_eq!(reloaded["term_count"], 5);

    drop(requests);
    let exit_code = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("serve loop did not stop at end of input")
        .unwrap();
    assert_eq!(exit_code, 0);
    assert_eq!(lifecycle.snapshot().await.generation, 2);
}
