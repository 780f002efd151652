//! Delivery scenarios across source, agent, reporter and cache

use std::time::{Duration, Instant};

use agent::{Agent, AgentState, StopReason};
use config_loader::{ConfigLoader, EnvOverrides};
use contracts::{ReportPayload, StopSignal};
use reporter::ReporterHandle;

use crate::support::{folder_config, open_cache, result, wait_for, write_pngs, MockTransport};

/// Folder with 3 images, endpoint always up: one batch of 3, empty cache
#[tokio::test]
async fn test_scenario_a_all_delivered() {
    let images = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    write_pngs(images.path(), 3);
    let config = folder_config(images.path(), &state.path().join("cache.db"));
    let transport = MockTransport::default();

    let started = Instant::now();
    let report = Agent::new(config.clone())
        .run_with(transport.clone(), open_cache(&config))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(report.final_state, AgentState::Stopped);
    assert_eq!(report.reason, StopReason::EndOfStream);
    assert_eq!(report.exit_code(), 0);

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 1);
    let payload = delivered[0].decode().unwrap();
    assert_eq!(payload.device_id, "edge-001");
    assert_eq!(payload.results.len(), 3);
    let frames: Vec<u64> = payload.results.iter().map(|r| r.frame_id).collect();
    assert_eq!(frames, [0, 1, 2]);
    // stub engine: three fixed detections per frame
    assert!(payload.results.iter().all(|r| r.detections.len() == 3));

    assert_eq!(report.reporter.delivered, 1);
    assert_eq!(report.reporter.cached, 0);
    assert!(open_cache(&config).is_empty().unwrap());
}

/// Same run, endpoint always down: retries exhausted, one cache entry
#[tokio::test]
async fn test_scenario_b_cached_after_retries() {
    let images = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    write_pngs(images.path(), 3);
    let config = folder_config(images.path(), &state.path().join("cache.db"));
    let transport = MockTransport::failing();

    let report = Agent::new(config.clone())
        .run_with(transport.clone(), open_cache(&config))
        .await
        .unwrap();

    // one attempt plus max_retries
    assert_eq!(transport.calls(), u64::from(config.reporter.max_retries) + 1);
    assert_eq!(report.reporter.cached, 1);
    assert_eq!(report.reporter.delivered, 0);
    assert_eq!(report.exit_code(), 0);

    let cache = open_cache(&config);
    let pending = cache.get_pending(10).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].retry_count, 0);
    assert_eq!(pending[0].result_count, 3);

    let payload = pending[0].to_report().decode().unwrap();
    assert_eq!(payload.device_id, "edge-001");
    let frames: Vec<u64> = payload.results.iter().map(|r| r.frame_id).collect();
    assert_eq!(frames, [0, 1, 2]);
}

/// Entry left by a failed run is drained once the endpoint recovers, with
/// the exact bytes that were sealed
#[tokio::test]
async fn test_scenario_c_drain_after_recovery() {
    let images = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    write_pngs(images.path(), 3);
    let mut config = folder_config(images.path(), &state.path().join("cache.db"));

    let offline = MockTransport::failing();
    Agent::new(config.clone())
        .run_with(offline, open_cache(&config))
        .await
        .unwrap();
    let cached = open_cache(&config).get_pending(10).unwrap();
    assert_eq!(cached.len(), 1);
    let sealed_body = cached[0].payload.clone();

    config.reporter.drain_interval_secs = 0.1;
    let online = MockTransport::default();
    let (handle, intake) = ReporterHandle::spawn(
        &config.reporter,
        &config.device_id,
        online.clone(),
        open_cache(&config),
        StopSignal::new(),
    );

    assert!(wait_for(Duration::from_secs(3), || online.delivered().len() == 1).await);
    drop(intake);
    let snapshot = handle.shutdown().await;

    assert_eq!(snapshot.delivered, 1);
    assert_eq!(snapshot.drained, 1);
    let resent = online.delivered();
    assert_eq!(resent[0].body(), &sealed_body);
    assert_eq!(resent[0].batch_id(), cached[0].batch_id);
    assert!(open_cache(&config).is_empty().unwrap());
}

/// A failed resend stays in the cache with its retry counter bumped
#[tokio::test]
async fn test_drain_failure_increments_retry() {
    let state = tempfile::tempdir().unwrap();
    let images = tempfile::tempdir().unwrap();
    let mut config = folder_config(images.path(), &state.path().join("cache.db"));
    config.reporter.drain_interval_secs = 0.05;

    let cache = open_cache(&config);
    let report = ReportPayload {
        device_id: "edge-001".to_string(),
        batch_id: "offline-7".to_string(),
        created_at: chrono::Utc::now(),
        results: vec![result(7)],
    }
    .seal()
    .unwrap();
    cache.add(&report).unwrap();

    let transport = MockTransport::failing();
    let (handle, intake) = ReporterHandle::spawn(
        &config.reporter,
        &config.device_id,
        transport.clone(),
        cache,
        StopSignal::new(),
    );
    assert!(wait_for(Duration::from_secs(3), || transport.calls() >= 2).await);
    drop(intake);
    handle.shutdown().await;

    let pending = open_cache(&config).get_pending(10).unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].retry_count >= 2);
    assert_eq!(pending[0].last_error.as_deref().map(|e| e.contains("503")), Some(true));
}

/// Stop with 2 of 10 results accumulated: the partial batch is delivered
#[tokio::test]
async fn test_scenario_d_partial_batch_delivered_on_stop() {
    let images = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    let config = folder_config(images.path(), &state.path().join("cache.db"));
    let transport = MockTransport::default();
    let stop = StopSignal::new();

    let (handle, intake) = ReporterHandle::spawn(
        &config.reporter,
        &config.device_id,
        transport.clone(),
        open_cache(&config),
        stop.clone(),
    );
    intake.submit(result(0)).await.unwrap();
    intake.submit(result(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(transport.delivered().is_empty());

    stop.trigger();
    drop(intake);
    let snapshot = handle.shutdown().await;

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].result_count(), 2);
    assert_eq!(snapshot.batches_sealed, 1);
}

/// Same, endpoint down: the partial batch lands in the cache
#[tokio::test]
async fn test_scenario_d_partial_batch_cached_on_stop() {
    let images = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    let mut config = folder_config(images.path(), &state.path().join("cache.db"));
    config.reporter.retry_initial_delay_secs = 30.0;
    config.reporter.retry_max_delay_secs = 30.0;
    let transport = MockTransport::failing();
    let stop = StopSignal::new();

    let (handle, intake) = ReporterHandle::spawn(
        &config.reporter,
        &config.device_id,
        transport.clone(),
        open_cache(&config),
        stop.clone(),
    );
    intake.submit(result(0)).await.unwrap();
    intake.submit(result(1)).await.unwrap();

    stop.trigger();
    drop(intake);
    let snapshot = tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .unwrap();

    assert_eq!(transport.calls(), 1);
    assert_eq!(snapshot.cached, 1);
    let pending = open_cache(&config).get_pending(10).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].result_count, 2);
}

/// Stop signal on a looping folder: the agent drains and force-seals
#[tokio::test]
async fn test_stop_signal_force_seals_agent_batch() {
    let images = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    write_pngs(images.path(), 2);
    let mut config = folder_config(images.path(), &state.path().join("cache.db"));
    config.source.looping = true;
    config.source.rate_limit = 5.0;
    let transport = MockTransport::default();

    let agent = Agent::new(config.clone());
    let stop = agent.stop_signal();
    let mut states = agent.subscribe();
    let run = tokio::spawn(agent.run_with(transport.clone(), open_cache(&config)));

    tokio::time::sleep(Duration::from_millis(300)).await;
    stop.trigger();
    let report = run.await.unwrap().unwrap();

    assert_eq!(report.reason, StopReason::Stopped);
    assert_eq!(report.exit_code(), 0);
    assert!(report.stats.results_submitted >= 1);
    assert!(report.stats.results_submitted < 10);

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].result_count() as u64, report.stats.results_submitted);
    assert_eq!(*states.borrow_and_update(), AgentState::Stopped);
}

/// File plus environment layers drive batching and identity
#[tokio::test]
async fn test_layered_config_drives_run() {
    let images = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    write_pngs(images.path(), 3);

    let file = state.path().join("agent.toml");
    let cache_path = state.path().join("cache.db");
    std::fs::write(
        &file,
        format!(
            "device_id = \"from-file\"\n\n[source]\ntype = \"folder\"\npath = {:?}\n\n\
             [reporter]\nendpoint = \"log://scenario\"\nbatch_size = 5\n\n\
             [cache]\nstorage_path = {:?}\n",
            images.path().display().to_string(),
            cache_path.display().to_string(),
        ),
    )
    .unwrap();
    let env = EnvOverrides::from_pairs([
        ("EDGE_AGENT_DEVICE_ID", "edge-042"),
        ("EDGE_AGENT_REPORTER_BATCH_SIZE", "2"),
    ]);
    let config = ConfigLoader::load_layered(Some(&file), &env).unwrap();
    assert_eq!(config.device_id, "edge-042");
    assert_eq!(config.reporter.batch_size, 2);

    let transport = MockTransport::default();
    let report = Agent::new(config.clone())
        .run_with(transport.clone(), open_cache(&config))
        .await
        .unwrap();

    assert_eq!(report.reporter.batches_sealed, 2);
    let sizes: Vec<usize> = transport.delivered().iter().map(|r| r.result_count()).collect();
    assert_eq!(sizes, [2, 1]);
    assert!(transport
        .delivered()
        .iter()
        .all(|r| r.device_id() == "edge-042"));
}
