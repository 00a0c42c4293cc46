//! Node restarts during a live run.
//!
//! A single node makes every restart visible to every worker. Downtime is
//! shorter than the first two backoff steps and the grace period keeps the
//! node up long enough for the second reconnect to land.

use crate::assertions::{
    assert_counters, assert_no_worker_errors, assert_restart_events, assert_row_counts,
    assert_thread_ramp,
};
use crate::harness::{ScenarioConfig, ScenarioHarness};
use bench_harness::ChaosConfig;
use std::time::Duration;

fn chaos_config() -> ScenarioConfig {
    ScenarioConfig {
        threads: 3,
        iterations: 20,
        latency: Duration::from_millis(5),
        downtime: Duration::from_millis(200),
        chaos: Some(ChaosConfig {
            enabled: true,
            max_interval: Duration::from_millis(100),
            grace: Duration::from_millis(500),
        }),
        // Launch gap covers provisioning so no restart hits it
        stagger: Duration::from_millis(50),
        ..ScenarioConfig::default()
    }
}

/// Workers ride out restarts by reconnecting and replaying.
#[tokio::test(start_paused = true)]
async fn workers_survive_node_restarts() {
    let config = chaos_config();
    let harness = ScenarioHarness::new(config.clone()).unwrap();

    let outcome = harness.run().await;

    let summary = &outcome.summary;
    assert_eq!(summary.failed(), 0, "reports: {:?}", summary.reports);
    assert_eq!(summary.completed(), 3);
    assert!(summary.reconnects() >= 1);

    let node = &harness.nodes()[0];
    assert!(node.restart_count() >= 1);

    let store = harness.store();
    assert_counters(store, config.threads, config.counters, 20).unwrap();
    assert_row_counts(store, config.threads, config.counters, 20, config.batch_size).unwrap();

    let telemetry = &outcome.telemetry.store;
    assert_restart_events(telemetry, 1).unwrap();
    assert_no_worker_errors(telemetry).unwrap();
    assert_thread_ramp(telemetry, config.threads).unwrap();
}

/// At most one restart is in flight: every event but the last has finished.
#[tokio::test(start_paused = true)]
async fn restarts_are_serialized() {
    let config = ScenarioConfig {
        iterations: 60,
        ..chaos_config()
    };
    let harness = ScenarioHarness::new(config).unwrap();

    let outcome = harness.run().await;

    let events = outcome.telemetry.store.events().len();
    let restarts = harness.nodes()[0].restart_count() as usize;
    assert!(events >= 2, "only {events} restarts");
    assert!(events - restarts <= 1, "{events} events, {restarts} restarts");
}

/// Without chaos no member is touched.
#[tokio::test(start_paused = true)]
async fn disabled_chaos_never_restarts() {
    let config = ScenarioConfig {
        chaos: Some(ChaosConfig::default()),
        ..chaos_config()
    };
    let harness = ScenarioHarness::new(config).unwrap();

    let outcome = harness.run().await;

    assert_eq!(outcome.summary.completed(), 3);
    assert_eq!(outcome.summary.reconnects(), 0);
    assert!(outcome.telemetry.store.events().is_empty());
    assert_eq!(harness.nodes()[0].restart_count(), 0);
}
