//! Workload scenarios without node restarts.

use crate::assertions::{
    assert_counters, assert_no_worker_errors, assert_row_counts, assert_thread_ramp,
};
use crate::harness::{ScenarioConfig, ScenarioHarness};
use bench_core::WorkerOutcome;
use bench_types::{series, Endpoint, WorkerId};
use std::time::Duration;

fn latency_config() -> ScenarioConfig {
    ScenarioConfig {
        latency: Duration::from_millis(5),
        ..ScenarioConfig::default()
    }
}

/// Three workers, two iterations, one node: every counter ends at 2.
#[tokio::test(start_paused = true)]
async fn clean_run_completes_every_worker() {
    let config = ScenarioConfig::default();
    let harness = ScenarioHarness::new(config.clone()).unwrap();

    let outcome = harness.run().await;

    assert_eq!(outcome.summary.completed(), 3);
    assert_eq!(outcome.summary.failed(), 0);
    assert_eq!(outcome.summary.outstanding(), 0);
    assert_eq!(outcome.summary.reconnects(), 0);
    assert!(!outcome.summary.interrupted);

    let store = harness.store();
    assert_counters(store, config.threads, config.counters, 2).unwrap();
    assert_row_counts(store, config.threads, config.counters, 2, config.batch_size).unwrap();

    let telemetry = &outcome.telemetry.store;
    assert_thread_ramp(telemetry, config.threads).unwrap();
    assert_no_worker_errors(telemetry).unwrap();
    assert!(telemetry.events().is_empty());
}

/// Each completed iteration records one latency sample per operation kind.
#[tokio::test(start_paused = true)]
async fn latencies_recorded_per_iteration() {
    let config = latency_config();
    let harness = ScenarioHarness::new(config.clone()).unwrap();

    let outcome = harness.run().await;
    let telemetry = &outcome.telemetry.store;

    let expected = (config.threads * config.iterations) as usize;
    for name in [series::SELECT, series::UPDATE, series::INSERT] {
        let samples = telemetry.series(name, name).unwrap();
        assert_eq!(samples.len(), expected, "{name} samples");
        assert!(samples.values.iter().all(|ms| *ms > 4.9), "{name}: {:?}", samples.values);
    }
}

/// A transient query error is retried on a fresh session.
#[tokio::test(start_paused = true)]
async fn transient_error_is_replayed() {
    let config = latency_config();
    let harness = ScenarioHarness::new(config.clone()).unwrap();
    let store = harness.store().clone();

    // Land the fault after every worker has provisioned
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        store.fail_next_op("connection reset by peer");
    });

    let outcome = harness.run().await;

    assert_eq!(outcome.summary.completed(), 3);
    assert_eq!(outcome.summary.reconnects(), 1);
    assert_counters(harness.store(), config.threads, config.counters, 2).unwrap();
    assert_no_worker_errors(&outcome.telemetry.store).unwrap();
}

/// Provisioning is not retried: a dead cluster fails every worker.
#[tokio::test(start_paused = true)]
async fn unreachable_cluster_fails_provisioning() {
    let harness = ScenarioHarness::new(ScenarioConfig::default()).unwrap();
    harness
        .store()
        .set_endpoint_down(&Endpoint::localhost(26257), true);

    let outcome = harness.run().await;

    assert_eq!(outcome.summary.failed(), 3);
    assert_eq!(outcome.summary.reconnects(), 0);
    for report in &outcome.summary.reports {
        let WorkerOutcome::Failed { reason } = &report.outcome else {
            panic!("worker {} did not fail: {:?}", report.id, report.outcome);
        };
        assert!(reason.contains("connection refused"), "{reason}");
    }
    assert!(!harness.store().has_table("test0"));
}

/// A counter changed behind a worker's back fails only that worker.
#[tokio::test(start_paused = true)]
async fn external_write_fails_one_worker() {
    let config = ScenarioConfig {
        iterations: 20,
        ..latency_config()
    };
    let harness = ScenarioHarness::new(config.clone()).unwrap();
    let store = harness.store().clone();
    let victim = WorkerId::new(1).table_name();

    // Every counter: a write in flight may overwrite one of them
    let counters = config.counters as i64;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        for id in 1..=counters {
            store.corrupt(&victim, id, 999);
        }
    });

    let outcome = harness.run().await;

    assert_eq!(outcome.summary.completed(), 2);
    assert_eq!(outcome.summary.failed(), 1);
    let failed = outcome
        .summary
        .reports
        .iter()
        .find(|r| r.outcome.is_failed())
        .unwrap();
    assert_eq!(failed.id, WorkerId::new(1));
    let WorkerOutcome::Failed { reason } = &failed.outcome else {
        unreachable!()
    };
    assert!(reason.contains("consistency"), "{reason}");

    let errors = outcome
        .telemetry
        .store
        .series(series::ERROR, series::ERROR)
        .unwrap();
    assert_eq!(errors.values, vec![100.0, 0.0]);
    assert_thread_ramp(&outcome.telemetry.store, config.threads).unwrap();
}

/// An interrupt stops the run and leaves unfinished workers outstanding.
#[tokio::test(start_paused = true)]
async fn interrupt_ends_run_early() {
    let config = ScenarioConfig {
        iterations: 1_000,
        ..latency_config()
    };
    let harness = ScenarioHarness::new(config.clone()).unwrap();

    let outcome = harness
        .run_until(tokio::time::sleep(Duration::from_millis(200)))
        .await;

    let summary = &outcome.summary;
    assert!(summary.interrupted);
    assert_eq!(summary.completed(), 0);
    assert_eq!(summary.reports.len() + summary.outstanding(), config.threads as usize);
}

/// Staggered launches still ramp one worker at a time.
#[tokio::test(start_paused = true)]
async fn staggered_launch_ramps_threads() {
    let config = ScenarioConfig {
        threads: 5,
        stagger: Duration::from_millis(500),
        ..latency_config()
    };
    let harness = ScenarioHarness::new(config.clone()).unwrap();

    let outcome = harness.run().await;

    assert_eq!(outcome.summary.completed(), 5);
    assert_thread_ramp(&outcome.telemetry.store, 5).unwrap();
}
