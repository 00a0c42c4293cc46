//! Supervised processes as chaos targets.
//!
//! `/bin/sh` stands in for a server binary: it prints a marker to its log
//! and then sleeps until killed.

use bench_harness::{
    ChaosConfig, ChaosInjector, ClusterMember, ClusterView, ManagedProcess, MetricsAggregator,
    ProcessSupervisor,
};
use bench_types::Endpoint;
use std::sync::Arc;
use std::time::Duration;

fn server_args(marker: &str) -> Vec<String> {
    vec!["-c".to_string(), format!("echo {marker}; exec sleep 30")]
}

async fn log_lines(process: &ManagedProcess, marker: &str) -> usize {
    tokio::fs::read_to_string(process.log_path())
        .await
        .unwrap_or_default()
        .lines()
        .filter(|line| *line == marker)
        .count()
}

/// Poll until the marker appears `count` times or a second passes.
async fn wait_for_lines(process: &ManagedProcess, marker: &str, count: usize) -> usize {
    for _ in 0..50 {
        let seen = log_lines(process, marker).await;
        if seen >= count {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    log_lines(process, marker).await
}

#[tokio::test]
async fn chaos_restarts_a_supervised_process() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = ProcessSupervisor::new(dir.path());

    let mut nodes = Vec::new();
    for name in ["db1", "db2"] {
        nodes.push(
            supervisor
                .start(name, "/bin/sh", server_args("up"))
                .await
                .unwrap(),
        );
    }
    let pids: Vec<Option<u32>> = nodes.iter().map(|n| n.pid()).collect();

    let members = nodes
        .iter()
        .map(|n| Arc::clone(n) as Arc<dyn ClusterMember>)
        .collect();
    let view = ClusterView::new(members, vec![Endpoint::localhost(26257)]).unwrap();
    let (aggregator, recorder) = MetricsAggregator::spawn(16);
    let chaos = ChaosInjector::new(
        Arc::new(view),
        recorder,
        ChaosConfig {
            enabled: true,
            max_interval: Duration::from_secs(1),
            grace: Duration::ZERO,
        },
    );

    // Each first boot has logged before any restart appends to the log
    for node in &nodes {
        assert_eq!(wait_for_lines(node, "up", 1).await, 1, "{} never booted", node.name());
    }

    let struck = chaos.strike().await.unwrap();
    for _ in 0..100 {
        if !chaos.is_restarting() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!chaos.is_restarting(), "restart of {struck} never finished");

    for (node, pid_before) in nodes.iter().zip(&pids) {
        assert!(node.is_running(), "{} not running", node.name());
        if node.name() == struck {
            assert_eq!(node.restart_count(), 1);
            assert!(node.last_restart().is_some());
            assert_ne!(node.pid(), *pid_before);
            assert_eq!(wait_for_lines(node, "up", 2).await, 2);
        } else {
            assert_eq!(node.restart_count(), 0);
            assert_eq!(node.pid(), *pid_before);
        }
    }

    let telemetry = aggregator.shutdown().await;
    let events = telemetry.store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, format!("Restarted {struck}"));

    supervisor.stop_all().await;
    assert!(nodes.iter().all(|n| !n.is_running()));
}

#[tokio::test]
async fn crashed_process_restarts_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = ProcessSupervisor::new(dir.path());

    let node = supervisor
        .start("db1", "/bin/sh", vec!["-c".into(), "echo boot; exit 7".into()])
        .await
        .unwrap();
    let status = node.wait().await.unwrap();
    assert_eq!(status.code(), Some(7));
    assert!(!node.is_running());

    // A restart after a crash does not need a live child
    node.restart().await.unwrap();
    let status = node.wait().await.unwrap();
    assert_eq!(status.code(), Some(7));
    assert_eq!(node.restart_count(), 1);
    assert_eq!(wait_for_lines(&node, "boot", 2).await, 2);
}
