//! Cluster bring-up and teardown.
//!
//! Nodes are started as `db1..dbN`, all joining each other, then the
//! cluster is initialized and the workload database created through
//! one-shot invocations of the same binary.

use crate::config::BenchConfig;
use anyhow::{bail, Context, Result};
use bench_harness::{
    ClusterMember, ClusterView, ManagedProcess, MemoryNode, MemoryStore, ProcessSupervisor,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Simulated downtime of a memory node restart.
const MEMORY_NODE_DOWNTIME: Duration = Duration::from_secs(2);

/// A running cluster of supervised server processes.
pub struct Cluster {
    supervisor: ProcessSupervisor,
    nodes: Vec<Arc<ManagedProcess>>,
    store_dirs: Vec<PathBuf>,
    keep_data: bool,
}

/// Arguments for node `index` (1-based).
pub fn node_args(config: &BenchConfig, index: u32) -> Vec<String> {
    let cluster = &config.cluster;
    let join = config
        .endpoints()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    vec![
        "start".to_string(),
        "--insecure".to_string(),
        format!("--store={}", store_dir(config, index).display()),
        format!("--listen-addr={}:{}", cluster.host, cluster.base_port + (index - 1) as u16),
        format!("--http-addr={}:{}", cluster.host, cluster.http_base_port + (index - 1) as u16),
        format!("--join={join}"),
    ]
}

fn store_dir(config: &BenchConfig, index: u32) -> PathBuf {
    config.cluster.work_dir.join(format!("node{index}"))
}

fn first_host(config: &BenchConfig) -> String {
    format!("--host={}:{}", config.cluster.host, config.cluster.base_port)
}

impl Cluster {
    /// Start every node, initialize the cluster and create the database.
    pub async fn bring_up(config: &BenchConfig) -> Result<Self> {
        let log_dir = config.cluster.work_dir.join("logs");
        tokio::fs::create_dir_all(&log_dir)
            .await
            .context("Failed to create log directory")?;

        let supervisor = ProcessSupervisor::new(log_dir);
        let binary = &config.cluster.binary;
        let mut nodes = Vec::new();
        let mut store_dirs = Vec::new();

        for index in 1..=config.cluster.nodes {
            let name = format!("db{index}");
            let node = supervisor
                .start(&name, binary, node_args(config, index))
                .await
                .with_context(|| format!("Failed to start {name}"))?;
            nodes.push(node);
            store_dirs.push(store_dir(config, index));
        }

        let cluster = Self {
            supervisor,
            nodes,
            store_dirs,
            keep_data: config.cluster.keep_data,
        };

        // Tear down what was started if the cluster never becomes usable
        if let Err(e) = cluster.initialize(config).await {
            cluster.teardown().await;
            return Err(e);
        }
        Ok(cluster)
    }

    async fn initialize(&self, config: &BenchConfig) -> Result<()> {
        let binary = &config.cluster.binary;

        self.one_shot(
            "init",
            binary,
            vec!["init".into(), "--insecure".into(), first_host(config)],
        )
        .await?;

        let create = format!("CREATE DATABASE IF NOT EXISTS {};", config.cluster.database);
        self.one_shot(
            "createDB",
            binary,
            vec![
                "sql".into(),
                "--insecure".into(),
                first_host(config),
                "-e".into(),
                create,
            ],
        )
        .await?;

        tokio::time::sleep(Duration::from_secs(config.cluster.settle_secs)).await;
        tracing::info!(nodes = self.nodes.len(), "cluster ready");
        Ok(())
    }

    async fn one_shot(&self, name: &str, binary: &Path, args: Vec<String>) -> Result<()> {
        let process = self
            .supervisor
            .start(name, binary, args)
            .await
            .with_context(|| format!("Failed to start {name}"))?;
        let status = process
            .wait()
            .await
            .with_context(|| format!("Failed to wait for {name}"))?;
        if !status.success() {
            bail!(
                "{name} exited with {status}, see {}",
                process.log_path().display()
            );
        }
        Ok(())
    }

    /// Cluster members and endpoints for the run.
    pub fn view(&self, config: &BenchConfig) -> Result<ClusterView> {
        let members = self
            .nodes
            .iter()
            .map(|node| Arc::clone(node) as Arc<dyn ClusterMember>)
            .collect();
        ClusterView::new(members, config.endpoints()).context("Invalid cluster view")
    }

    /// Stop every process and remove node stores unless asked to keep them.
    pub async fn teardown(&self) {
        self.supervisor.stop_all().await;
        if self.keep_data {
            return;
        }
        for dir in &self.store_dirs {
            if let Err(e) = tokio::fs::remove_dir_all(dir).await {
                tracing::debug!(dir = %dir.display(), error = %e, "failed to remove store");
            }
        }
    }
}

/// In-process cluster for dry runs: one memory node per configured node.
pub fn memory_cluster(config: &BenchConfig) -> Result<(MemoryStore, ClusterView)> {
    let store = MemoryStore::new();
    let endpoints = config.endpoints();
    let members = endpoints
        .iter()
        .enumerate()
        .map(|(i, endpoint)| {
            Arc::new(MemoryNode::new(
                format!("db{}", i + 1),
                endpoint.clone(),
                store.clone(),
                MEMORY_NODE_DOWNTIME,
            )) as Arc<dyn ClusterMember>
        })
        .collect();
    let view = ClusterView::new(members, endpoints).context("Invalid cluster view")?;
    Ok((store, view))
}
