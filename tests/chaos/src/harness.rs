//! Scenario harness over the in-memory store.
//!
//! Builds a cluster of [`MemoryNode`]s sharing one [`MemoryStore`], runs a
//! coordinator against it and hands back everything a scenario asserts on.

use bench_core::RetryPolicy;
use bench_harness::{
    ChaosConfig, ChaosInjector, ClusterError, ClusterMember, ClusterView, CoordinatorConfig,
    MemoryNode, MemoryStore, MetricsAggregator, RunSummary, RunTelemetry, WorkerConfig,
    WorkerCoordinator,
};
use bench_types::Endpoint;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// First port of the simulated cluster.
const BASE_PORT: u16 = 26257;

/// Shape of a scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Cluster size.
    pub nodes: u16,
    /// Workers.
    pub threads: u32,
    /// Iterations per worker.
    pub iterations: u32,
    /// Counters per worker.
    pub counters: usize,
    /// Rows appended per iteration.
    pub batch_size: usize,
    /// Delay between worker launches.
    pub stagger: Duration,
    /// Latency of every store operation.
    pub latency: Duration,
    /// How long a restarted node stays down.
    pub downtime: Duration,
    /// Chaos schedule, if any.
    pub chaos: Option<ChaosConfig>,
    /// Worker reconnect policy.
    pub retry: RetryPolicy,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            nodes: 1,
            threads: 3,
            iterations: 2,
            counters: 4,
            batch_size: 2,
            stagger: Duration::ZERO,
            latency: Duration::ZERO,
            downtime: Duration::from_millis(200),
            chaos: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ScenarioConfig {
    fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            threads: self.threads,
            stagger: self.stagger,
            worker: WorkerConfig {
                counters: self.counters,
                iterations: self.iterations,
                batch_size: self.batch_size,
                retry: self.retry,
            },
        }
    }
}

/// A simulated cluster ready to run scenarios.
pub struct ScenarioHarness {
    config: ScenarioConfig,
    store: MemoryStore,
    nodes: Vec<Arc<MemoryNode>>,
    view: Arc<ClusterView>,
}

/// Everything a finished scenario left behind.
pub struct ScenarioOutcome {
    /// Coordinator summary.
    pub summary: RunSummary,
    /// Aggregated telemetry.
    pub telemetry: RunTelemetry,
}

impl ScenarioHarness {
    /// Build the cluster described by `config`. Fails with zero nodes.
    pub fn new(config: ScenarioConfig) -> Result<Self, ClusterError> {
        let store = MemoryStore::new().with_latency(config.latency);
        let endpoints: Vec<Endpoint> = (0..config.nodes)
            .map(|i| Endpoint::localhost(BASE_PORT + i))
            .collect();
        let nodes: Vec<Arc<MemoryNode>> = endpoints
            .iter()
            .enumerate()
            .map(|(i, endpoint)| {
                Arc::new(MemoryNode::new(
                    format!("db{}", i + 1),
                    endpoint.clone(),
                    store.clone(),
                    config.downtime,
                ))
            })
            .collect();
        let members = nodes
            .iter()
            .map(|n| Arc::clone(n) as Arc<dyn ClusterMember>)
            .collect();
        let view = Arc::new(ClusterView::new(members, endpoints)?);

        Ok(Self {
            config,
            store,
            nodes,
            view,
        })
    }

    /// Shared store, for fault injection and state checks.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Simulated nodes.
    pub fn nodes(&self) -> &[Arc<MemoryNode>] {
        &self.nodes
    }

    /// Cluster view shared with workers.
    pub fn view(&self) -> Arc<ClusterView> {
        Arc::clone(&self.view)
    }

    /// Run to completion.
    pub async fn run(&self) -> ScenarioOutcome {
        self.run_until(std::future::pending()).await
    }

    /// Run until every worker reports or `interrupt` resolves.
    pub async fn run_until<F>(&self, interrupt: F) -> ScenarioOutcome
    where
        F: Future<Output = ()>,
    {
        let (aggregator, recorder) = MetricsAggregator::spawn(bench_harness::DEFAULT_CAPACITY);

        let mut coordinator = WorkerCoordinator::new(
            self.config.coordinator(),
            Arc::new(self.store.clone()),
            self.view(),
            recorder.clone(),
        );
        if let Some(chaos) = &self.config.chaos {
            coordinator = coordinator.with_chaos(ChaosInjector::new(
                self.view(),
                recorder,
                chaos.clone(),
            ));
        }

        let summary = coordinator.run(interrupt).await;
        tracing::debug!(
            completed = summary.completed(),
            failed = summary.failed(),
            "scenario finished"
        );
        let telemetry = aggregator.shutdown().await;
        ScenarioOutcome { summary, telemetry }
    }
}
