//! Worker fan-out, start barrier and completion accounting.

use crate::chaos::ChaosInjector;
use crate::cluster::ClusterView;
use crate::metrics::Recorder;
use crate::store::Store;
use crate::worker::{Worker, WorkerConfig, WorkerReport};
use bench_types::{series, WorkerId};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// State of the shared run gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Workers are provisioning; timed work has not started.
    Pending,
    /// Timed work may run.
    Started,
    /// Workers should stop at the next check.
    Stopped,
}

/// Start barrier and cooperative stop signal shared by all workers.
#[derive(Debug)]
pub struct RunGate {
    tx: watch::Sender<GateState>,
}

impl RunGate {
    /// Create a gate in the `Pending` state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(GateState::Pending);
        Self { tx }
    }

    /// Receiver for one worker.
    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.tx.subscribe()
    }

    /// Release every waiting worker.
    pub fn start(&self) {
        self.tx.send_replace(GateState::Started);
    }

    /// Ask every worker to stop.
    pub fn stop(&self) {
        self.tx.send_replace(GateState::Stopped);
    }

    /// Current state.
    pub fn state(&self) -> GateState {
        *self.tx.borrow()
    }
}

impl Default for RunGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Run shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Number of workers.
    pub threads: u32,
    /// Delay between worker launches.
    pub stagger: Duration,
    /// Per-worker workload.
    pub worker: WorkerConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            threads: 10,
            stagger: Duration::from_millis(500),
            worker: WorkerConfig::default(),
        }
    }
}

/// Result of a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Workers launched.
    pub threads: u32,
    /// Reports received, in completion order.
    pub reports: Vec<WorkerReport>,
    /// Run ended by an interrupt.
    pub interrupted: bool,
}

impl RunSummary {
    fn count(&self, pred: impl Fn(&WorkerReport) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(r)).count()
    }

    /// Workers that ran every iteration.
    pub fn completed(&self) -> usize {
        self.count(|r| r.outcome.is_completed())
    }

    /// Workers that died on a fatal error.
    pub fn failed(&self) -> usize {
        self.count(|r| r.outcome.is_failed())
    }

    /// Workers that stopped cooperatively.
    pub fn aborted(&self) -> usize {
        self.reports.len() - self.completed() - self.failed()
    }

    /// Workers that never reported.
    pub fn outstanding(&self) -> usize {
        (self.threads as usize).saturating_sub(self.reports.len())
    }

    /// Reconnects across all reporting workers.
    pub fn reconnects(&self) -> u32 {
        self.reports.iter().map(|r| r.reconnects).sum()
    }
}

/// Launches workers and drives the run's control loop.
pub struct WorkerCoordinator {
    config: CoordinatorConfig,
    store: Arc<dyn Store>,
    cluster: Arc<ClusterView>,
    recorder: Recorder,
    chaos: Option<ChaosInjector>,
}

impl WorkerCoordinator {
    /// Create a coordinator without chaos injection.
    pub fn new(
        config: CoordinatorConfig,
        store: Arc<dyn Store>,
        cluster: Arc<ClusterView>,
        recorder: Recorder,
    ) -> Self {
        Self {
            config,
            store,
            cluster,
            recorder,
            chaos: None,
        }
    }

    /// Attach a chaos injector; its schedule runs while workers are live.
    pub fn with_chaos(mut self, chaos: ChaosInjector) -> Self {
        self.chaos = Some(chaos);
        self
    }

    /// Run all workers until they finish or `interrupt` resolves.
    ///
    /// On interrupt the gate is stopped and the summary returned at once;
    /// workers still running are abandoned.
    pub async fn run<F>(self, interrupt: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);

        let threads = self.config.threads;
        let gate = RunGate::new();
        let mut summary = RunSummary {
            threads,
            ..RunSummary::default()
        };
        let mut completions = FuturesUnordered::new();

        for ordinal in 0..threads {
            self.recorder
                .record_value(series::THREADS, f64::from(ordinal))
                .await;

            let id = WorkerId::new(ordinal);
            let worker = Worker::new(
                id,
                self.config.worker.clone(),
                Arc::clone(&self.store),
                Arc::clone(&self.cluster),
                self.recorder.clone(),
            );
            let (report_tx, report_rx) = oneshot::channel();
            let gate_rx = gate.subscribe();
            tokio::spawn(async move {
                let report = worker.run(gate_rx).await;
                let _ = report_tx.send(report);
            });
            completions.push(async move { (id, report_rx.await) });
            tracing::debug!(worker_id = %id, "worker launched");

            tokio::select! {
                _ = tokio::time::sleep(self.config.stagger) => {}
                _ = &mut interrupt => {
                    tracing::info!(launched = ordinal + 1, "interrupted during worker launch");
                    gate.stop();
                    summary.interrupted = true;
                    return summary;
                }
            }
        }

        gate.start();
        self.recorder
            .record_value(series::THREADS, f64::from(threads))
            .await;
        tracing::info!(threads, "run started");

        let (trigger_tx, mut trigger_rx) = mpsc::channel(1);
        let schedule = self
            .chaos
            .as_ref()
            .and_then(|chaos| chaos.spawn_schedule(trigger_tx));

        let mut live = threads;
        while live > 0 {
            tokio::select! {
                Some((id, result)) = completions.next() => {
                    live -= 1;
                    self.recorder.record_value(series::THREADS, f64::from(live)).await;
                    match result {
                        Ok(report) => {
                            tracing::info!(
                                worker_id = %id,
                                outcome = ?report.outcome,
                                reconnects = report.reconnects,
                                live,
                                "worker finished"
                            );
                            summary.reports.push(report);
                        }
                        Err(_) => {
                            tracing::warn!(worker_id = %id, live, "worker exited without reporting")
                        }
                    }
                }
                _ = &mut interrupt => {
                    tracing::info!(live, "interrupt received, stopping run");
                    gate.stop();
                    summary.interrupted = true;
                    break;
                }
                Some(()) = trigger_rx.recv() => {
                    if let Some(chaos) = &self.chaos {
                        match chaos.strike().await {
                            Some(member) => {
                                tracing::info!(member = %member, "chaos restart triggered")
                            }
                            None => tracing::debug!("chaos trigger skipped, restart in flight"),
                        }
                    }
                }
            }
        }

        if let Some(schedule) = schedule {
            schedule.abort();
        }
        gate.stop();

        tracing::info!(
            completed = summary.completed(),
            failed = summary.failed(),
            aborted = summary.aborted(),
            outstanding = summary.outstanding(),
            "run finished"
        );
        summary
    }
}
