//! Benchmark worker task.
//!
//! Each worker owns table `test<N>`, seeds its counters, waits at the run
//! gate and then runs read-modify-write and append passes. Lifecycle
//! decisions come from [`WorkerPhase`]; this module performs the I/O.

use crate::cluster::ClusterView;
use crate::coordinator::GateState;
use crate::error::{StoreError, WorkerError};
use crate::metrics::Recorder;
use crate::store::{Session, Store};
use bench_core::{CounterSet, PhaseAction, PhaseEvent, RetryPolicy, WorkerOutcome, WorkerPhase};
use bench_types::{series, Endpoint, WorkerId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Value recorded on the `ERROR` series when a worker dies.
const ERROR_PULSE: f64 = 100.0;

/// Workload shape of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Counters per worker.
    pub counters: usize,
    /// Iterations per worker.
    pub iterations: u32,
    /// Rows appended per iteration.
    pub batch_size: usize,
    /// Reconnect policy for transient errors.
    pub retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            counters: 10,
            iterations: 10,
            batch_size: 10,
            retry: RetryPolicy::default(),
        }
    }
}

/// A replayable store operation against the worker's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Create the worker's table.
    CreateTable,
    /// Insert a counter row.
    Seed {
        /// Row id.
        id: i64,
        /// Initial value.
        value: i64,
    },
    /// Read a counter row.
    Read {
        /// Row id.
        id: i64,
    },
    /// Overwrite a counter row.
    Write {
        /// Row id.
        id: i64,
        /// New value.
        value: i64,
    },
    /// Append one zero-valued row.
    Append,
}

impl Operation {
    /// Short name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateTable => "create-table",
            Self::Seed { .. } => "seed",
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::Append => "append",
        }
    }

    /// Run against `session`. Reads yield the observed value.
    pub async fn apply(
        &self,
        session: &mut dyn Session,
        table: &str,
    ) -> Result<Option<i64>, StoreError> {
        match *self {
            Self::CreateTable => session.create_table(table).await.map(|_| None),
            Self::Seed { id, value } => session.seed_counter(table, id, value).await.map(|_| None),
            Self::Read { id } => session.read_counter(table, id).await.map(Some),
            Self::Write { id, value } => {
                session.write_counter(table, id, value).await.map(|_| None)
            }
            Self::Append => session.append_row(table).await.map(|_| None),
        }
    }
}

/// Final report of one worker, sent exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    /// Worker that reports.
    pub id: WorkerId,
    /// How it ended.
    pub outcome: WorkerOutcome,
    /// Reconnects performed over the worker's life.
    pub reconnects: u32,
}

/// One benchmark worker. Consumed by [`Worker::run`].
pub struct Worker {
    id: WorkerId,
    table: String,
    config: WorkerConfig,
    store: Arc<dyn Store>,
    cluster: Arc<ClusterView>,
    recorder: Recorder,
    counters: CounterSet,
    endpoint: Endpoint,
    session: Option<Box<dyn Session>>,
    reconnects: u32,
}

impl Worker {
    /// Create a worker bound to a random endpoint of `cluster`.
    pub fn new(
        id: WorkerId,
        config: WorkerConfig,
        store: Arc<dyn Store>,
        cluster: Arc<ClusterView>,
        recorder: Recorder,
    ) -> Self {
        let endpoint = cluster.random_endpoint().clone();
        Self {
            id,
            table: id.table_name(),
            counters: CounterSet::new(config.counters),
            config,
            store,
            cluster,
            recorder,
            endpoint,
            session: None,
            reconnects: 0,
        }
    }

    /// Run to completion and return the report.
    pub async fn run(mut self, mut gate: watch::Receiver<GateState>) -> WorkerReport {
        let mut phase = WorkerPhase::new(self.config.iterations);
        let mut next = Some(self.provision_event().await);
        let mut outcome = None;

        while let Some(event) = next.take() {
            let (new_phase, actions) = phase.on_event(event);
            phase = new_phase;

            for action in actions {
                match action {
                    PhaseAction::AwaitBarrier => next = Some(barrier_event(&mut gate).await),
                    PhaseAction::RunIteration { index } => {
                        next = Some(self.iteration_event(index, &gate).await)
                    }
                    PhaseAction::RecordErrorPulse => self.record_error_pulse().await,
                    PhaseAction::Finish(done) => outcome = Some(done),
                }
            }
        }

        let outcome = outcome.unwrap_or_else(|| WorkerOutcome::Failed {
            reason: "worker ended without an outcome".to_string(),
        });
        tracing::debug!(
            worker_id = %self.id,
            ?outcome,
            reconnects = self.reconnects,
            "worker finished"
        );

        WorkerReport {
            id: self.id,
            outcome,
            reconnects: self.reconnects,
        }
    }

    async fn provision_event(&mut self) -> PhaseEvent {
        match self.provision().await {
            Ok(()) => {
                tracing::debug!(
                    worker_id = %self.id,
                    table = %self.table,
                    endpoint = %self.endpoint,
                    "worker provisioned"
                );
                PhaseEvent::Provisioned
            }
            Err(e) => {
                tracing::error!(worker_id = %self.id, error = %e, "worker failed to provision");
                PhaseEvent::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Create the table and seed counters. No retries here.
    async fn provision(&mut self) -> Result<(), WorkerError> {
        let mut session = self.store.connect(&self.endpoint).await?;
        Operation::CreateTable
            .apply(session.as_mut(), &self.table)
            .await?;
        for index in 0..self.counters.len() {
            let seed = Operation::Seed {
                id: CounterSet::row_id(index),
                value: 0,
            };
            seed.apply(session.as_mut(), &self.table).await?;
        }
        self.session = Some(session);
        Ok(())
    }

    async fn iteration_event(
        &mut self,
        index: u32,
        gate: &watch::Receiver<GateState>,
    ) -> PhaseEvent {
        if *gate.borrow() == GateState::Stopped {
            tracing::debug!(
                worker_id = %self.id,
                iteration = index,
                "stop observed between iterations"
            );
            return PhaseEvent::StopRequested;
        }

        match self.run_iteration(index).await {
            Ok(()) => PhaseEvent::IterationCompleted,
            Err(e) => {
                tracing::error!(
                    worker_id = %self.id,
                    iteration = index,
                    error = %e,
                    "worker {} failed",
                    self.id
                );
                PhaseEvent::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn run_iteration(&mut self, index: u32) -> Result<(), WorkerError> {
        let mut read_total = Duration::ZERO;
        let mut write_total = Duration::ZERO;

        for counter in 0..self.counters.len() {
            let id = CounterSet::row_id(counter);

            let (observed, read_latency) = self.execute(Operation::Read { id }).await?;
            let observed = observed.ok_or_else(|| StoreError::MissingRow {
                table: self.table.clone(),
                id,
            })?;
            let value = self.counters.next_value(counter, observed)?;

            let (_, write_latency) = self.execute(Operation::Write { id, value }).await?;
            self.counters.commit(counter, value);

            read_total += read_latency;
            write_total += write_latency;
        }

        if !self.counters.is_empty() {
            let n = self.counters.len();
            self.recorder
                .record_value(series::SELECT, mean_ms(read_total, n))
                .await;
            self.recorder
                .record_value(series::UPDATE, mean_ms(write_total, n))
                .await;
        }

        let mut insert_total = Duration::ZERO;
        for _ in 0..self.config.batch_size {
            let (_, latency) = self.execute(Operation::Append).await?;
            insert_total += latency;
        }
        if self.config.batch_size > 0 {
            self.recorder
                .record_value(series::INSERT, mean_ms(insert_total, self.config.batch_size))
                .await;
        }

        tracing::trace!(worker_id = %self.id, iteration = index, "iteration complete");
        Ok(())
    }

    /// Run `op`, reconnecting and replaying it on transient errors.
    ///
    /// Returns the operation output and the latency of the successful attempt.
    async fn execute(&mut self, op: Operation) -> Result<(Option<i64>, Duration), WorkerError> {
        let mut attempts = 0;
        loop {
            let err = match self.attempt(op).await {
                Ok(done) => return Ok(done),
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e.into()),
            };

            if !self.config.retry.allows(attempts) {
                return Err(WorkerError::RetriesExhausted {
                    operation: op.name(),
                    attempts,
                    source: err,
                });
            }
            attempts += 1;

            let delay = self.config.retry.delay_for(attempts);
            tracing::warn!(
                worker_id = %self.id,
                operation = op.name(),
                attempt = attempts,
                error = %err,
                "transient store error, reconnecting in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;

            self.endpoint = self.cluster.random_endpoint().clone();
            self.reconnects += 1;
        }
    }

    /// One try of `op`; the session is dropped when the try fails.
    async fn attempt(&mut self, op: Operation) -> Result<(Option<i64>, Duration), StoreError> {
        let mut session = match self.session.take() {
            Some(session) => session,
            None => self.store.connect(&self.endpoint).await?,
        };

        let started = Instant::now();
        let output = op.apply(session.as_mut(), &self.table).await?;
        let latency = started.elapsed();

        self.session = Some(session);
        Ok((output, latency))
    }

    async fn record_error_pulse(&mut self) {
        self.recorder.record_value(series::ERROR, ERROR_PULSE).await;
        self.recorder.record_value(series::ERROR, 0.0).await;
    }
}

fn mean_ms(total: Duration, count: usize) -> f64 {
    total.as_secs_f64() * 1000.0 / count as f64
}

async fn barrier_event(gate: &mut watch::Receiver<GateState>) -> PhaseEvent {
    let state = gate
        .wait_for(|state| *state != GateState::Pending)
        .await
        .map(|state| *state);
    match state {
        Ok(GateState::Started) => PhaseEvent::BarrierRaised,
        // Stopped, or the coordinator is gone
        _ => PhaseEvent::StopRequested,
    }
}
