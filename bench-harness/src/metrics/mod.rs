//! Single-writer telemetry aggregator.
//!
//! Producers hold a cheap [`Recorder`] and push [`Stat`]s and [`Event`]s
//! through two bounded queues. One consumer task owns the [`SeriesStore`]
//! and is the only code that ever mutates it.

mod render;

pub use render::{chart_file_name, format_elapsed, CHART_SIZE};

use crate::error::RenderError;
use bench_core::SeriesStore;
use bench_types::{Event, Stat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Default queue capacity for stats and events (each).
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Producer handle. Clone freely.
///
/// Sends wait only when the queue is full. Once the aggregator has shut
/// down, recording is a no-op.
#[derive(Debug, Clone)]
pub struct Recorder {
    stats: mpsc::Sender<Stat>,
    events: mpsc::Sender<Event>,
}

impl Recorder {
    /// Record a sample.
    pub async fn record(&self, stat: Stat) {
        if self.stats.send(stat).await.is_err() {
            tracing::trace!("aggregator closed, dropping stat");
        }
    }

    /// Record an event annotation.
    pub async fn event(&self, event: Event) {
        if self.events.send(event).await.is_err() {
            tracing::trace!("aggregator closed, dropping event");
        }
    }

    /// Record an unlabeled sample taken now.
    pub async fn record_value(&self, name: &str, value: f64) {
        self.record(Stat::new(name, value)).await;
    }

    /// Record a labeled sample taken now.
    pub async fn record_labeled(&self, name: &str, label: &str, value: f64) {
        self.record(Stat::labeled(name, label, value)).await;
    }
}

/// Handle to the running consumer task.
#[derive(Debug)]
pub struct MetricsAggregator {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<SeriesStore>,
    started_at: SystemTime,
}

impl MetricsAggregator {
    /// Spawn the consumer with `capacity` slots per queue.
    pub fn spawn(capacity: usize) -> (Self, Recorder) {
        let capacity = capacity.max(1);
        let (stats_tx, stats_rx) = mpsc::channel(capacity);
        let (events_tx, events_rx) = mpsc::channel(capacity);
        let (stop_tx, stop_rx) = oneshot::channel();

        let task = tokio::spawn(consume(stats_rx, events_rx, stop_rx));
        tracing::debug!(capacity, "metrics aggregator started");

        let aggregator = Self {
            stop_tx,
            task,
            started_at: SystemTime::now(),
        };
        let recorder = Recorder {
            stats: stats_tx,
            events: events_tx,
        };
        (aggregator, recorder)
    }

    /// When the aggregator was spawned (chart time origin).
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Stop the consumer, drain what is buffered and hand over the series.
    pub async fn shutdown(self) -> RunTelemetry {
        let _ = self.stop_tx.send(());
        let store = match self.task.await {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(error = %e, "metrics aggregator task failed");
                SeriesStore::new()
            }
        };
        tracing::debug!(samples = store.sample_count(), "metrics aggregator stopped");

        RunTelemetry {
            store,
            started_at: self.started_at,
            stopped_at: SystemTime::now(),
        }
    }
}

async fn consume(
    mut stats: mpsc::Receiver<Stat>,
    mut events: mpsc::Receiver<Event>,
    mut stop: oneshot::Receiver<()>,
) -> SeriesStore {
    let mut store = SeriesStore::new();

    loop {
        tokio::select! {
            Some(stat) = stats.recv() => store.record_stat(stat),
            Some(event) = events.recv() => store.record_event(event),
            _ = &mut stop => break,
        }
    }

    // Refuse new messages, keep what is already queued
    stats.close();
    events.close();
    while let Ok(stat) = stats.try_recv() {
        store.record_stat(stat);
    }
    while let Ok(event) = events.try_recv() {
        store.record_event(event);
    }

    store
}

/// Everything collected during one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTelemetry {
    /// Series and events.
    pub store: SeriesStore,
    /// Aggregator start, the chart time origin.
    pub started_at: SystemTime,
    /// Aggregator shutdown.
    pub stopped_at: SystemTime,
}

impl RunTelemetry {
    /// Render one chart per series name into `dir`.
    ///
    /// Files are named `<series>-<suffix>`; returns the written paths.
    pub fn render(&self, dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, RenderError> {
        render::render_all(self, dir, suffix)
    }

    /// Dump series and events as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), RenderError> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Seconds between the time origin and `time` (0 before the origin).
    pub fn elapsed_secs(&self, time: SystemTime) -> f64 {
        time.duration_since(self.started_at)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}
