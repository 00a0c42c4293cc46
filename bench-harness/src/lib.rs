//! # bench-harness
//!
//! Async engine for chaosbench.
//!
//! This crate owns everything that touches processes, sockets and disk:
//!
//! - [`supervisor`]: child-process lifecycle with forced restart
//! - [`metrics`]: single-writer telemetry aggregator and chart rendering
//! - [`store`]: the benchmark target behind a narrow session trait
//! - [`worker`] / [`coordinator`]: the concurrent read-modify-write workload
//! - [`chaos`]: random restarts of live cluster members
//! - [`sampler`]: host CPU and store statement counters
//!
//! State transitions and bookkeeping are delegated to `bench-core`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chaos;
pub mod cluster;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod sampler;
pub mod store;
pub mod supervisor;
pub mod worker;

pub use chaos::{ChaosConfig, ChaosInjector};
pub use cluster::{ClusterMember, ClusterView};
pub use coordinator::{CoordinatorConfig, GateState, RunGate, RunSummary, WorkerCoordinator};
pub use error::{
    ClusterError, RenderError, ScrapeError, StoreError, SupervisorError, WorkerError,
};
pub use metrics::{MetricsAggregator, Recorder, RunTelemetry, DEFAULT_CAPACITY};
pub use store::{MemoryNode, MemoryStore, PgStore, Session, Store};
pub use supervisor::{ManagedProcess, ProcessSupervisor};
pub use worker::{Operation, Worker, WorkerConfig, WorkerReport};
