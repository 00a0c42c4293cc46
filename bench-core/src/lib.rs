//! # bench-core
//!
//! Pure logic for chaosbench (no I/O, instant tests).
//!
//! This crate implements the state machines and bookkeeping of the load
//! harness without any process, network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`series`] holds the telemetry series owned by the aggregator task
//! - [`phase`] is the per-worker lifecycle state machine
//! - [`counters`] tracks the expected value of every counter under test
//! - [`retry`] classifies store errors and computes reconnect backoff
//! - [`vars`] parses the store's status counters
//!
//! The actual I/O (child processes, SQL sessions, rendering) is performed by
//! `bench-harness`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod counters;
pub mod phase;
pub mod retry;
pub mod series;
pub mod vars;

pub use counters::{ConsistencyError, CounterSet};
pub use phase::{PhaseAction, PhaseEvent, WorkerOutcome, WorkerPhase};
pub use retry::{is_transient, RetryPolicy};
pub use series::{Series, SeriesStore, EVENT_MARKER_Y, MIN_Y_BOUND};
pub use vars::{parse_status_vars, StatementCounts, VarsError};
