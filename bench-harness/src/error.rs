//! Error types for bench-harness.

use bench_core::{ConsistencyError, VarsError};
use std::io;

/// Child-process lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The OS refused to launch the binary (missing, not executable, ...).
    #[error("failed to spawn {name}: {source}")]
    Spawn {
        /// Logical process name.
        name: String,
        /// Underlying OS error.
        source: io::Error,
    },

    /// No child is associated with the handle.
    #[error("process {name} is not running")]
    NotRunning {
        /// Logical process name.
        name: String,
    },

    /// Log file or wait failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Benchmark store errors.
///
/// Driver errors are flattened to their message: transient classification
/// works on the text, not on driver-specific kinds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Could not establish a session.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A statement failed.
    #[error("query failed: {0}")]
    Query(String),

    /// A counter row is missing.
    #[error("row {id} missing from {table}")]
    MissingRow {
        /// Table name.
        table: String,
        /// Row id.
        id: i64,
    },
}

impl StoreError {
    /// Check whether reconnecting may resolve this error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connect(message) | Self::Query(message) => bench_core::is_transient(message),
            Self::MissingRow { .. } => false,
        }
    }
}

/// Fatal worker errors. Each one ends only the worker that hit it.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Non-transient store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The store returned a value the worker never wrote.
    #[error("consistency violation: {0}")]
    Consistency(#[from] ConsistencyError),

    /// Transient failures outlasted the retry budget.
    #[error("{operation} failed after {attempts} reconnects: {source}")]
    RetriesExhausted {
        /// Operation being replayed.
        operation: &'static str,
        /// Reconnects performed.
        attempts: u32,
        /// Last transient error.
        source: StoreError,
    },
}

/// Cluster description errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    /// Workers need at least one endpoint to connect to.
    #[error("cluster has no store endpoints")]
    NoEndpoints,
}

/// Chart and dump output errors.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Drawing backend failure.
    #[error("chart error: {0}")]
    Chart(String),

    /// JSON dump failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Status scrape errors.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// HTTP request failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Body was not valid status vars text.
    #[error("parse error: {0}")]
    Parse(#[from] VarsError),
}
