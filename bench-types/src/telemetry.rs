//! Telemetry records produced by workers, samplers and the chaos injector.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Well-known series names.
pub mod series {
    /// Live worker count.
    pub const THREADS: &str = "threads";
    /// Fatal worker error pulses.
    pub const ERROR: &str = "ERROR";
    /// Mean read latency per counter pass (ms).
    pub const SELECT: &str = "SELECT";
    /// Mean write latency per counter pass (ms).
    pub const UPDATE: &str = "UPDATE";
    /// Mean insert latency per append pass (ms).
    pub const INSERT: &str = "INSERT";
    /// Host counters (label `CPU`).
    pub const SYSTEM: &str = "SYSTEM";
    /// Store-internal statement counters.
    pub const STORE: &str = "COCKROACH";
}

/// One telemetry sample.
///
/// Immutable once created. The label defaults to the series name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    /// When the sample was taken.
    pub time: SystemTime,
    /// Series name.
    pub name: String,
    /// Optional label within the series.
    pub label: Option<String>,
    /// Sample value.
    pub value: f64,
}

impl Stat {
    /// Create an unlabeled sample taken now.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            time: SystemTime::now(),
            name: name.into(),
            label: None,
            value,
        }
    }

    /// Create a labeled sample taken now.
    pub fn labeled(name: impl Into<String>, label: impl Into<String>, value: f64) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new(name, value)
        }
    }

    /// Override the sample time.
    pub fn at(mut self, time: SystemTime) -> Self {
        self.time = time;
        self
    }

    /// Effective label: the explicit label, or the series name.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// A point-in-time annotation, e.g. "Restarted db2".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// When the event happened.
    pub time: SystemTime,
    /// Annotation text.
    pub name: String,
}

impl Event {
    /// Create an event happening now.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            time: SystemTime::now(),
            name: name.into(),
        }
    }

    /// Override the event time.
    pub fn at(mut self, time: SystemTime) -> Self {
        self.time = time;
        self
    }
}
