//! Named, labeled telemetry series plus the run's event log.
//!
//! [`SeriesStore`] is plain data: it is owned and mutated by exactly one
//! task (the metrics aggregator) and handed to rendering once the run ends.
//! Samples within a series keep their arrival order.

use bench_types::{Event, Stat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;

/// Lower bound of the observed maximum used for chart y ranges.
pub const MIN_Y_BOUND: f64 = 100.0;

/// Vertical position at which event annotations are drawn.
pub const EVENT_MARKER_Y: f64 = 80.0;

/// Headroom factor applied above the observed maximum.
const Y_HEADROOM: f64 = 1.2;

/// One (name, label) series in arrival order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Series {
    /// Sample times.
    pub times: Vec<SystemTime>,
    /// Sample values, parallel to `times`.
    pub values: Vec<f64>,
}

impl Series {
    /// Append one sample.
    pub fn push(&mut self, time: SystemTime, value: f64) {
        self.times.push(time);
        self.values.push(value);
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the series has no samples.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(time, value)` pairs in arrival order.
    pub fn points(&self) -> impl Iterator<Item = (SystemTime, f64)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }

    /// Largest value, if any.
    pub fn max_value(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }
}

/// All series of a run, grouped by name then label, plus events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeriesStore {
    groups: BTreeMap<String, BTreeMap<String, Series>>,
    events: Vec<Event>,
}

impl SeriesStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample to its (name, label) series.
    pub fn record_stat(&mut self, stat: Stat) {
        let label = stat.label().to_string();
        self.groups
            .entry(stat.name)
            .or_default()
            .entry(label)
            .or_default()
            .push(stat.time, stat.value);
    }

    /// Append an event to the event log.
    pub fn record_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Series names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// All labels of one series name, sorted by label.
    pub fn group(&self, name: &str) -> Option<&BTreeMap<String, Series>> {
        self.groups.get(name)
    }

    /// One (name, label) series.
    pub fn series(&self, name: &str, label: &str) -> Option<&Series> {
        self.groups.get(name)?.get(label)
    }

    /// Events in arrival order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Total number of samples across all series.
    pub fn sample_count(&self) -> usize {
        self.groups
            .values()
            .flat_map(BTreeMap::values)
            .map(Series::len)
            .sum()
    }

    /// Upper y bound for the chart of `name`.
    ///
    /// `max(MIN_Y_BOUND, observed max) * 1.2`.
    pub fn y_upper_bound(&self, name: &str) -> f64 {
        let observed = self
            .groups
            .get(name)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter_map(Series::max_value)
            .fold(MIN_Y_BOUND, f64::max);
        observed * Y_HEADROOM
    }

    /// Latest sample or event time in the store.
    pub fn last_time(&self) -> Option<SystemTime> {
        let samples = self
            .groups
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(|s| s.times.iter().copied());
        let events = self.events.iter().map(|e| e.time);
        samples.chain(events).max()
    }
}
