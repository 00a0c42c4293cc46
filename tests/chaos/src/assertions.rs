//! Assertion helpers for chaos scenarios.
//!
//! Pure functions over the telemetry and store state a scenario leaves
//! behind. They take state as input and return pass/fail.

use bench_core::SeriesStore;
use bench_harness::MemoryStore;
use bench_types::{series, WorkerId};

/// Result of an assertion check.
#[derive(Debug, Clone)]
pub struct AssertionResult {
    /// Whether the assertion passed
    pub passed: bool,
    /// Description of what was checked
    pub description: String,
    /// Details on failure
    pub failure_details: Option<String>,
}

impl AssertionResult {
    /// Create a passing result.
    pub fn pass(description: &str) -> Self {
        Self {
            passed: true,
            description: description.into(),
            failure_details: None,
        }
    }

    /// Create a failing result.
    pub fn fail(description: &str, details: &str) -> Self {
        Self {
            passed: false,
            description: description.into(),
            failure_details: Some(details.into()),
        }
    }

    /// Panic with the failure details unless the check passed.
    pub fn unwrap(self) {
        assert!(
            self.passed,
            "{}: {}",
            self.description,
            self.failure_details.unwrap_or_default()
        );
    }
}

/// Values of the `THREADS` series in arrival order.
pub fn thread_values(store: &SeriesStore) -> Vec<f64> {
    store
        .series(series::THREADS, series::THREADS)
        .map(|s| s.values.clone())
        .unwrap_or_default()
}

/// Assert the live-worker count ramps up to `threads` and drains to zero.
///
/// The ramp records `0..threads-1` before each launch and `threads` once
/// all are started; each completion then records the remaining count, so
/// the drain is exactly `threads-1` down to 0.
pub fn assert_thread_ramp(store: &SeriesStore, threads: u32) -> AssertionResult {
    let description = format!("THREADS ramps 0..{threads} and back to 0");
    let values = thread_values(store);

    let ramp_len = threads as usize + 1;
    if values.len() < ramp_len {
        return AssertionResult::fail(
            &description,
            &format!("only {} samples: {:?}", values.len(), values),
        );
    }

    let (ramp, drain) = values.split_at(ramp_len);
    let expected_ramp: Vec<f64> = (0..=threads).map(f64::from).collect();
    if ramp != expected_ramp.as_slice() {
        return AssertionResult::fail(&description, &format!("ramp was {ramp:?}"));
    }
    if drain.windows(2).any(|w| w[1] > w[0]) {
        return AssertionResult::fail(&description, &format!("drain rose: {drain:?}"));
    }
    if drain.last().copied() != Some(0.0) {
        return AssertionResult::fail(&description, &format!("drain ended at {drain:?}"));
    }
    let expected_drain: Vec<f64> = (0..threads).rev().map(f64::from).collect();
    if drain != expected_drain.as_slice() {
        return AssertionResult::fail(
            &description,
            &format!("drain was {drain:?}, one sample per completion expected"),
        );
    }
    AssertionResult::pass(&description)
}

/// Assert that no worker recorded an error pulse.
pub fn assert_no_worker_errors(store: &SeriesStore) -> AssertionResult {
    let description = "no worker ERROR samples";
    match store.series(series::ERROR, series::ERROR) {
        None => AssertionResult::pass(description),
        Some(errors) if errors.values.iter().all(|v| *v == 0.0) => {
            AssertionResult::pass(description)
        }
        Some(errors) => {
            AssertionResult::fail(description, &format!("ERROR series: {:?}", errors.values))
        }
    }
}

/// Assert that every counter of every worker table holds `expected`.
pub fn assert_counters(
    store: &MemoryStore,
    threads: u32,
    counters: usize,
    expected: i64,
) -> AssertionResult {
    let description = format!("{threads} tables x {counters} counters at {expected}");
    for ordinal in 0..threads {
        let table = WorkerId::new(ordinal).table_name();
        for id in 1..=counters as i64 {
            match store.counter(&table, id) {
                Some(value) if value == expected => {}
                other => {
                    return AssertionResult::fail(
                        &description,
                        &format!("{table} row {id} holds {other:?}"),
                    )
                }
            }
        }
    }
    AssertionResult::pass(&description)
}

/// Assert each worker table holds `counters + iterations * batch` rows.
pub fn assert_row_counts(
    store: &MemoryStore,
    threads: u32,
    counters: usize,
    iterations: u32,
    batch: usize,
) -> AssertionResult {
    let expected = counters + iterations as usize * batch;
    let description = format!("{threads} tables hold {expected} rows");
    for ordinal in 0..threads {
        let table = WorkerId::new(ordinal).table_name();
        let rows = store.row_count(&table);
        if rows != expected {
            return AssertionResult::fail(&description, &format!("{table} holds {rows} rows"));
        }
    }
    AssertionResult::pass(&description)
}

/// Assert that events named `Restarted <member>` were recorded at least `min` times.
pub fn assert_restart_events(store: &SeriesStore, min: usize) -> AssertionResult {
    let description = format!("at least {min} restart events");
    let restarts = store
        .events()
        .iter()
        .filter(|e| e.name.starts_with("Restarted "))
        .count();
    if restarts >= min {
        AssertionResult::pass(&description)
    } else {
        AssertionResult::fail(&description, &format!("saw {restarts}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_types::{Event, Stat};

    fn threads_store(values: &[f64]) -> SeriesStore {
        let mut store = SeriesStore::new();
        for v in values {
            store.record_stat(Stat::new(series::THREADS, *v));
        }
        store
    }

    #[test]
    fn thread_ramp_accepts_rise_and_drain() {
        let store = threads_store(&[0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0]);
        assert!(assert_thread_ramp(&store, 3).passed);
    }

    #[test]
    fn thread_ramp_rejects_unfinished_drain() {
        let store = threads_store(&[0.0, 1.0, 2.0, 1.0]);
        let result = assert_thread_ramp(&store, 2);
        assert!(!result.passed);
        assert!(result.failure_details.unwrap().contains("ended"));
    }

    #[test]
    fn thread_ramp_rejects_short_drain() {
        // Three workers but a single completion sample
        let store = threads_store(&[0.0, 1.0, 2.0, 3.0, 0.0]);
        let result = assert_thread_ramp(&store, 3);
        assert!(!result.passed);
        assert!(result.failure_details.unwrap().contains("one sample per completion"));

        let store = threads_store(&[0.0, 1.0, 2.0, 3.0, 2.0, 2.0, 1.0, 0.0]);
        assert!(!assert_thread_ramp(&store, 3).passed);
    }

    #[test]
    fn error_pulse_fails_check() {
        let mut store = SeriesStore::new();
        store.record_stat(Stat::new(series::ERROR, 100.0));
        store.record_stat(Stat::new(series::ERROR, 0.0));
        assert!(!assert_no_worker_errors(&store).passed);
        assert!(assert_no_worker_errors(&SeriesStore::new()).passed);
    }

    #[test]
    fn restart_events_are_counted() {
        let mut store = SeriesStore::new();
        store.record_event(Event::new("Restarted db2"));
        store.record_event(Event::new("GC"));
        assert!(assert_restart_events(&store, 1).passed);
        assert!(!assert_restart_events(&store, 2).passed);
    }
}
