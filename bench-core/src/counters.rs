//! Expected-value tracking for the counters a worker increments.
//!
//! Every worker owns a fixed set of counter rows. Before each increment the
//! observed value is compared with what the worker last wrote; a mismatch is
//! a correctness violation of the store, never a transient fault.

use thiserror::Error;

/// Observed counter value disagrees with the value the worker last committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("counter {index}: expected value to be {expected}, but found {found}")]
pub struct ConsistencyError {
    /// Zero-based counter index.
    pub index: usize,
    /// Value the worker last committed.
    pub expected: i64,
    /// Value the store returned.
    pub found: i64,
}

/// Expected values of a worker's counters.
///
/// The length is fixed at creation. Counter `i` lives in row id `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSet {
    expected: Vec<i64>,
}

impl CounterSet {
    /// Create `len` counters, all expected to be zero.
    pub fn new(len: usize) -> Self {
        Self {
            expected: vec![0; len],
        }
    }

    /// Number of counters.
    pub fn len(&self) -> usize {
        self.expected.len()
    }

    /// True when there are no counters.
    pub fn is_empty(&self) -> bool {
        self.expected.is_empty()
    }

    /// Row id holding counter `index`.
    pub fn row_id(index: usize) -> i64 {
        index as i64 + 1
    }

    /// Expected value of counter `index`.
    pub fn expected(&self, index: usize) -> Option<i64> {
        self.expected.get(index).copied()
    }

    /// All expected values, in counter order.
    pub fn values(&self) -> &[i64] {
        &self.expected
    }

    /// Verify an observed value and return the value to write next.
    ///
    /// Does not change the expectation; call [`CounterSet::commit`] once the
    /// write has been acknowledged.
    pub fn next_value(&self, index: usize, observed: i64) -> Result<i64, ConsistencyError> {
        let expected = self.expected[index];
        if observed != expected {
            return Err(ConsistencyError {
                index,
                expected,
                found: observed,
            });
        }
        Ok(expected + 1)
    }

    /// Record that `value` was written to counter `index`.
    pub fn commit(&mut self, index: usize, value: i64) {
        self.expected[index] = value;
    }
}
