//! Parser for the store's `/_status/vars` exposition text.
//!
//! Only the three SQL statement counters are of interest. Lines look like
//! `sql_insert_count 1234` (optionally with a `{labels}` suffix on the name);
//! comments and unrelated metrics are skipped.

use thiserror::Error;

/// Errors from parsing status vars.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VarsError {
    /// A counter line had an unparseable value.
    #[error("invalid value for {name}: {value}")]
    InvalidValue {
        /// Metric name.
        name: String,
        /// Raw value text.
        value: String,
    },
}

/// Cumulative SQL statement counters reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatementCounts {
    /// `sql_insert_count`
    pub inserts: f64,
    /// `sql_select_count`
    pub selects: f64,
    /// `sql_update_count`
    pub updates: f64,
}

impl StatementCounts {
    /// Per-interval increase since `previous`.
    pub fn delta(&self, previous: &StatementCounts) -> StatementCounts {
        StatementCounts {
            inserts: self.inserts - previous.inserts,
            selects: self.selects - previous.selects,
            updates: self.updates - previous.updates,
        }
    }
}

/// Parse the statement counters out of a status vars body.
///
/// Counters that appear several times (one line per label set) are summed.
pub fn parse_status_vars(body: &str) -> Result<StatementCounts, VarsError> {
    let mut counts = StatementCounts::default();

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(metric), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let name = metric.split('{').next().unwrap_or(metric);
        let slot = match name {
            "sql_insert_count" => &mut counts.inserts,
            "sql_select_count" => &mut counts.selects,
            "sql_update_count" => &mut counts.updates,
            _ => continue,
        };
        let value: f64 = value.parse().map_err(|_| VarsError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        })?;
        *slot += value;
    }

    Ok(counts)
}
