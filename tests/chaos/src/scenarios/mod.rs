//! End-to-end chaos scenarios.
//!
//! - `workload` - full runs without faults, injected store faults, interrupts
//! - `restarts` - chaos restarts of memory nodes during a live run
//! - `processes` - supervised `/bin/sh` processes as cluster members (unix)
//!
//! Memory-backed scenarios run on paused tokio time: store latency, node
//! downtime and retry backoff all advance virtually.

#[cfg(test)]
mod workload;

#[cfg(test)]
mod restarts;

#[cfg(all(test, unix))]
mod processes;
