//! # chaosbench-scenarios
//!
//! End-to-end scenarios for the chaosbench harness.
//!
//! Workload and chaos scenarios run against the in-memory store, so they
//! need no server binary. Supervisor scenarios spawn `/bin/sh` and only
//! build on unix.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assertions;
pub mod harness;

pub mod scenarios;
