//! # bench-types
//!
//! Shared records for the chaosbench load harness.
//!
//! This crate provides the foundational types used across all chaosbench crates:
//! - [`Stat`], [`Event`] - Telemetry samples and point-in-time annotations
//! - [`WorkerId`], [`Endpoint`] - Identity types
//! - [`series`] - Well-known series names
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod telemetry;

pub use error::TypesError;
pub use ids::{Endpoint, WorkerId};
pub use telemetry::{series, Event, Stat};
