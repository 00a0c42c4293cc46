//! Error types for chaosbench records.

use thiserror::Error;

/// Errors that can occur while building chaosbench records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    /// Endpoint string is not `host:port`
    #[error("invalid endpoint '{0}': expected host:port")]
    InvalidEndpoint(String),

    /// Endpoint port is not a valid u16
    #[error("invalid port in endpoint '{0}'")]
    InvalidPort(String),
}
