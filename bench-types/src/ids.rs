//! Identity types for chaosbench.

use crate::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordinal identifier of a benchmark worker.
///
/// Workers are numbered from 0 in creation order. The ordinal also names
/// the worker's private table (`test<N>`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(u32);

impl WorkerId {
    /// Create a WorkerId from its ordinal.
    pub fn new(ordinal: u32) -> Self {
        Self(ordinal)
    }

    /// Get the ordinal of this worker.
    pub fn ordinal(&self) -> u32 {
        self.0
    }

    /// Name of the table this worker provisions and owns.
    pub fn table_name(&self) -> String {
        format!("test{}", self.0)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkerId({})", self.0)
    }
}

/// A reachable store endpoint.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Endpoint on the loopback host.
    pub fn localhost(port: u16) -> Self {
        Self::new("localhost", port)
    }

    /// Host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for Endpoint {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| TypesError::InvalidEndpoint(s.to_string()))?;
        if host.is_empty() {
            return Err(TypesError::InvalidEndpoint(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| TypesError::InvalidPort(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint({}:{})", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_table_name() {
        assert_eq!(WorkerId::new(0).table_name(), "test0");
        assert_eq!(WorkerId::new(12).table_name(), "test12");
    }

    #[test]
    fn worker_ordering() {
        assert!(WorkerId::new(1) < WorkerId::new(2));
    }

    #[test]
    fn endpoint_parse() {
        let endpoint: Endpoint = "localhost:26257".parse().unwrap();
        assert_eq!(endpoint.host(), "localhost");
        assert_eq!(endpoint.port(), 26257);
        assert_eq!(endpoint.to_string(), "localhost:26257");
    }

    #[test]
    fn endpoint_parse_errors() {
        assert!(matches!(
            "localhost".parse::<Endpoint>(),
            Err(TypesError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            ":26257".parse::<Endpoint>(),
            Err(TypesError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            "localhost:99999".parse::<Endpoint>(),
            Err(TypesError::InvalidPort(_))
        ));
    }

    #[test]
    fn endpoint_serde() {
        let endpoint = Endpoint::localhost(26258);
        let json = serde_json::to_string(&endpoint).unwrap();
        let restored: Endpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(endpoint, restored);
    }
}
