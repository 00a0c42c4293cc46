//! Read-only view of the cluster under test.

use crate::error::{ClusterError, SupervisorError};
use async_trait::async_trait;
use bench_types::Endpoint;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// A cluster member the chaos injector can bounce.
#[async_trait]
pub trait ClusterMember: Send + Sync {
    /// Stable logical name (e.g. `db2`).
    fn name(&self) -> &str;

    /// Stop the member and start it again with the same identity.
    async fn restart(&self) -> Result<(), SupervisorError>;
}

/// Cluster members plus the store endpoints workers connect to.
///
/// Built once after bring-up and shared read-only.
#[derive(Clone)]
pub struct ClusterView {
    members: Vec<Arc<dyn ClusterMember>>,
    endpoints: Vec<Endpoint>,
}

impl ClusterView {
    /// Create a view. At least one endpoint is required.
    pub fn new(
        members: Vec<Arc<dyn ClusterMember>>,
        endpoints: Vec<Endpoint>,
    ) -> Result<Self, ClusterError> {
        if endpoints.is_empty() {
            return Err(ClusterError::NoEndpoints);
        }
        Ok(Self { members, endpoints })
    }

    /// Members in bring-up order.
    pub fn members(&self) -> &[Arc<dyn ClusterMember>] {
        &self.members
    }

    /// Store endpoints in bring-up order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Uniformly random endpoint.
    pub fn random_endpoint(&self) -> &Endpoint {
        let index = rand::thread_rng().gen_range(0..self.endpoints.len());
        &self.endpoints[index]
    }

    /// Uniformly random member, `None` when there are none.
    pub fn random_member(&self) -> Option<&Arc<dyn ClusterMember>> {
        self.members.choose(&mut rand::thread_rng())
    }
}

impl fmt::Debug for ClusterView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.members.iter().map(|m| m.name()).collect();
        f.debug_struct("ClusterView")
            .field("members", &names)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}
