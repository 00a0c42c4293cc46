//! In-memory store with fault injection.
//!
//! Shared by every session it hands out, so tests can corrupt rows, take
//! endpoints down and queue failures while workers are running.

use super::{Session, Store};
use crate::cluster::ClusterMember;
use crate::error::{StoreError, SupervisorError};
use async_trait::async_trait;
use bench_types::Endpoint;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// In-memory store for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    tables: HashMap<String, Table>,
    down: HashSet<Endpoint>,
    fail_next_connect: Option<String>,
    fail_next_ops: VecDeque<String>,
    latency: Duration,
    connects: u64,
}

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<i64, i64>,
}

impl Table {
    // Store-assigned ids never collide with explicitly seeded ones
    fn next_id(&self) -> i64 {
        self.rows.keys().next_back().map_or(1, |id| id + 1)
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delay every session operation by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.inner().latency = latency;
        self
    }

    /// Mark `endpoint` unreachable (or reachable again).
    ///
    /// While down, connects and operations of sessions bound to it fail
    /// with a "connection refused" error.
    pub fn set_endpoint_down(&self, endpoint: &Endpoint, down: bool) {
        let mut inner = self.inner();
        if down {
            inner.down.insert(endpoint.clone());
        } else {
            inner.down.remove(endpoint);
        }
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.inner().fail_next_connect = Some(error.to_string());
    }

    /// Cause the next session operation to fail with the given error.
    ///
    /// Calls queue up: each failure is consumed by one operation.
    pub fn fail_next_op(&self, error: &str) {
        self.inner().fail_next_ops.push_back(error.to_string());
    }

    /// Overwrite a row behind the workers' backs.
    pub fn corrupt(&self, table: &str, id: i64, value: i64) {
        self.inner()
            .tables
            .entry(table.to_string())
            .or_default()
            .rows
            .insert(id, value);
    }

    /// Current value of a row.
    pub fn counter(&self, table: &str, id: i64) -> Option<i64> {
        self.inner().tables.get(table)?.rows.get(&id).copied()
    }

    /// Number of rows in `table` (0 if absent).
    pub fn row_count(&self, table: &str) -> usize {
        self.inner().tables.get(table).map_or(0, |t| t.rows.len())
    }

    /// Check whether `table` exists.
    pub fn has_table(&self, table: &str) -> bool {
        self.inner().tables.contains_key(table)
    }

    /// Number of successful connects so far.
    pub fn connect_count(&self) -> u64 {
        self.inner().connects
    }

    fn refused(endpoint: &Endpoint) -> StoreError {
        StoreError::Connect(format!("dial tcp {endpoint}: connection refused"))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Session>, StoreError> {
        let mut inner = self.inner();
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(StoreError::Connect(error));
        }
        if inner.down.contains(endpoint) {
            return Err(Self::refused(endpoint));
        }
        inner.connects += 1;
        Ok(Box::new(MemorySession {
            store: self.clone(),
            endpoint: endpoint.clone(),
        }))
    }
}

struct MemorySession {
    store: MemoryStore,
    endpoint: Endpoint,
}

impl MemorySession {
    /// Apply simulated latency, then run `op` against the tables.
    async fn with_tables<T>(
        &self,
        op: impl FnOnce(&mut HashMap<String, Table>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let latency = self.store.inner().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut inner = self.store.inner();
        if inner.down.contains(&self.endpoint) {
            return Err(MemoryStore::refused(&self.endpoint));
        }
        if let Some(error) = inner.fail_next_ops.pop_front() {
            return Err(StoreError::Query(error));
        }
        op(&mut inner.tables)
    }
}

fn missing_relation(table: &str) -> StoreError {
    StoreError::Query(format!("relation \"{table}\" does not exist"))
}

#[async_trait]
impl Session for MemorySession {
    async fn create_table(&mut self, table: &str) -> Result<(), StoreError> {
        self.with_tables(|tables| {
            tables.entry(table.to_string()).or_default();
            Ok(())
        })
        .await
    }

    async fn seed_counter(&mut self, table: &str, id: i64, value: i64) -> Result<(), StoreError> {
        self.with_tables(|tables| {
            let rows = &mut tables.get_mut(table).ok_or_else(|| missing_relation(table))?.rows;
            if rows.contains_key(&id) {
                return Err(StoreError::Query(format!(
                    "duplicate key value violates unique constraint \"{table}_pkey\""
                )));
            }
            rows.insert(id, value);
            Ok(())
        })
        .await
    }

    async fn read_counter(&mut self, table: &str, id: i64) -> Result<i64, StoreError> {
        self.with_tables(|tables| {
            let rows = &tables.get(table).ok_or_else(|| missing_relation(table))?.rows;
            rows.get(&id).copied().ok_or_else(|| StoreError::MissingRow {
                table: table.to_string(),
                id,
            })
        })
        .await
    }

    async fn write_counter(&mut self, table: &str, id: i64, value: i64) -> Result<(), StoreError> {
        self.with_tables(|tables| {
            let rows = &mut tables.get_mut(table).ok_or_else(|| missing_relation(table))?.rows;
            match rows.get_mut(&id) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(StoreError::MissingRow {
                    table: table.to_string(),
                    id,
                }),
            }
        })
        .await
    }

    async fn append_row(&mut self, table: &str) -> Result<(), StoreError> {
        self.with_tables(|tables| {
            let table_rows = tables.get_mut(table).ok_or_else(|| missing_relation(table))?;
            let id = table_rows.next_id();
            table_rows.rows.insert(id, 0);
            Ok(())
        })
        .await
    }
}

/// A simulated cluster member backed by a [`MemoryStore`] endpoint.
///
/// Restarting takes the endpoint down for `downtime`, then brings it back.
#[derive(Debug)]
pub struct MemoryNode {
    name: String,
    endpoint: Endpoint,
    store: MemoryStore,
    downtime: Duration,
    restarts: AtomicU32,
}

impl MemoryNode {
    /// Create a node serving `endpoint` of `store`.
    pub fn new(
        name: impl Into<String>,
        endpoint: Endpoint,
        store: MemoryStore,
        downtime: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint,
            store,
            downtime,
            restarts: AtomicU32::new(0),
        }
    }

    /// Endpoint this node serves.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Completed restarts.
    pub fn restart_count(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterMember for MemoryNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn restart(&self) -> Result<(), SupervisorError> {
        tracing::info!(node = %self.name, endpoint = %self.endpoint, "bouncing memory node");
        self.store.set_endpoint_down(&self.endpoint, true);
        tokio::time::sleep(self.downtime).await;
        self.store.set_endpoint_down(&self.endpoint, false);
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
