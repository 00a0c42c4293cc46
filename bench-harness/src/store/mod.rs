//! Benchmark target abstraction.
//!
//! Workers only ever see a [`Store`] that hands out [`Session`]s. The
//! Postgres backend talks to a real cluster; the memory backend is used
//! by tests and carries fault injection.

mod memory;
mod postgres;

pub use memory::{MemoryNode, MemoryStore};
pub use postgres::PgStore;

use crate::error::StoreError;
use async_trait::async_trait;
use bench_types::Endpoint;

/// Factory for sessions against one endpoint.
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a session to `endpoint`.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Session>, StoreError>;
}

/// One connection to the store.
///
/// A session is owned by exactly one worker and dropped on transient errors.
#[async_trait]
pub trait Session: Send {
    /// Create `table` with `id` primary key and integer `value`, if absent.
    async fn create_table(&mut self, table: &str) -> Result<(), StoreError>;

    /// Insert row `id` with `value`. Fails if the row already exists.
    async fn seed_counter(&mut self, table: &str, id: i64, value: i64) -> Result<(), StoreError>;

    /// Read the value of row `id`.
    async fn read_counter(&mut self, table: &str, id: i64) -> Result<i64, StoreError>;

    /// Overwrite the value of row `id`.
    async fn write_counter(&mut self, table: &str, id: i64, value: i64) -> Result<(), StoreError>;

    /// Append one zero-valued row with a store-assigned id.
    async fn append_row(&mut self, table: &str) -> Result<(), StoreError>;
}
