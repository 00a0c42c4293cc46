//! Postgres-wire store backend (sqlx).
//!
//! Each session is a single `PgConnection`; there is no pool because a
//! worker must be able to drop its connection and dial a different node.

use super::{Session, Store};
use crate::error::StoreError;
use async_trait::async_trait;
use bench_types::Endpoint;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::Connection;

/// Store reached over the Postgres wire protocol, without TLS.
#[derive(Debug, Clone)]
pub struct PgStore {
    username: String,
    database: String,
}

impl PgStore {
    /// Store using `user=root` and the given database.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            username: "root".to_string(),
            database: database.into(),
        }
    }

    /// Override the login user.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Connection options for one endpoint.
    pub fn options(&self, endpoint: &Endpoint) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(endpoint.host())
            .port(endpoint.port())
            .username(&self.username)
            .database(&self.database)
            .ssl_mode(PgSslMode::Disable)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Session>, StoreError> {
        let conn = PgConnection::connect_with(&self.options(endpoint))
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        tracing::debug!(endpoint = %endpoint, "opened store session");
        Ok(Box::new(PgSession { conn }))
    }
}

struct PgSession {
    conn: PgConnection,
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn checked_table(table: &str) -> Result<&str, StoreError> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(table)
    } else {
        Err(StoreError::Query(format!("invalid table name: {table:?}")))
    }
}

fn query_error(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

#[async_trait]
impl Session for PgSession {
    async fn create_table(&mut self, table: &str) -> Result<(), StoreError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id SERIAL8 PRIMARY KEY, value INT8)",
            checked_table(table)?
        );
        sqlx::query(&sql)
            .execute(&mut self.conn)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn seed_counter(&mut self, table: &str, id: i64, value: i64) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (id, value) VALUES ($1, $2)",
            checked_table(table)?
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(value)
            .execute(&mut self.conn)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn read_counter(&mut self, table: &str, id: i64) -> Result<i64, StoreError> {
        let sql = format!("SELECT value FROM {} WHERE id = $1", checked_table(table)?);
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_optional(&mut self.conn)
            .await
            .map_err(query_error)?
            .ok_or_else(|| StoreError::MissingRow {
                table: table.to_string(),
                id,
            })
    }

    async fn write_counter(&mut self, table: &str, id: i64, value: i64) -> Result<(), StoreError> {
        let sql = format!("UPDATE {} SET value = $1 WHERE id = $2", checked_table(table)?);
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(id)
            .execute(&mut self.conn)
            .await
            .map_err(query_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                table: table.to_string(),
                id,
            });
        }
        Ok(())
    }

    async fn append_row(&mut self, table: &str) -> Result<(), StoreError> {
        let sql = format!("INSERT INTO {} (value) VALUES (0)", checked_table(table)?);
        sqlx::query(&sql)
            .execute(&mut self.conn)
            .await
            .map_err(query_error)?;
        Ok(())
    }
}
