//! Database backend implementations.
//!
//! Each backend is implemented in its own file and gated behind a feature flag.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ReportsConfig;
use crate::dialect::Dialect;
use crate::error::{ReportError, Result};
use crate::executor::QueryResult;

/// Unified read-only interface for all database backends.
#[async_trait]
pub trait BackendConnection: Send + Sync {
    fn dialect(&self) -> &(dyn Dialect + Send + Sync);

    /// Column names of `view` in catalog order. An unknown view yields an empty list.
    async fn fetch_columns(&self, view: &str) -> Result<Vec<String>>;

    /// Execute `sql`, binding `params` to its placeholders in order.
    async fn execute_sql(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;
}

/// Open the backend named by the configuration.
///
/// PostgreSQL wins when both are configured, since it is the warehouse the
/// reports were written against; DuckDB is the local/offline option.
pub fn connect(config: &ReportsConfig) -> Result<Arc<dyn BackendConnection>> {
    if let Some(conn) = connect_postgres(config)? {
        return Ok(conn);
    }
    if let Some(conn) = connect_duckdb(config)? {
        return Ok(conn);
    }
    Err(ReportError::Config(
        "no backend configured: set [postgres].connection_string or [duckdb].path".to_string(),
    ))
}

#[cfg(feature = "postgres")]
fn connect_postgres(config: &ReportsConfig) -> Result<Option<Arc<dyn BackendConnection>>> {
    let Some(conn_str) = &config.postgres.connection_string else {
        return Ok(None);
    };
    let schema = config.view.schema.as_deref().unwrap_or("public");
    let conn = PostgresConnection::new(
        conn_str,
        schema,
        config.postgres_pool_size(),
        config.postgres_statement_timeout_ms(),
    )?;
    Ok(Some(Arc::new(conn)))
}

#[cfg(not(feature = "postgres"))]
fn connect_postgres(config: &ReportsConfig) -> Result<Option<Arc<dyn BackendConnection>>> {
    if config.postgres.connection_string.is_some() {
        tracing::warn!("postgres connection configured but the postgres feature is disabled");
    }
    Ok(None)
}

#[cfg(feature = "duckdb")]
fn connect_duckdb(config: &ReportsConfig) -> Result<Option<Arc<dyn BackendConnection>>> {
    let Some(path) = &config.duckdb.path else {
        return Ok(None);
    };
    let conn = DuckDbConnection::new(path)
        .with_max_concurrency(config.duckdb.max_concurrency)
        .with_schema(config.view.schema.as_deref().unwrap_or("main"));
    Ok(Some(Arc::new(conn)))
}

#[cfg(not(feature = "duckdb"))]
fn connect_duckdb(config: &ReportsConfig) -> Result<Option<Arc<dyn BackendConnection>>> {
    if config.duckdb.path.is_some() {
        tracing::warn!("duckdb path configured but the duckdb feature is disabled");
    }
    Ok(None)
}

// Feature-gated backend implementations
#[cfg(feature = "duckdb")]
mod duckdb;
#[cfg(feature = "duckdb")]
pub use duckdb::DuckDbConnection;

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "postgres")]
pub use postgres::PostgresConnection;
