//! DuckDB backend implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

use crate::dialect::DuckDbDialect;
use crate::error::{ReportError, Result};
use crate::executor::{json_to_duck_value, ColumnMeta, QueryResult};

use super::BackendConnection;

const COLUMNS_SQL: &str = "SELECT column_name FROM information_schema.columns \
     WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position";

/// DuckDB connection implementing the unified backend trait.
#[derive(Clone)]
pub struct DuckDbConnection {
    database_path: PathBuf,
    schema: String,
    dialect: DuckDbDialect,
    limiter: Arc<Semaphore>,
    /// Opened on first use; pooled connections are clones sharing its database instance.
    root: Arc<Mutex<Option<duckdb::Connection>>>,
    pool: Arc<Mutex<Vec<duckdb::Connection>>>,
}

impl DuckDbConnection {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        tracing::info!(path = %path.display(), max_concurrency = 16, "creating DuckDB connection");
        Self {
            database_path: path,
            schema: "main".to_string(),
            dialect: DuckDbDialect,
            limiter: Arc::new(Semaphore::new(16)),
            root: Arc::new(Mutex::new(None)),
            pool: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configure maximum concurrent executions; callers can tune based on hardware.
    pub fn with_max_concurrency(mut self, max_in_flight: usize) -> Self {
        tracing::debug!(max_concurrency = max_in_flight, "configuring DuckDB concurrency");
        self.limiter = Arc::new(Semaphore::new(max_in_flight.max(1)));
        self
    }

    /// Catalog schema the view lives in (default `main`).
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    async fn acquire_slot(&self) -> Result<SemaphorePermit<'_>> {
        let available = self.limiter.available_permits();
        if available == 0 {
            tracing::debug!("all DuckDB slots in use, waiting for permit");
        }
        self.limiter
            .acquire()
            .await
            .map_err(|e| ReportError::Execution(format!("limiter closed: {e}")))
    }

    async fn checkout_connection(&self) -> Result<duckdb::Connection> {
        let mut guard = self.pool.lock().await;
        if let Some(conn) = guard.pop() {
            let pool_size = guard.len();
            drop(guard);
            tracing::trace!(pool_remaining = pool_size, "reusing pooled DuckDB connection");
            return Ok(conn);
        }
        drop(guard);

        let mut root = self.root.lock().await;
        if root.is_none() {
            tracing::debug!(path = %self.database_path.display(), "opening DuckDB database");
            let conn = duckdb::Connection::open(&self.database_path)
                .map_err(|e| ReportError::Execution(format!("open duckdb: {e}")))?;
            *root = Some(conn);
        }
        let conn = root
            .as_ref()
            .ok_or_else(|| ReportError::Execution("duckdb root connection missing".to_string()))?
            .try_clone()
            .map_err(|e| ReportError::Execution(format!("clone duckdb connection: {e}")))?;
        tracing::trace!("opened pooled DuckDB connection");
        Ok(conn)
    }

    /// Run `sql` on a pooled connection off the async runtime.
    async fn run(&self, sql: String, params: Vec<Value>) -> Result<QueryResult> {
        let _permit = self.acquire_slot().await?;
        let conn = self.checkout_connection().await?;
        let pool = self.pool.clone();
        let result =
            tokio::task::spawn_blocking(move || -> (Result<QueryResult>, duckdb::Connection) {
                let result = query_blocking(&conn, &sql, &params);
                (result, conn)
            })
            .await
            .map_err(|e| ReportError::Execution(format!("task join error: {e}")))?;

        let (result, conn) = result;
        {
            let mut guard = pool.lock().await;
            guard.push(conn);
        }
        result
    }
}

fn query_blocking(conn: &duckdb::Connection, sql: &str, params: &[Value]) -> Result<QueryResult> {
    let start = Instant::now();
    let mut stmt = conn.prepare(sql)?;
    let bound: Vec<duckdb::types::Value> = params.iter().map(json_to_duck_value).collect();
    let mut rows_iter = stmt.query(duckdb::params_from_iter(bound))?;
    let stmt_ref = rows_iter
        .as_ref()
        .ok_or_else(|| ReportError::Execution("statement missing".to_string()))?;
    let mut column_names = Vec::new();
    for idx in 0..stmt_ref.column_count() {
        let name = stmt_ref
            .column_name(idx)
            .map_err(|e| ReportError::Execution(e.to_string()))?;
        column_names.push(name.to_string());
    }
    let mut rows = Vec::new();
    while let Some(row) = rows_iter.next()? {
        let mut map = serde_json::Map::new();
        for (idx, name) in column_names.iter().enumerate() {
            let value = crate::executor::duck_value_to_json(row.get_ref(idx)?.to_owned());
            map.insert(name.clone(), value);
        }
        rows.push(map);
    }

    let columns: Vec<_> = column_names
        .into_iter()
        .map(|name| ColumnMeta { name })
        .collect();
    tracing::debug!(
        rows = rows.len(),
        columns = columns.len(),
        params = params.len(),
        ms = start.elapsed().as_millis(),
        "duckdb execute_sql"
    );
    Ok(QueryResult { columns, rows })
}

#[async_trait]
impl BackendConnection for DuckDbConnection {
    fn dialect(&self) -> &(dyn crate::dialect::Dialect + Send + Sync) {
        &self.dialect
    }

    async fn fetch_columns(&self, view: &str) -> Result<Vec<String>> {
        let params = vec![
            Value::String(self.schema.clone()),
            Value::String(view.to_string()),
        ];
        let result = self.run(COLUMNS_SQL.to_string(), params).await?;
        let names = result
            .first_column()
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect::<Vec<_>>();
        tracing::debug!(
            view = view,
            schema = self.schema.as_str(),
            columns = names.len(),
            "duckdb fetch_columns"
        );
        Ok(names)
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        tracing::trace!(sql = %sql, "executing DuckDB query");
        self.run(sql.to_string(), params.to_vec()).await
    }
}
