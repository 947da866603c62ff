//! Distinct-value lookups for the filter panel.
//!
//! Option lists are read with `SELECT DISTINCT col ... ORDER BY col` and kept
//! for a TTL so every render does not rescan the view.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::backends::BackendConnection;
use crate::cache::{Clock, TtlCache};
use crate::config::ReportsConfig;
use crate::error::Result;
use crate::query_builder::distinct_values_query;
use crate::schema::{ColumnRef, ViewSchema};
use crate::sql_ast::{SqlRenderer, TableRef};

/// TTL cache of ascending distinct non-null values, keyed by view and column.
#[derive(Debug)]
pub struct LookupCache {
    entries: Mutex<TtlCache<String, Vec<Value>>>,
}

impl LookupCache {
    pub fn new(ttl: Duration, max_size: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(TtlCache::new(ttl, max_size, clock)),
        }
    }

    pub fn with_config(config: &ReportsConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Duration::from_secs(config.cache.lookup_ttl_secs),
            config.cache.max_lookups,
            clock,
        )
    }

    /// Distinct values of `column` in ascending order.
    pub async fn values(
        &self,
        backend: &dyn BackendConnection,
        table: &TableRef,
        column: &ColumnRef,
    ) -> Result<Vec<Value>> {
        let key = cache_key(table, column);
        if let Some(values) = self.entries.lock().await.get(&key).cloned() {
            tracing::trace!(key = %key, "lookup cache hit");
            return Ok(values);
        }

        let start = Instant::now();
        let query = distinct_values_query(table.clone(), column);
        let sql = SqlRenderer::new(backend.dialect()).render_select(&query);
        let values = backend.execute_sql(&sql, &[]).await?.first_column();
        tracing::debug!(
            key = %key,
            values = values.len(),
            ms = start.elapsed().as_millis(),
            "lookup cache miss"
        );

        self.entries.lock().await.insert(key, values.clone());
        Ok(values)
    }

    /// Same as [`LookupCache::values`] for a column named by the caller.
    /// Names that are not columns of `schema` are rejected before any SQL is built.
    pub async fn values_by_name(
        &self,
        backend: &dyn BackendConnection,
        schema: &ViewSchema,
        table: &TableRef,
        name: &str,
    ) -> Result<Vec<Value>> {
        let column = schema.require(name)?;
        self.values(backend, table, &column).await
    }
}

fn cache_key(table: &TableRef, column: &ColumnRef) -> String {
    match &table.schema {
        Some(schema) => format!("{schema}.{}.{}", table.name, column.name()),
        None => format!("{}.{}", table.name, column.name()),
    }
}
