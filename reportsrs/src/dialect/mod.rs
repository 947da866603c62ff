//! SQL dialect abstractions for different database backends.
//!
//! Each dialect is implemented in its own file and gated behind a feature flag.

use crate::sql_ast::{Aggregation, Function};

/// Dialects render identifiers and primitive expression pieces.
/// Expression tree walking lives in the renderer; the dialect
/// only maps logical constructs to SQL fragments.
pub trait Dialect {
    fn quote_ident(&self, ident: &str) -> String;
    fn qualify_table(&self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(schema) => format!("{}.{}", self.quote_ident(schema), self.quote_ident(table)),
            None => self.quote_ident(table),
        }
    }
    /// Bind placeholder for the `idx`-th (zero based) parameter of a statement.
    fn placeholder(&self, _idx: usize) -> String {
        "?".to_string()
    }
    fn render_function(&self, func: &Function, args: Vec<String>) -> String;
    fn render_aggregation(&self, agg: &Aggregation, expr: &str) -> String {
        match agg {
            Aggregation::Count => format!("COUNT({expr})"),
            Aggregation::Sum => format!("SUM({expr})"),
        }
    }
    fn render_literal(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::Null => "NULL".to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            serde_json::Value::Array(items) => {
                let rendered: Vec<String> = items.iter().map(|v| self.render_literal(v)).collect();
                rendered.join(", ")
            }
            serde_json::Value::Object(_) => {
                format!("'{}'", value.to_string().replace('\'', "''"))
            }
        }
    }
}

// Feature-gated dialect implementations
#[cfg(feature = "duckdb")]
mod duckdb;
#[cfg(feature = "duckdb")]
pub use duckdb::DuckDbDialect;

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "postgres")]
pub use postgres::PostgresDialect;
