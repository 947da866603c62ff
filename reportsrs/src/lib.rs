//! Schema-aware report queries over the Pagila rental analysis view.
//!
//! The view's column set decides which reports, filters, grains and metrics are
//! offered. Filter selections compile to `IN` clauses whose values are always
//! bound parameters; column names only reach SQL through [`schema::ColumnRef`].

pub mod backends;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod lookup;
pub mod query_builder;
pub mod report;
pub mod schema;
pub mod sql_ast;

pub use backends::{connect, BackendConnection};
pub use cache::{Clock, ManualClock, SystemClock};
pub use config::ReportsConfig;
pub use dashboard::{Dashboard, DashboardView, FilterPanel, ReportOptions, ReportOutcome, Selections};
pub use error::{ReportError, Result};
pub use executor::QueryResult;
pub use lookup::LookupCache;
pub use query_builder::{
    compile_filters, CompiledPredicate, FilterSpec, Metric, Period, ReportBuilder, ReportQuery,
    TimeGrain,
};
pub use report::{CategoryReport, CategoryRow, TrendReport, TrendRow};
pub use schema::{Capabilities, ColumnRef, DimensionKind, SchemaIntrospector, ViewSchema};
