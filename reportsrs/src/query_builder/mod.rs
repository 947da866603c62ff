//! Report query composer.
//!
//! Turns a compiled filter predicate plus report options into parameterized
//! SQL for the two dashboard reports. Identifiers come from the introspected
//! schema only; every filter value is a bound parameter.

use std::fmt;
use std::ops::RangeInclusive;

use serde::Serialize;
use serde_json::Value;

use crate::config::ReportsConfig;
use crate::dialect::Dialect;
use crate::error::{ReportError, Result};
use crate::schema::{Capabilities, ColumnRef, ViewSchema};
use crate::sql_ast::{SelectQuery, SqlExpr, SqlRenderer, TableRef};

mod categorical;
pub mod filters;
pub mod grain;
pub mod measures;
mod trend;

pub use filters::{compile_filters, CompiledPredicate, FilterSpec, InClause};
pub use grain::{available_grains, derive_quarter, Period, PeriodBucket, TimeBucket, TimeGrain};
pub use measures::{Metric, TOTAL_RENTALS, TOTAL_REVENUE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Categorical,
    Trend,
}

impl ReportKind {
    pub fn name(&self) -> &'static str {
        match self {
            ReportKind::Categorical => "categorical",
            ReportKind::Trend => "trend",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::Categorical => "Rentals by Film Category",
            ReportKind::Trend => "Rental Trends Over Time",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A composed statement and its bound parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportQuery {
    pub kind: ReportKind,
    pub metric: Metric,
    /// Set for trend queries only.
    pub grain: Option<TimeGrain>,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Builds report SQL against one view schema snapshot.
pub struct ReportBuilder<'s> {
    schema: &'s ViewSchema,
    caps: Capabilities,
    table: TableRef,
    top_n_bounds: RangeInclusive<u32>,
    coalesce_null_revenue: bool,
}

impl<'s> ReportBuilder<'s> {
    pub fn new(schema: &'s ViewSchema) -> Self {
        Self {
            schema,
            caps: schema.capabilities(),
            table: TableRef {
                schema: None,
                name: schema.view().to_string(),
            },
            top_n_bounds: 5..=25,
            coalesce_null_revenue: false,
        }
    }

    /// Apply view qualification, top-N bounds and revenue policy from config.
    pub fn with_config(mut self, config: &ReportsConfig) -> Self {
        self.table.schema = config.view.schema.clone();
        self.top_n_bounds = config.reports.min_top_n..=config.reports.max_top_n;
        self.coalesce_null_revenue = config.reports.coalesce_null_revenue;
        self
    }

    pub fn with_view_schema(mut self, schema: Option<String>) -> Self {
        self.table.schema = schema;
        self
    }

    pub fn with_coalesce_null_revenue(mut self, coalesce: bool) -> Self {
        self.coalesce_null_revenue = coalesce;
        self
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Top-N categories by rental count.
    ///
    /// Rows are ordered by `total_rentals` only. How ties are ordered, and which
    /// tied categories fall past the cutoff, is left to the database.
    pub fn categorical(
        &self,
        predicate: &CompiledPredicate,
        metric: Metric,
        top_n: u32,
        dialect: &dyn Dialect,
    ) -> Result<ReportQuery> {
        let kind = ReportKind::Categorical;
        self.check_predicate(predicate, kind)?;
        let category = self.caps.category.clone().ok_or_else(|| {
            ReportError::infeasible(kind.name(), "view has no 'film_category' column")
        })?;
        metric.check_feasible(&self.caps, kind.name())?;
        if !self.top_n_bounds.contains(&top_n) {
            return Err(ReportError::Config(format!(
                "top-N {top_n} outside {}..={}",
                self.top_n_bounds.start(),
                self.top_n_bounds.end()
            )));
        }

        let query = categorical::build(
            self.table.clone(),
            &category,
            measures::measure_items(&self.caps, self.coalesce_null_revenue),
            predicate.to_exprs(),
            top_n,
        );
        Ok(self.finish(kind, metric, None, &query, predicate, dialect))
    }

    /// Rentals and revenue per period, oldest first, never truncated.
    pub fn trend(
        &self,
        predicate: &CompiledPredicate,
        metric: Metric,
        grain: TimeGrain,
        dialect: &dyn Dialect,
    ) -> Result<ReportQuery> {
        let kind = ReportKind::Trend;
        self.check_predicate(predicate, kind)?;
        let bucket = TimeBucket::resolve(&self.caps, grain)?;
        metric.check_feasible(&self.caps, kind.name())?;

        let query = trend::build(
            self.table.clone(),
            &bucket,
            measures::measure_items(&self.caps, self.coalesce_null_revenue),
            predicate.to_exprs(),
        );
        Ok(self.finish(kind, metric, Some(grain), &query, predicate, dialect))
    }

    /// Filters must only name columns of the current snapshot; a predicate
    /// compiled against an older schema is rejected before any SQL is built.
    fn check_predicate(&self, predicate: &CompiledPredicate, kind: ReportKind) -> Result<()> {
        let missing: Vec<&ColumnRef> = predicate
            .columns()
            .filter(|c| !self.schema.contains(c.name()))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = missing.iter().map(|c| c.name()).collect();
        Err(ReportError::infeasible(
            kind.name(),
            format!(
                "filter references columns missing from {}: {}",
                self.schema.view(),
                names.join(", ")
            ),
        ))
    }

    fn finish(
        &self,
        kind: ReportKind,
        metric: Metric,
        grain: Option<TimeGrain>,
        query: &SelectQuery,
        predicate: &CompiledPredicate,
        dialect: &dyn Dialect,
    ) -> ReportQuery {
        let sql = SqlRenderer::new(dialect).render_select(query);
        debug_assert_eq!(predicate.placeholder_count(), predicate.params().len());
        tracing::debug!(
            report = kind.name(),
            params = predicate.params().len(),
            sql_len = sql.len(),
            "composed report query"
        );
        tracing::trace!(report = kind.name(), sql = %sql, "report sql");
        ReportQuery {
            kind,
            metric,
            grain,
            sql,
            params: predicate.params().to_vec(),
        }
    }
}

/// Distinct non-null values of one column, ascending.
pub(crate) fn distinct_values_query(table: TableRef, column: &ColumnRef) -> SelectQuery {
    use crate::sql_ast::{OrderItem, SelectItem, SortDirection};

    SelectQuery {
        distinct: true,
        select: vec![SelectItem {
            expr: SqlExpr::column(column),
            alias: None,
        }],
        from: table,
        filters: vec![SqlExpr::IsNotNull(Box::new(SqlExpr::column(column)))],
        order_by: vec![OrderItem {
            expr: SqlExpr::column(column),
            direction: SortDirection::Asc,
        }],
        ..Default::default()
    }
}
