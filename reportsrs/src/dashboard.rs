//! One render pass of the rental dashboard.
//!
//! Introspect the view, read option lists, compile the user's selections into a
//! predicate, then run both reports concurrently. A report that cannot be built
//! for this view, matches no rows, or fails to run is reported as such without
//! failing the other one.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backends::{self, BackendConnection};
use crate::cache::{Clock, SystemClock};
use crate::config::ReportsConfig;
use crate::error::{ReportError, Result};
use crate::lookup::LookupCache;
use crate::query_builder::{
    available_grains, compile_filters, CompiledPredicate, FilterSpec, Metric, ReportBuilder,
    TimeGrain,
};
use crate::report::{CategoryReport, TrendReport};
use crate::schema::{Capabilities, ColumnRef, DimensionKind, FilterDimension, SchemaIntrospector, ViewSchema};
use crate::sql_ast::TableRef;

/// Per-dimension selections. A dimension that is not present means "all".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selections(BTreeMap<DimensionKind, Vec<Value>>);

impl Selections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, kind: DimensionKind, values: impl IntoIterator<Item = Value>) -> Self {
        self.0.insert(kind, values.into_iter().collect());
        self
    }

    pub fn get(&self, kind: DimensionKind) -> Option<&[Value]> {
        self.0.get(&kind).map(Vec::as_slice)
    }

    pub fn kinds(&self) -> impl Iterator<Item = DimensionKind> + '_ {
        self.0.keys().copied()
    }
}

/// Chart options: active metric, top-N for the categorical report, trend grain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    pub metric: Metric,
    /// Falls back to `reports.default_top_n`.
    pub top_n: Option<u32>,
    pub grain: TimeGrain,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionOptions {
    pub kind: DimensionKind,
    pub label: &'static str,
    pub column: ColumnRef,
    pub options: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopNBounds {
    pub min: u32,
    pub max: u32,
    pub default: u32,
}

/// Everything the sidebar needs to draw its controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterPanel {
    pub view: String,
    pub dimensions: Vec<DimensionOptions>,
    pub metrics: Vec<Metric>,
    pub grains: Vec<TimeGrain>,
    pub top_n: TopNBounds,
    pub categorical_available: bool,
    pub trend_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome<T> {
    Ready(T),
    /// The query ran but the filters exclude every row.
    Empty { message: String },
    /// The view cannot support this report (or its metric/grain).
    Unavailable { reason: String },
    /// The query or the shaping of its rows failed.
    Failed { error: String },
}

impl<T> ReportOutcome<T> {
    fn from_result(result: Result<T>) -> Result<Self> {
        match result {
            Ok(report) => Ok(ReportOutcome::Ready(report)),
            Err(ReportError::EmptyResult(message)) => Ok(ReportOutcome::Empty { message }),
            Err(err @ ReportError::ReportInfeasible { .. }) => Ok(ReportOutcome::Unavailable {
                reason: err.to_string(),
            }),
            Err(err) if err.is_report_local() => {
                tracing::warn!(error = %err, "report failed");
                Ok(ReportOutcome::Failed {
                    error: err.to_string(),
                })
            }
            Err(fatal) => Err(fatal),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ReportOutcome::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            ReportOutcome::Ready(report) => Some(report),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub view: String,
    pub metric: Metric,
    /// Columns that ended up restricted by the predicate.
    pub filtered_columns: Vec<ColumnRef>,
    pub categorical: ReportOutcome<CategoryReport>,
    pub trend: ReportOutcome<TrendReport>,
}

/// Long-lived dashboard state: backend handle plus the schema and lookup caches.
pub struct Dashboard {
    backend: Arc<dyn BackendConnection>,
    config: ReportsConfig,
    introspector: SchemaIntrospector,
    lookups: LookupCache,
}

impl Dashboard {
    pub fn new(backend: Arc<dyn BackendConnection>, config: ReportsConfig) -> Self {
        Self::with_clock(backend, config, Arc::new(SystemClock))
    }

    /// Build with an explicit clock, shared by both caches.
    pub fn with_clock(
        backend: Arc<dyn BackendConnection>,
        config: ReportsConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let introspector = SchemaIntrospector::new(
            config.view.name.clone(),
            Duration::from_secs(config.cache.schema_ttl_secs),
            clock.clone(),
        );
        let lookups = LookupCache::with_config(&config, clock);
        Self {
            backend,
            config,
            introspector,
            lookups,
        }
    }

    /// Open the configured backend and build a dashboard over it.
    pub fn connect(config: ReportsConfig) -> Result<Self> {
        config.validate()?;
        let backend = backends::connect(&config)?;
        Ok(Self::new(backend, config))
    }

    pub fn config(&self) -> &ReportsConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn BackendConnection> {
        &self.backend
    }

    /// Current (possibly cached) column set of the view.
    pub async fn schema(&self) -> Result<ViewSchema> {
        self.introspector.schema(self.backend.as_ref()).await
    }

    fn table(&self) -> TableRef {
        TableRef {
            schema: self.config.view.schema.clone(),
            name: self.config.view.name.clone(),
        }
    }

    pub async fn filter_panel(&self) -> Result<FilterPanel> {
        let schema = self.schema().await?;
        let caps = schema.capabilities();
        let dimensions = self.dimension_options(&caps).await?;
        let metrics = if caps.revenue_available() {
            vec![Metric::TotalRentals, Metric::TotalRevenue]
        } else {
            vec![Metric::TotalRentals]
        };
        let r = &self.config.reports;
        Ok(FilterPanel {
            view: schema.view().to_string(),
            dimensions,
            metrics,
            grains: available_grains(&caps),
            top_n: TopNBounds {
                min: r.min_top_n,
                max: r.max_top_n,
                default: r.default_top_n,
            },
            categorical_available: caps.categorical_available(),
            trend_available: caps.trend_available(),
        })
    }

    pub async fn render(
        &self,
        selections: &Selections,
        options: &ReportOptions,
    ) -> Result<DashboardView> {
        let start = Instant::now();
        let schema = self.schema().await?;
        let caps = schema.capabilities();

        if let Some(kind) = selections.kinds().find(|k| caps.dimension(*k).is_none()) {
            return Err(ReportError::InvalidFilterState(format!(
                "{} is not a filter on {}",
                kind.label(),
                schema.view()
            )));
        }

        let dimensions = self.dimension_options(&caps).await?;
        let specs: Vec<FilterSpec> = dimensions
            .into_iter()
            .map(|dim| {
                let selected = selections
                    .get(dim.kind)
                    .map(<[Value]>::to_vec)
                    .unwrap_or_else(|| dim.options.clone());
                FilterSpec::new(dim.column, dim.options, selected)
            })
            .collect();
        let predicate = compile_filters(&specs)?;

        let builder = ReportBuilder::new(&schema).with_config(&self.config);
        let top_n = options.top_n.unwrap_or(self.config.reports.default_top_n);
        let (categorical, trend) = futures::join!(
            self.run_categorical(&builder, &predicate, options.metric, top_n),
            self.run_trend(&builder, &predicate, options.metric, options.grain),
        );
        let categorical = ReportOutcome::from_result(categorical)?;
        let trend = ReportOutcome::from_result(trend)?;

        tracing::info!(
            view = schema.view(),
            metric = %options.metric,
            clauses = predicate.clauses().len(),
            categorical_ready = categorical.is_ready(),
            trend_ready = trend.is_ready(),
            ms = start.elapsed().as_millis(),
            "dashboard rendered"
        );

        Ok(DashboardView {
            view: schema.view().to_string(),
            metric: options.metric,
            filtered_columns: predicate.columns().cloned().collect(),
            categorical,
            trend,
        })
    }

    async fn dimension_options(&self, caps: &Capabilities) -> Result<Vec<DimensionOptions>> {
        let table = self.table();
        let backend = self.backend.as_ref();
        try_join_all(caps.filter_dimensions().into_iter().map(
            |FilterDimension { kind, column }| {
                let table = &table;
                async move {
                    let options = self.lookups.values(backend, table, &column).await?;
                    Ok::<_, ReportError>(DimensionOptions {
                        kind,
                        label: kind.label(),
                        column,
                        options,
                    })
                }
            },
        ))
        .await
    }

    async fn run_categorical(
        &self,
        builder: &ReportBuilder<'_>,
        predicate: &CompiledPredicate,
        metric: Metric,
        top_n: u32,
    ) -> Result<CategoryReport> {
        let query = builder.categorical(predicate, metric, top_n, self.backend.dialect())?;
        let result = self.backend.execute_sql(&query.sql, &query.params).await?;
        CategoryReport::from_result(&result, metric, top_n)
    }

    async fn run_trend(
        &self,
        builder: &ReportBuilder<'_>,
        predicate: &CompiledPredicate,
        metric: Metric,
        grain: TimeGrain,
    ) -> Result<TrendReport> {
        let query = builder.trend(predicate, metric, grain, self.backend.dialect())?;
        let result = self.backend.execute_sql(&query.sql, &query.params).await?;
        TrendReport::from_result(&result, metric, grain)
    }
}
