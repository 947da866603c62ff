//! Dashboard orchestration against an in-memory fake backend.
#![cfg(feature = "duckdb")]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pagila_reports::dialect::{Dialect, DuckDbDialect};
use pagila_reports::executor::{ColumnMeta, QueryResult};
use pagila_reports::{
    BackendConnection, Dashboard, DimensionKind, ManualClock, Metric, ReportError, ReportOptions,
    ReportOutcome, ReportsConfig, Selections, TimeGrain,
};
use serde_json::{json, Map, Value};

struct FakeConnection {
    columns: Mutex<Vec<String>>,
    options: BTreeMap<&'static str, Vec<Value>>,
    fetch_calls: AtomicUsize,
    statements: Mutex<Vec<(String, Vec<Value>)>>,
    catalog_down: AtomicBool,
    trend_rows_broken: AtomicBool,
}

impl FakeConnection {
    fn new(columns: &[&str]) -> Self {
        let mut options = BTreeMap::new();
        options.insert("year", vec![json!(2021), json!(2022)]);
        options.insert("film_category", vec![json!("Action"), json!("Comedy")]);
        options.insert("film_rating", vec![json!("G"), json!("PG")]);
        options.insert("store_id", vec![json!(1), json!(2)]);
        Self {
            columns: Mutex::new(columns.iter().map(|c| c.to_string()).collect()),
            options,
            fetch_calls: AtomicUsize::new(0),
            statements: Mutex::new(Vec::new()),
            catalog_down: AtomicBool::new(false),
            trend_rows_broken: AtomicBool::new(false),
        }
    }

    fn set_columns(&self, columns: &[&str]) {
        *self.columns.lock().unwrap() = columns.iter().map(|c| c.to_string()).collect();
    }

    fn report_statements(&self) -> Vec<(String, Vec<Value>)> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .filter(|(sql, _)| sql.contains("GROUP BY"))
            .cloned()
            .collect()
    }

    fn distinct_statements(&self) -> usize {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .filter(|(sql, _)| sql.starts_with("SELECT DISTINCT"))
            .count()
    }
}

fn result(rows: Vec<Value>) -> QueryResult {
    let rows: Vec<Map<String, Value>> = rows
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();
    let columns = rows
        .first()
        .map(|r| r.keys().map(|k| ColumnMeta { name: k.clone() }).collect())
        .unwrap_or_default();
    QueryResult { columns, rows }
}

#[async_trait::async_trait]
impl BackendConnection for FakeConnection {
    fn dialect(&self) -> &(dyn Dialect + Send + Sync) {
        &DuckDbDialect
    }

    async fn fetch_columns(&self, _view: &str) -> pagila_reports::Result<Vec<String>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.catalog_down.load(Ordering::SeqCst) {
            return Err(ReportError::Execution("connection refused".to_string()));
        }
        Ok(self.columns.lock().unwrap().clone())
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> pagila_reports::Result<QueryResult> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));

        if sql.starts_with("SELECT DISTINCT") {
            for (column, values) in &self.options {
                if sql.contains(&format!("\"{column}\" IS NOT NULL")) {
                    let rows = values
                        .iter()
                        .map(|v| {
                            let mut row = Map::new();
                            row.insert(column.to_string(), v.clone());
                            Value::Object(row)
                        })
                        .collect();
                    return Ok(result(rows));
                }
            }
            return Ok(QueryResult::default());
        }
        // Pretend the year filter excluded everything.
        if params.contains(&json!(2022)) {
            return Ok(QueryResult::default());
        }
        if sql.contains("GROUP BY \"film_category\"") {
            return Ok(result(vec![
                json!({"film_category": "Comedy", "total_rentals": 9, "total_revenue": 20.0}),
                json!({"film_category": "Action", "total_rentals": 4, "total_revenue": null}),
            ]));
        }
        if self.trend_rows_broken.load(Ordering::SeqCst) {
            return Ok(result(vec![
                json!({"year": 2021, "month": null, "total_rentals": 6, "total_revenue": 12.0}),
            ]));
        }
        Ok(result(vec![
            json!({"year": 2021, "month": 3, "total_rentals": 6, "total_revenue": 12.0}),
            json!({"year": 2021, "month": 4, "total_rentals": 7, "total_revenue": 8.0}),
        ]))
    }
}

const ALL_COLUMNS: &[&str] = &[
    "year",
    "month",
    "film_category",
    "film_rating",
    "store_id",
    "rental_amount",
];

fn dashboard(backend: Arc<FakeConnection>, clock: Arc<ManualClock>) -> Dashboard {
    Dashboard::with_clock(backend, ReportsConfig::default(), clock)
}

#[tokio::test]
async fn filter_panel_lists_dimensions_grains_and_bounds() {
    let backend = Arc::new(FakeConnection::new(ALL_COLUMNS));
    let dash = dashboard(backend.clone(), Arc::new(ManualClock::new()));

    let panel = dash.filter_panel().await.unwrap();
    let kinds: Vec<_> = panel.dimensions.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DimensionKind::Year,
            DimensionKind::Category,
            DimensionKind::Rating,
            DimensionKind::Store
        ]
    );
    assert_eq!(panel.dimensions[0].options, vec![json!(2021), json!(2022)]);
    assert_eq!(panel.grains, vec![TimeGrain::Month, TimeGrain::Quarter]);
    assert_eq!(panel.metrics, vec![Metric::TotalRentals, Metric::TotalRevenue]);
    assert_eq!((panel.top_n.min, panel.top_n.max, panel.top_n.default), (5, 25, 10));
}

#[tokio::test]
async fn render_compiles_selections_into_bound_parameters() {
    let backend = Arc::new(FakeConnection::new(ALL_COLUMNS));
    let dash = dashboard(backend.clone(), Arc::new(ManualClock::new()));

    let selections = Selections::new()
        .select(DimensionKind::Category, [json!("Comedy")])
        .select(DimensionKind::Year, [json!(2021), json!(2022)]);
    let view = dash
        .render(&selections, &ReportOptions::default())
        .await
        .unwrap();

    assert_eq!(view.filtered_columns.len(), 1);
    assert_eq!(view.filtered_columns[0].name(), "film_category");
    for (sql, params) in backend.report_statements() {
        assert!(sql.contains("WHERE \"film_category\" IN (?)"), "{sql}");
        assert_eq!(params, vec![json!("Comedy")]);
    }

    let categorical = view.categorical.ready().unwrap();
    assert_eq!(categorical.summary.total_rentals, 13);
    assert_eq!(
        categorical.summary.top_category.as_ref().unwrap().film_category,
        "Comedy"
    );
    let trend = view.trend.ready().unwrap();
    assert_eq!(trend.rows[0].period.label(), "2021-03");
}

#[tokio::test]
async fn empty_results_are_reported_per_report() {
    let backend = Arc::new(FakeConnection::new(ALL_COLUMNS));
    let dash = dashboard(backend, Arc::new(ManualClock::new()));

    let selections = Selections::new().select(DimensionKind::Year, [json!(2022)]);
    let view = dash
        .render(&selections, &ReportOptions::default())
        .await
        .unwrap();
    assert!(matches!(view.categorical, ReportOutcome::Empty { .. }));
    assert!(matches!(view.trend, ReportOutcome::Empty { .. }));
}

#[tokio::test]
async fn infeasible_report_does_not_block_the_other() {
    let backend = Arc::new(FakeConnection::new(&["year", "month", "rental_amount"]));
    let dash = dashboard(backend, Arc::new(ManualClock::new()));

    let view = dash
        .render(&Selections::new(), &ReportOptions::default())
        .await
        .unwrap();
    assert!(matches!(view.categorical, ReportOutcome::Unavailable { .. }));
    assert!(view.trend.is_ready());

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["categorical"]["status"], "unavailable");
    assert_eq!(json["trend"]["status"], "ready");
}

#[tokio::test]
async fn malformed_trend_rows_fail_only_the_trend() {
    let backend = Arc::new(FakeConnection::new(ALL_COLUMNS));
    backend.trend_rows_broken.store(true, Ordering::SeqCst);
    let dash = dashboard(backend, Arc::new(ManualClock::new()));

    let view = dash
        .render(&Selections::new(), &ReportOptions::default())
        .await
        .unwrap();
    assert!(view.categorical.is_ready());
    assert!(matches!(view.trend, ReportOutcome::Failed { ref error } if error.contains("month")));

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["trend"]["status"], "failed");
}

#[tokio::test]
async fn revenue_metric_without_amounts_is_unavailable() {
    let backend = Arc::new(FakeConnection::new(&["year", "month", "film_category"]));
    let dash = dashboard(backend, Arc::new(ManualClock::new()));

    let options = ReportOptions {
        metric: Metric::TotalRevenue,
        ..Default::default()
    };
    let view = dash.render(&Selections::new(), &options).await.unwrap();
    assert!(matches!(view.categorical, ReportOutcome::Unavailable { .. }));
    assert!(matches!(view.trend, ReportOutcome::Unavailable { .. }));
}

#[tokio::test]
async fn selecting_a_dimension_the_view_lacks_is_rejected() {
    let backend = Arc::new(FakeConnection::new(&["year", "month", "film_category"]));
    let dash = dashboard(backend, Arc::new(ManualClock::new()));

    let selections = Selections::new().select(DimensionKind::Store, [json!(1)]);
    let err = dash
        .render(&selections, &ReportOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::InvalidFilterState(_)));
}

#[tokio::test]
async fn unreadable_catalog_is_fatal() {
    let backend = Arc::new(FakeConnection::new(ALL_COLUMNS));
    backend.catalog_down.store(true, Ordering::SeqCst);
    let dash = dashboard(backend, Arc::new(ManualClock::new()));

    let err = dash
        .render(&Selections::new(), &ReportOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::SchemaUnavailable(_)));
}

#[tokio::test]
async fn schema_and_lookups_refresh_after_ttl() {
    let backend = Arc::new(FakeConnection::new(&["year", "film_category"]));
    let clock = Arc::new(ManualClock::new());
    let dash = dashboard(backend.clone(), clock.clone());

    let panel = dash.filter_panel().await.unwrap();
    assert!(panel.grains.is_empty());
    assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.distinct_statements(), 2);

    // The view gains a month column; the cached snapshot hides it until expiry.
    backend.set_columns(&["year", "month", "film_category"]);
    clock.advance(Duration::from_secs(30));
    let panel = dash.filter_panel().await.unwrap();
    assert!(panel.grains.is_empty());
    assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.distinct_statements(), 2);

    clock.advance(Duration::from_secs(31));
    let panel = dash.filter_panel().await.unwrap();
    assert_eq!(panel.grains, vec![TimeGrain::Month, TimeGrain::Quarter]);
    assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 2);
    assert_eq!(backend.distinct_statements(), 4);
}
