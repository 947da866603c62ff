//! Report composition against hand-built view schemas.
#![cfg(feature = "duckdb")]

use pagila_reports::dialect::DuckDbDialect;
use pagila_reports::query_builder::{compile_filters, CompiledPredicate, FilterSpec};
use pagila_reports::{Metric, ReportBuilder, ReportError, TimeGrain, ViewSchema};
use serde_json::{json, Value};

fn schema(cols: &[&str]) -> ViewSchema {
    ViewSchema::new("vw_rental_analysis", cols.iter().copied())
}

fn full_view() -> ViewSchema {
    schema(&[
        "year",
        "month",
        "film_category",
        "film_rating",
        "store_id",
        "rental_amount",
    ])
}

fn spec(schema: &ViewSchema, column: &str, available: Vec<Value>, selected: Vec<Value>) -> FilterSpec {
    FilterSpec::new(schema.require(column).unwrap(), available, selected)
}

#[test]
fn all_years_selected_adds_no_year_clause() {
    let view = full_view();
    let years = vec![json!(2020), json!(2021), json!(2022)];
    let predicate = compile_filters(&[spec(&view, "year", years.clone(), years)]).unwrap();
    assert!(predicate.is_empty());

    let query = ReportBuilder::new(&view)
        .categorical(&predicate, Metric::TotalRentals, 10, &DuckDbDialect)
        .unwrap();
    assert!(!query.sql.contains(" IN ("));
    assert!(query.params.is_empty());
}

#[test]
fn single_category_becomes_one_bound_parameter() {
    let view = full_view();
    let predicate = compile_filters(&[spec(
        &view,
        "film_category",
        vec![json!("Action"), json!("Comedy"), json!("Drama")],
        vec![json!("Action")],
    )])
    .unwrap();

    let query = ReportBuilder::new(&view)
        .categorical(&predicate, Metric::TotalRentals, 10, &DuckDbDialect)
        .unwrap();
    assert!(query.sql.contains("WHERE \"film_category\" IN (?)"));
    assert!(!query.sql.contains("Action"));
    assert_eq!(query.params, vec![json!("Action")]);
}

#[test]
fn categorical_query_shape() {
    let view = full_view();
    let query = ReportBuilder::new(&view)
        .categorical(&CompiledPredicate::default(), Metric::TotalRevenue, 7, &DuckDbDialect)
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT \"film_category\", COUNT(*) AS \"total_rentals\", \
         SUM(\"rental_amount\") AS \"total_revenue\" FROM \"vw_rental_analysis\" \
         WHERE \"film_category\" IS NOT NULL \
         GROUP BY \"film_category\" ORDER BY \"total_rentals\" DESC LIMIT 7"
    );
    assert_eq!(query.metric, Metric::TotalRevenue);
}

#[test]
fn placeholders_number_across_clauses() {
    let view = full_view();
    let predicate = compile_filters(&[
        spec(
            &view,
            "year",
            vec![json!(2020), json!(2021), json!(2022)],
            vec![json!(2021), json!(2022)],
        ),
        spec(
            &view,
            "film_rating",
            vec![json!("G"), json!("PG"), json!("R")],
            vec![json!("R")],
        ),
    ])
    .unwrap();
    let query = ReportBuilder::new(&view)
        .trend(&predicate, Metric::TotalRentals, TimeGrain::Month, &DuckDbDialect)
        .unwrap();
    assert!(query.sql.contains(
        "WHERE \"year\" IN (?, ?) AND \"film_rating\" IN (?) \
         AND \"year\" IS NOT NULL AND \"month\" IS NOT NULL"
    ));
    assert_eq!(query.params, vec![json!(2021), json!(2022), json!("R")]);
}

#[test]
fn month_trend_is_ordered_and_untruncated() {
    let view = full_view();
    let query = ReportBuilder::new(&view)
        .trend(&CompiledPredicate::default(), Metric::TotalRentals, TimeGrain::Month, &DuckDbDialect)
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT \"year\", \"month\" AS \"month\", COUNT(*) AS \"total_rentals\", \
         SUM(\"rental_amount\") AS \"total_revenue\" FROM \"vw_rental_analysis\" \
         WHERE \"year\" IS NOT NULL AND \"month\" IS NOT NULL \
         GROUP BY \"year\", \"month\" ORDER BY \"year\" ASC, \"month\" ASC"
    );
    assert!(!query.sql.contains("LIMIT"));
    assert_eq!(query.grain, Some(TimeGrain::Month));
}

#[test]
fn quarter_trend_derives_from_month() {
    let view = schema(&["year", "month", "film_category", "rental_amount"]);
    let query = ReportBuilder::new(&view)
        .trend(&CompiledPredicate::default(), Metric::TotalRentals, TimeGrain::Quarter, &DuckDbDialect)
        .unwrap();
    assert!(query
        .sql
        .contains("(((\"month\" - 1) // 3) + 1) AS \"quarter\""));
    assert!(query.sql.contains("\"month\" IS NOT NULL"));
    assert!(query.sql.ends_with("ORDER BY \"year\" ASC, \"quarter\" ASC"));
}

#[test]
fn quarter_trend_uses_native_column() {
    let view = schema(&["year", "quarter", "film_category"]);
    let query = ReportBuilder::new(&view)
        .trend(&CompiledPredicate::default(), Metric::TotalRentals, TimeGrain::Quarter, &DuckDbDialect)
        .unwrap();
    assert!(query.sql.contains("\"quarter\" AS \"quarter\""));
    assert!(query.sql.contains("\"quarter\" IS NOT NULL"));
    assert!(!query.sql.contains("//"));
}

#[test]
fn missing_grouping_columns_make_reports_infeasible() {
    let no_category = schema(&["year", "month"]);
    let err = ReportBuilder::new(&no_category)
        .categorical(&CompiledPredicate::default(), Metric::TotalRentals, 10, &DuckDbDialect)
        .unwrap_err();
    assert!(matches!(err, ReportError::ReportInfeasible { ref report, .. } if report == "categorical"));

    let no_year = schema(&["month", "film_category"]);
    let err = ReportBuilder::new(&no_year)
        .trend(&CompiledPredicate::default(), Metric::TotalRentals, TimeGrain::Month, &DuckDbDialect)
        .unwrap_err();
    assert!(matches!(err, ReportError::ReportInfeasible { ref report, .. } if report == "trend"));

    let no_bucket = schema(&["year", "film_category"]);
    let err = ReportBuilder::new(&no_bucket)
        .trend(&CompiledPredicate::default(), Metric::TotalRentals, TimeGrain::Quarter, &DuckDbDialect)
        .unwrap_err();
    assert!(err.is_report_local());
}

#[test]
fn revenue_is_null_and_metric_infeasible_without_amounts() {
    let view = schema(&["year", "month", "film_category"]);
    let builder = ReportBuilder::new(&view);
    let query = builder
        .categorical(&CompiledPredicate::default(), Metric::TotalRentals, 10, &DuckDbDialect)
        .unwrap();
    assert!(query.sql.contains("NULL AS \"total_revenue\""));

    let err = builder
        .categorical(&CompiledPredicate::default(), Metric::TotalRevenue, 10, &DuckDbDialect)
        .unwrap_err();
    assert!(matches!(err, ReportError::ReportInfeasible { .. }));
}

#[test]
fn coalesce_policy_wraps_revenue_sum() {
    let view = full_view();
    let query = ReportBuilder::new(&view)
        .with_coalesce_null_revenue(true)
        .categorical(&CompiledPredicate::default(), Metric::TotalRevenue, 10, &DuckDbDialect)
        .unwrap();
    assert!(query
        .sql
        .contains("coalesce(SUM(\"rental_amount\"), 0) AS \"total_revenue\""));
}

#[test]
fn top_n_outside_bounds_is_a_config_error() {
    let view = full_view();
    let builder = ReportBuilder::new(&view);
    for top_n in [4, 26] {
        let err = builder
            .categorical(&CompiledPredicate::default(), Metric::TotalRentals, top_n, &DuckDbDialect)
            .unwrap_err();
        assert!(matches!(err, ReportError::Config(_)));
    }
    assert!(builder
        .categorical(&CompiledPredicate::default(), Metric::TotalRentals, 25, &DuckDbDialect)
        .is_ok());
}

#[test]
fn predicate_from_another_snapshot_is_rejected() {
    let old = full_view();
    let predicate = compile_filters(&[spec(
        &old,
        "film_rating",
        vec![json!("G"), json!("PG")],
        vec![json!("G")],
    )])
    .unwrap();

    let current = schema(&["year", "month", "film_category"]);
    let err = ReportBuilder::new(&current)
        .categorical(&predicate, Metric::TotalRentals, 10, &DuckDbDialect)
        .unwrap_err();
    assert!(matches!(err, ReportError::ReportInfeasible { .. }));
}

#[test]
fn selection_outside_options_is_invalid() {
    let view = full_view();
    let err = compile_filters(&[spec(
        &view,
        "film_category",
        vec![json!("Action")],
        vec![json!("Horror")],
    )])
    .unwrap_err();
    assert!(matches!(err, ReportError::InvalidFilterState(_)));
}

#[test]
fn view_schema_qualification_from_builder() {
    let view = full_view();
    let query = ReportBuilder::new(&view)
        .with_view_schema(Some("reporting".to_string()))
        .categorical(&CompiledPredicate::default(), Metric::TotalRentals, 10, &DuckDbDialect)
        .unwrap();
    assert!(query.sql.contains("FROM \"reporting\".\"vw_rental_analysis\""));
}
