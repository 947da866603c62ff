//! Typed report rows and the summary figures shown next to each chart.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ReportError, Result};
use crate::executor::QueryResult;
use crate::query_builder::{Metric, Period, ReportKind, TimeGrain, TOTAL_RENTALS, TOTAL_REVENUE};
use crate::schema::columns;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRow {
    pub film_category: String,
    pub total_rentals: i64,
    /// `None` when every amount in the group is NULL (or the view has no amounts).
    pub total_revenue: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRow {
    pub year: i32,
    pub bucket: u32,
    pub period: Period,
    pub total_rentals: i64,
    pub total_revenue: Option<f64>,
}

impl TrendRow {
    /// Value of `metric` for this period; a missing revenue sum counts as absent.
    pub fn metric_value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::TotalRentals => Some(self.total_rentals as f64),
            Metric::TotalRevenue => self.total_revenue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopCategory {
    pub film_category: String,
    pub total_rentals: i64,
    pub total_revenue: Option<f64>,
}

/// Totals over the rows returned by the categorical report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub total_rentals: i64,
    pub total_revenue: Option<f64>,
    pub top_category: Option<TopCategory>,
}

impl CategorySummary {
    pub fn from_rows(rows: &[CategoryRow]) -> Self {
        let total_rentals = rows.iter().map(|r| r.total_rentals).sum();
        let total_revenue = sum_present(rows.iter().map(|r| r.total_revenue));
        // First row wins among equal counts.
        let top_category = rows
            .iter()
            .fold(None::<&CategoryRow>, |best, row| match best {
                Some(b) if b.total_rentals >= row.total_rentals => Some(b),
                _ => Some(row),
            })
            .map(|row| TopCategory {
                film_category: row.film_category.clone(),
                total_rentals: row.total_rentals,
                total_revenue: row.total_revenue,
            });
        Self {
            total_rentals,
            total_revenue,
            top_category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakPeriod {
    pub period: Period,
    pub value: f64,
}

/// Range, total, average and peak of the active metric across trend periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub metric: Metric,
    pub first_period: Option<Period>,
    pub last_period: Option<Period>,
    pub total: Option<f64>,
    pub average: Option<f64>,
    pub peak: Option<PeakPeriod>,
}

impl TrendSummary {
    pub fn from_rows(rows: &[TrendRow], metric: Metric) -> Self {
        let values: Vec<(Period, f64)> = rows
            .iter()
            .filter_map(|r| r.metric_value(metric).map(|v| (r.period, v)))
            .collect();
        let total = sum_present(values.iter().map(|(_, v)| Some(*v)));
        let average = total.map(|t| t / values.len() as f64);
        let peak = values
            .iter()
            .fold(None::<&(Period, f64)>, |best, item| match best {
                Some(b) if b.1 >= item.1 => Some(b),
                _ => Some(item),
            })
            .map(|(period, value)| PeakPeriod {
                period: *period,
                value: *value,
            });
        Self {
            metric,
            first_period: rows.first().map(|r| r.period),
            last_period: rows.last().map(|r| r.period),
            total,
            average,
            peak,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryReport {
    pub title: &'static str,
    pub metric: Metric,
    pub metric_label: &'static str,
    pub top_n: u32,
    pub rows: Vec<CategoryRow>,
    pub summary: CategorySummary,
}

impl CategoryReport {
    /// Shape a categorical result. No rows is [`ReportError::EmptyResult`].
    pub fn from_result(result: &QueryResult, metric: Metric, top_n: u32) -> Result<Self> {
        ensure_rows(result, ReportKind::Categorical)?;
        let rows = result
            .rows
            .iter()
            .map(category_row)
            .collect::<Result<Vec<_>>>()?;
        let summary = CategorySummary::from_rows(&rows);
        Ok(Self {
            title: ReportKind::Categorical.title(),
            metric,
            metric_label: metric.label(),
            top_n,
            rows,
            summary,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub title: &'static str,
    pub metric: Metric,
    pub metric_label: &'static str,
    pub grain: TimeGrain,
    pub rows: Vec<TrendRow>,
    pub summary: TrendSummary,
}

impl TrendReport {
    /// Shape a trend result. Rows keep the ascending order of the query.
    pub fn from_result(result: &QueryResult, metric: Metric, grain: TimeGrain) -> Result<Self> {
        ensure_rows(result, ReportKind::Trend)?;
        let rows = result
            .rows
            .iter()
            .map(|row| trend_row(row, grain))
            .collect::<Result<Vec<_>>>()?;
        let summary = TrendSummary::from_rows(&rows, metric);
        Ok(Self {
            title: ReportKind::Trend.title(),
            metric,
            metric_label: metric.label(),
            grain,
            rows,
            summary,
        })
    }
}

fn ensure_rows(result: &QueryResult, kind: ReportKind) -> Result<()> {
    if result.is_empty() {
        return Err(ReportError::EmptyResult(format!(
            "{} report returned no rows",
            kind.name()
        )));
    }
    Ok(())
}

fn category_row(row: &Map<String, Value>) -> Result<CategoryRow> {
    let film_category = match field(row, columns::FILM_CATEGORY)? {
        Value::String(s) => s.clone(),
        Value::Null => {
            return Err(ReportError::Execution(format!(
                "column {}: category is null",
                columns::FILM_CATEGORY
            )))
        }
        other => other.to_string(),
    };
    Ok(CategoryRow {
        film_category,
        total_rentals: required_i64(row, TOTAL_RENTALS)?,
        total_revenue: optional_f64(row, TOTAL_REVENUE)?,
    })
}

fn trend_row(row: &Map<String, Value>, grain: TimeGrain) -> Result<TrendRow> {
    let year = required_i64(row, columns::YEAR)?;
    let year = i32::try_from(year)
        .map_err(|_| ReportError::Execution(format!("year {year} out of range")))?;
    let alias = match grain {
        TimeGrain::Month => columns::MONTH,
        TimeGrain::Quarter => columns::QUARTER,
    };
    let bucket = required_i64(row, alias)?;
    let bucket = u32::try_from(bucket)
        .map_err(|_| ReportError::Execution(format!("{alias} {bucket} out of range")))?;
    Ok(TrendRow {
        year,
        bucket,
        period: Period::for_grain(grain, year, bucket)?,
        total_rentals: required_i64(row, TOTAL_RENTALS)?,
        total_revenue: optional_f64(row, TOTAL_REVENUE)?,
    })
}

fn field<'r>(row: &'r Map<String, Value>, name: &str) -> Result<&'r Value> {
    row.get(name)
        .ok_or_else(|| ReportError::Execution(format!("result row has no column {name}")))
}

fn required_i64(row: &Map<String, Value>, name: &str) -> Result<i64> {
    let value = field(row, name)?;
    as_i64(value)
        .ok_or_else(|| ReportError::Execution(format!("column {name}: expected integer, got {value}")))
}

fn optional_f64(row: &Map<String, Value>, name: &str) -> Result<Option<f64>> {
    match row.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_f64(value).map(Some).ok_or_else(|| {
            ReportError::Execution(format!("column {name}: expected number, got {value}"))
        }),
    }
}

/// Integers may arrive as JSON numbers, integral floats or numeric strings.
fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn sum_present(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ColumnMeta;
    use serde_json::json;

    fn result(rows: Vec<Value>) -> QueryResult {
        let rows: Vec<Map<String, Value>> = rows
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        let columns = rows
            .first()
            .map(|r| {
                r.keys()
                    .map(|k| ColumnMeta { name: k.clone() })
                    .collect()
            })
            .unwrap_or_default();
        QueryResult { columns, rows }
    }

    #[test]
    fn categorical_summary_matches_cards() {
        let res = result(vec![
            json!({"film_category": "Sports", "total_rentals": 120, "total_revenue": 450.5}),
            json!({"film_category": "Animation", "total_rentals": 120, "total_revenue": 400.0}),
            json!({"film_category": "Drama", "total_rentals": 80, "total_revenue": null}),
        ]);
        let report = CategoryReport::from_result(&res, Metric::TotalRentals, 10).unwrap();
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[2].total_revenue, None);
        assert_eq!(report.summary.total_rentals, 320);
        assert_eq!(report.summary.total_revenue, Some(850.5));
        let top = report.summary.top_category.unwrap();
        assert_eq!(top.film_category, "Sports");
        assert_eq!(top.total_rentals, 120);
    }

    #[test]
    fn null_category_is_not_a_category_named_null() {
        let res = result(vec![
            json!({"film_category": "null", "total_rentals": 2, "total_revenue": 5.0}),
            json!({"film_category": null, "total_rentals": 1, "total_revenue": 2.5}),
        ]);
        let err = CategoryReport::from_result(&res, Metric::TotalRentals, 10).unwrap_err();
        assert!(matches!(err, ReportError::Execution(_)));
    }

    #[test]
    fn empty_result_is_its_own_outcome() {
        let err = CategoryReport::from_result(&QueryResult::default(), Metric::TotalRentals, 10)
            .unwrap_err();
        assert!(matches!(err, ReportError::EmptyResult(_)));
        assert!(err.is_report_local());
    }

    #[test]
    fn trend_rows_get_period_labels() {
        let res = result(vec![
            json!({"year": 2021, "quarter": 1, "total_rentals": 10, "total_revenue": "20.50"}),
            json!({"year": 2021, "quarter": 2, "total_rentals": 30, "total_revenue": 60.0}),
            json!({"year": 2021, "quarter": 4, "total_rentals": 30, "total_revenue": 10.0}),
        ]);
        let report = TrendReport::from_result(&res, Metric::TotalRentals, TimeGrain::Quarter)
            .unwrap();
        let labels: Vec<String> = report.rows.iter().map(|r| r.period.label()).collect();
        assert_eq!(labels, vec!["2021-Q1", "2021-Q2", "2021-Q4"]);
        assert_eq!(report.rows[0].total_revenue, Some(20.5));

        let summary = &report.summary;
        assert_eq!(summary.first_period.unwrap().label(), "2021-Q1");
        assert_eq!(summary.last_period.unwrap().label(), "2021-Q4");
        assert_eq!(summary.total, Some(70.0));
        let peak = summary.peak.as_ref().unwrap();
        assert_eq!(peak.period.label(), "2021-Q2");
        assert_eq!(peak.value, 30.0);
    }

    #[test]
    fn revenue_average_skips_periods_without_amounts() {
        let res = result(vec![
            json!({"year": 2022, "month": 1, "total_rentals": 5, "total_revenue": null}),
            json!({"year": 2022, "month": 2, "total_rentals": 5, "total_revenue": 9.0}),
            json!({"year": 2022, "month": 3, "total_rentals": 5, "total_revenue": 3.0}),
        ]);
        let report =
            TrendReport::from_result(&res, Metric::TotalRevenue, TimeGrain::Month).unwrap();
        assert_eq!(report.summary.total, Some(12.0));
        assert_eq!(report.summary.average, Some(6.0));
        assert_eq!(report.summary.peak.as_ref().unwrap().period.label(), "2022-02");
    }

    #[test]
    fn malformed_bucket_is_an_execution_error() {
        let res = result(vec![
            json!({"year": 2022, "month": 13, "total_rentals": 5, "total_revenue": null}),
        ]);
        let err = TrendReport::from_result(&res, Metric::TotalRentals, TimeGrain::Month)
            .unwrap_err();
        assert!(matches!(err, ReportError::Execution(_)));
    }
}
