//! The two measures every report computes.
//!
//! Both `total_rentals` and `total_revenue` are always selected, whichever one
//! the user is currently charting; the other is needed for hover text and the
//! summary cards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::schema::Capabilities;
use crate::sql_ast::{Aggregation, Function, SelectItem, SqlExpr};

pub const TOTAL_RENTALS: &str = "total_rentals";
pub const TOTAL_REVENUE: &str = "total_revenue";

/// Metric displayed on the charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    TotalRentals,
    TotalRevenue,
}

impl Metric {
    pub fn column(&self) -> &'static str {
        match self {
            Metric::TotalRentals => TOTAL_RENTALS,
            Metric::TotalRevenue => TOTAL_REVENUE,
        }
    }

    /// Axis and card label.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::TotalRentals => "Total rentals",
            Metric::TotalRevenue => "Total revenue",
        }
    }

    pub(crate) fn check_feasible(&self, caps: &Capabilities, report: &str) -> Result<()> {
        if *self == Metric::TotalRevenue && !caps.revenue_available() {
            return Err(ReportError::infeasible(
                report,
                "view has no 'rental_amount' column to sum revenue from",
            ));
        }
        Ok(())
    }
}

impl FromStr for Metric {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            TOTAL_RENTALS => Ok(Metric::TotalRentals),
            TOTAL_REVENUE => Ok(Metric::TotalRevenue),
            other => Err(ReportError::Config(format!("unknown metric {other}"))),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// `COUNT(*) AS total_rentals, SUM(rental_amount) AS total_revenue`.
///
/// Without a `rental_amount` column revenue is selected as NULL. With
/// `coalesce_null_revenue` a group whose amounts are all NULL reports 0
/// instead of NULL.
pub(crate) fn measure_items(caps: &Capabilities, coalesce_null_revenue: bool) -> Vec<SelectItem> {
    let rentals = SqlExpr::Aggregate {
        agg: Aggregation::Count,
        expr: Box::new(SqlExpr::Star),
    };
    let revenue = match &caps.revenue {
        Some(amount) => {
            let sum = SqlExpr::Aggregate {
                agg: Aggregation::Sum,
                expr: Box::new(SqlExpr::column(amount)),
            };
            if coalesce_null_revenue {
                SqlExpr::Function {
                    func: Function::Coalesce,
                    args: vec![sum, SqlExpr::Literal(0.into())],
                }
            } else {
                sum
            }
        }
        None => SqlExpr::Literal(serde_json::Value::Null),
    };
    vec![
        SelectItem {
            expr: rentals,
            alias: Some(TOTAL_RENTALS.to_string()),
        },
        SelectItem {
            expr: revenue,
            alias: Some(TOTAL_REVENUE.to_string()),
        },
    ]
}
