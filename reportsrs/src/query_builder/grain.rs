//! Time grain resolution and period labels for the trend report.
//!
//! A grain is only offered when the view can support it: month needs `year`
//! and `month`; quarter needs `year` plus either a native `quarter` column or a
//! `month` column to derive it from. There is no silent fallback between grains.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ReportError, Result};
use crate::schema::{Capabilities, ColumnRef};
use crate::sql_ast::{Function, SqlBinaryOperator, SqlExpr};

const TREND: &str = "trend";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeGrain {
    #[default]
    Month,
    Quarter,
}

impl FromStr for TimeGrain {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(TimeGrain::Month),
            "quarter" => Ok(TimeGrain::Quarter),
            other => Err(ReportError::Config(format!("unknown time grain {other}"))),
        }
    }
}

impl fmt::Display for TimeGrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeGrain::Month => f.write_str("month"),
            TimeGrain::Quarter => f.write_str("quarter"),
        }
    }
}

/// Calendar quarter (1-4) of a month (1-12).
pub fn derive_quarter(month: u32) -> Option<u32> {
    (1..=12).contains(&month).then(|| (month - 1) / 3 + 1)
}

/// How the trend report buckets rows for a grain on a particular view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeBucket {
    Month { year: ColumnRef, month: ColumnRef },
    NativeQuarter { year: ColumnRef, quarter: ColumnRef },
    /// `((month - 1) / 3) + 1` with integer division.
    DerivedQuarter { year: ColumnRef, month: ColumnRef },
}

impl TimeBucket {
    pub fn resolve(caps: &Capabilities, grain: TimeGrain) -> Result<Self> {
        let year = caps
            .year
            .clone()
            .ok_or_else(|| ReportError::infeasible(TREND, "view has no 'year' column"))?;
        match grain {
            TimeGrain::Month => {
                let month = caps.month.clone().ok_or_else(|| {
                    ReportError::infeasible(TREND, "view has no 'month' column for a monthly trend")
                })?;
                Ok(TimeBucket::Month { year, month })
            }
            TimeGrain::Quarter => match (&caps.quarter, &caps.month) {
                (Some(quarter), _) => Ok(TimeBucket::NativeQuarter {
                    year,
                    quarter: quarter.clone(),
                }),
                (None, Some(month)) => Ok(TimeBucket::DerivedQuarter {
                    year,
                    month: month.clone(),
                }),
                (None, None) => Err(ReportError::infeasible(
                    TREND,
                    "no 'quarter' column and no 'month' column to compute it from",
                )),
            },
        }
    }

    pub fn grain(&self) -> TimeGrain {
        match self {
            TimeBucket::Month { .. } => TimeGrain::Month,
            TimeBucket::NativeQuarter { .. } | TimeBucket::DerivedQuarter { .. } => {
                TimeGrain::Quarter
            }
        }
    }

    pub fn year(&self) -> &ColumnRef {
        match self {
            TimeBucket::Month { year, .. }
            | TimeBucket::NativeQuarter { year, .. }
            | TimeBucket::DerivedQuarter { year, .. } => year,
        }
    }

    /// Column the bucket is read or derived from.
    pub(crate) fn bucket_source(&self) -> &ColumnRef {
        match self {
            TimeBucket::Month { month, .. } | TimeBucket::DerivedQuarter { month, .. } => month,
            TimeBucket::NativeQuarter { quarter, .. } => quarter,
        }
    }

    /// Output alias of the bucket column.
    pub fn bucket_alias(&self) -> &'static str {
        match self.grain() {
            TimeGrain::Month => "month",
            TimeGrain::Quarter => "quarter",
        }
    }

    pub(crate) fn bucket_expr(&self) -> SqlExpr {
        match self {
            TimeBucket::Month { month, .. } => SqlExpr::column(month),
            TimeBucket::NativeQuarter { quarter, .. } => SqlExpr::column(quarter),
            TimeBucket::DerivedQuarter { month, .. } => SqlExpr::BinaryOp {
                op: SqlBinaryOperator::Add,
                left: Box::new(SqlExpr::Function {
                    func: Function::IntDivide,
                    args: vec![
                        SqlExpr::BinaryOp {
                            op: SqlBinaryOperator::Subtract,
                            left: Box::new(SqlExpr::column(month)),
                            right: Box::new(SqlExpr::Literal(1.into())),
                        },
                        SqlExpr::Literal(3.into()),
                    ],
                }),
                right: Box::new(SqlExpr::Literal(1.into())),
            },
        }
    }
}

/// Grains the view can serve, in display order.
pub fn available_grains(caps: &Capabilities) -> Vec<TimeGrain> {
    [TimeGrain::Month, TimeGrain::Quarter]
        .into_iter()
        .filter(|grain| TimeBucket::resolve(caps, *grain).is_ok())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeriodBucket {
    Month(u32),
    Quarter(u32),
}

/// One trend bucket, labelled `YYYY-MM` or `YYYY-Q{n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    pub year: i32,
    pub bucket: PeriodBucket,
}

impl Period {
    pub fn month(year: i32, month: u32) -> Result<Self> {
        check_year(year)?;
        if !(1..=12).contains(&month) {
            return Err(ReportError::Execution(format!("month {month} out of range")));
        }
        Ok(Self {
            year,
            bucket: PeriodBucket::Month(month),
        })
    }

    pub fn quarter(year: i32, quarter: u32) -> Result<Self> {
        check_year(year)?;
        if !(1..=4).contains(&quarter) {
            return Err(ReportError::Execution(format!(
                "quarter {quarter} out of range"
            )));
        }
        Ok(Self {
            year,
            bucket: PeriodBucket::Quarter(quarter),
        })
    }

    pub fn for_grain(grain: TimeGrain, year: i32, bucket: u32) -> Result<Self> {
        match grain {
            TimeGrain::Month => Self::month(year, bucket),
            TimeGrain::Quarter => Self::quarter(year, bucket),
        }
    }

    pub fn grain(&self) -> TimeGrain {
        match self.bucket {
            PeriodBucket::Month(_) => TimeGrain::Month,
            PeriodBucket::Quarter(_) => TimeGrain::Quarter,
        }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

fn check_year(year: i32) -> Result<()> {
    if (0..=9999).contains(&year) {
        Ok(())
    } else {
        Err(ReportError::Execution(format!("year {year} out of range")))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bucket {
            PeriodBucket::Month(m) => write!(f, "{:04}-{:02}", self.year, m),
            PeriodBucket::Quarter(q) => write!(f, "{:04}-Q{}", self.year, q),
        }
    }
}

impl FromStr for Period {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ReportError::Execution(format!("invalid period label {s:?}"));
        let (year, rest) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        match rest.strip_prefix('Q') {
            Some(q) if q.len() == 1 => {
                Self::quarter(year, q.parse().map_err(|_| invalid())?)
            }
            None if rest.len() == 2 && rest.bytes().all(|b| b.is_ascii_digit()) => {
                Self::month(year, rest.parse().map_err(|_| invalid())?)
            }
            _ => Err(invalid()),
        }
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
