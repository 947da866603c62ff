use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    /// The view or its catalog entry cannot be read. Fatal for a render.
    #[error("schema unavailable: {0}")]
    SchemaUnavailable(String),
    /// A column required by a report, grain or metric is missing from the view.
    #[error("{report} report unavailable: {reason}")]
    ReportInfeasible { report: String, reason: String },
    /// The query ran but the current filters exclude every row.
    #[error("no data for current filters: {0}")]
    EmptyResult(String),
    /// A selection is not a subset of the values offered for its column.
    #[error("invalid filter state: {0}")]
    InvalidFilterState(String),
    #[error("sql generation error: {0}")]
    Sql(String),
    #[error("execution error: {0}")]
    Execution(String),
    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReportError {
    pub(crate) fn infeasible(report: impl Into<String>, reason: impl Into<String>) -> Self {
        ReportError::ReportInfeasible {
            report: report.into(),
            reason: reason.into(),
        }
    }

    /// Errors that only disable one report. Schema, filter-state and config
    /// errors describe the whole render and abort it.
    pub fn is_report_local(&self) -> bool {
        !matches!(
            self,
            ReportError::SchemaUnavailable(_)
                | ReportError::InvalidFilterState(_)
                | ReportError::Config(_)
        )
    }
}
