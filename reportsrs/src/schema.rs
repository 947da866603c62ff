//! Schema introspection and capability negotiation for the reporting view.
//!
//! Every feature of the dashboard (which reports render, which filters and
//! grains are offered, whether revenue can be summed) is decided once from the
//! discovered column set rather than by ad hoc membership checks at each call
//! site. [`ColumnRef`] is the only handle that lets a column name reach SQL text,
//! and it can only be obtained from a [`ViewSchema`] membership check.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::backends::BackendConnection;
use crate::cache::{Clock, TtlCache};
use crate::error::{ReportError, Result};

/// Column names the reports know how to use.
pub mod columns {
    pub const YEAR: &str = "year";
    pub const MONTH: &str = "month";
    pub const QUARTER: &str = "quarter";
    pub const FILM_CATEGORY: &str = "film_category";
    pub const FILM_RATING: &str = "film_rating";
    pub const RENTAL_AMOUNT: &str = "rental_amount";
    /// Store dimension spellings, in order of preference.
    pub const STORE_CANDIDATES: [&str; 3] = ["store_id", "store_city", "store_country"];
}

/// A column name verified to exist on the reporting view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ColumnRef(String);

impl ColumnRef {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase column set of the reporting view at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSchema {
    view: String,
    columns: BTreeSet<String>,
}

impl ViewSchema {
    pub fn new<I, S>(view: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            view: view.into(),
            columns: columns
                .into_iter()
                .map(|c| c.as_ref().trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains(&name.to_lowercase())
    }

    pub fn column(&self, name: &str) -> Option<ColumnRef> {
        let lowered = name.to_lowercase();
        self.columns.get(&lowered).map(|c| ColumnRef(c.clone()))
    }

    /// Like [`ViewSchema::column`], but an unknown name is an invalid filter state.
    pub fn require(&self, name: &str) -> Result<ColumnRef> {
        self.column(name).ok_or_else(|| {
            ReportError::InvalidFilterState(format!(
                "column {name} does not exist on {}",
                self.view
            ))
        })
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from_schema(self)
    }
}

/// Which filter a column feeds in the filter panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    Year,
    Category,
    Rating,
    Store,
}

impl DimensionKind {
    pub fn label(&self) -> &'static str {
        match self {
            DimensionKind::Year => "Year",
            DimensionKind::Category => "Film category",
            DimensionKind::Rating => "Film rating",
            DimensionKind::Store => "Store",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterDimension {
    pub kind: DimensionKind,
    pub column: ColumnRef,
}

/// Feature set negotiated against a [`ViewSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub year: Option<ColumnRef>,
    pub month: Option<ColumnRef>,
    pub quarter: Option<ColumnRef>,
    pub category: Option<ColumnRef>,
    pub rating: Option<ColumnRef>,
    pub store: Option<ColumnRef>,
    pub revenue: Option<ColumnRef>,
}

impl Capabilities {
    pub fn from_schema(schema: &ViewSchema) -> Self {
        let store = columns::STORE_CANDIDATES
            .iter()
            .find_map(|candidate| schema.column(candidate));
        Self {
            year: schema.column(columns::YEAR),
            month: schema.column(columns::MONTH),
            quarter: schema.column(columns::QUARTER),
            category: schema.column(columns::FILM_CATEGORY),
            rating: schema.column(columns::FILM_RATING),
            store,
            revenue: schema.column(columns::RENTAL_AMOUNT),
        }
    }

    /// Filterable dimensions in panel order: year, category, rating, store.
    pub fn filter_dimensions(&self) -> Vec<FilterDimension> {
        [
            (DimensionKind::Year, &self.year),
            (DimensionKind::Category, &self.category),
            (DimensionKind::Rating, &self.rating),
            (DimensionKind::Store, &self.store),
        ]
        .into_iter()
        .filter_map(|(kind, column)| {
            column.clone().map(|column| FilterDimension { kind, column })
        })
        .collect()
    }

    pub fn dimension(&self, kind: DimensionKind) -> Option<&ColumnRef> {
        match kind {
            DimensionKind::Year => self.year.as_ref(),
            DimensionKind::Category => self.category.as_ref(),
            DimensionKind::Rating => self.rating.as_ref(),
            DimensionKind::Store => self.store.as_ref(),
        }
    }

    pub fn categorical_available(&self) -> bool {
        self.category.is_some()
    }

    pub fn trend_available(&self) -> bool {
        self.year.is_some()
    }

    pub fn revenue_available(&self) -> bool {
        self.revenue.is_some()
    }
}

/// Caches the view's column set for a bounded duration.
#[derive(Debug)]
pub struct SchemaIntrospector {
    view: String,
    cache: Mutex<TtlCache<String, ViewSchema>>,
}

impl SchemaIntrospector {
    pub fn new(view: impl Into<String>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            view: view.into(),
            cache: Mutex::new(TtlCache::new(ttl, 1, clock)),
        }
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    /// Return the cached schema, re-reading the catalog once the TTL has elapsed.
    pub async fn schema(&self, backend: &dyn BackendConnection) -> Result<ViewSchema> {
        if let Some(schema) = self.cache.lock().await.get(&self.view).cloned() {
            tracing::trace!(view = %self.view, "schema cache hit");
            return Ok(schema);
        }

        let start = Instant::now();
        let names = backend.fetch_columns(&self.view).await.map_err(|e| match e {
            ReportError::SchemaUnavailable(_) => e,
            other => ReportError::SchemaUnavailable(format!(
                "cannot read columns of {}: {other}",
                self.view
            )),
        })?;
        let schema = ViewSchema::new(self.view.clone(), names);
        if schema.is_empty() {
            return Err(ReportError::SchemaUnavailable(format!(
                "{} has no columns or does not exist",
                self.view
            )));
        }
        tracing::debug!(
            view = %self.view,
            columns = schema.len(),
            ms = start.elapsed().as_millis(),
            "introspected view schema"
        );

        self.cache
            .lock()
            .await
            .insert(self.view.clone(), schema.clone());
        Ok(schema)
    }
}
