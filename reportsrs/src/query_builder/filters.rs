//! Filter clause builder.
//!
//! Turns per-column selections into `column IN (?, ...)` clauses with the
//! selected values as bound parameters. Values never reach SQL text.

use serde::Serialize;
use serde_json::Value;

use crate::dialect::Dialect;
use crate::error::{ReportError, Result};
use crate::schema::ColumnRef;
use crate::sql_ast::SqlExpr;

/// Available distinct values of one column plus the user's selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSpec {
    pub column: ColumnRef,
    pub available: Vec<Value>,
    pub selected: Vec<Value>,
}

impl FilterSpec {
    pub fn new(column: ColumnRef, available: Vec<Value>, selected: Vec<Value>) -> Self {
        Self {
            column,
            available,
            selected,
        }
    }

    /// A spec with every available value selected.
    pub fn all(column: ColumnRef, available: Vec<Value>) -> Self {
        let selected = available.clone();
        Self::new(column, available, selected)
    }

    /// Selection covers every available value, i.e. no restriction.
    pub fn is_select_all(&self) -> bool {
        self.available.iter().all(|v| self.selected.contains(v))
    }

    /// Selected values must be distinct members of the available list.
    pub fn validate(&self) -> Result<()> {
        for (idx, value) in self.selected.iter().enumerate() {
            if !self.available.contains(value) {
                return Err(ReportError::InvalidFilterState(format!(
                    "value {value} is not an available option for {}",
                    self.column
                )));
            }
            if self.selected[..idx].contains(value) {
                return Err(ReportError::InvalidFilterState(format!(
                    "value {value} selected twice for {}",
                    self.column
                )));
            }
        }
        Ok(())
    }
}

/// One `column IN (...)` clause; its parameters occupy
/// `first_param..first_param + arity` in the predicate's parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InClause {
    pub column: ColumnRef,
    pub first_param: usize,
    pub arity: usize,
}

impl InClause {
    fn to_expr(&self) -> SqlExpr {
        SqlExpr::InList {
            expr: Box::new(SqlExpr::column(&self.column)),
            list: (self.first_param..self.first_param + self.arity)
                .map(SqlExpr::Param)
                .collect(),
        }
    }
}

/// AND-joined IN clauses and their parameters in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledPredicate {
    clauses: Vec<InClause>,
    params: Vec<Value>,
}

impl CompiledPredicate {
    pub fn clauses(&self) -> &[InClause] {
        &self.clauses
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn placeholder_count(&self) -> usize {
        self.clauses.iter().map(|c| c.arity).sum()
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnRef> {
        self.clauses.iter().map(|c| &c.column)
    }

    /// One expression per clause, for a query's WHERE list.
    pub fn to_exprs(&self) -> Vec<SqlExpr> {
        self.clauses.iter().map(InClause::to_expr).collect()
    }

    /// Clause text without the `WHERE` keyword; empty when unrestricted.
    pub fn render(&self, dialect: &dyn Dialect) -> String {
        self.clauses
            .iter()
            .map(|clause| {
                let placeholders: Vec<String> = (clause.first_param
                    ..clause.first_param + clause.arity)
                    .map(|idx| dialect.placeholder(idx))
                    .collect();
                format!(
                    "{} IN ({})",
                    dialect.quote_ident(clause.column.name()),
                    placeholders.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// Compile filter specs in order. Select-all and empty selections contribute nothing.
pub fn compile_filters(specs: &[FilterSpec]) -> Result<CompiledPredicate> {
    let mut predicate = CompiledPredicate::default();
    for spec in specs {
        spec.validate()?;
        if spec.selected.is_empty() {
            tracing::trace!(column = %spec.column, "empty selection, no clause");
            continue;
        }
        if spec.is_select_all() {
            tracing::trace!(column = %spec.column, "select-all, no clause");
            continue;
        }
        predicate.clauses.push(InClause {
            column: spec.column.clone(),
            first_param: predicate.params.len(),
            arity: spec.selected.len(),
        });
        predicate.params.extend(spec.selected.iter().cloned());
    }
    tracing::debug!(
        clauses = predicate.clauses.len(),
        params = predicate.params.len(),
        "compiled filter predicate"
    );
    Ok(predicate)
}
