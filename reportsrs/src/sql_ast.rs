use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dialect::Dialect;
use crate::schema::ColumnRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Count,
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Coalesce,
    /// Truncating division of two integer expressions.
    IntDivide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub enum SqlExpr {
    /// Identifiers only ever come from a schema-validated column.
    Column(ColumnRef),
    /// Reference to an output alias (ORDER BY total_rentals).
    Alias(String),
    Star,
    Literal(Value),
    /// Bound parameter; the index is its position in the statement's parameter list.
    Param(usize),
    Function {
        func: Function,
        args: Vec<SqlExpr>,
    },
    BinaryOp {
        op: SqlBinaryOperator,
        left: Box<SqlExpr>,
        right: Box<SqlExpr>,
    },
    Aggregate {
        agg: Aggregation,
        expr: Box<SqlExpr>,
    },
    InList {
        expr: Box<SqlExpr>,
        list: Vec<SqlExpr>,
    },
    IsNotNull(Box<SqlExpr>),
}

impl SqlExpr {
    pub fn column(column: &ColumnRef) -> Self {
        SqlExpr::Column(column.clone())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SqlBinaryOperator {
    Add,
    Subtract,
}

#[derive(Debug, Clone)]
pub struct SelectItem {
    pub expr: SqlExpr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct OrderItem {
    pub expr: SqlExpr,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub distinct: bool,
    pub select: Vec<SelectItem>,
    pub from: TableRef,
    pub filters: Vec<SqlExpr>,
    pub group_by: Vec<SqlExpr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<u64>,
}

pub struct SqlRenderer<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> SqlRenderer<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    pub fn render_select(&self, query: &SelectQuery) -> String {
        let select_items: Vec<String> = query
            .select
            .iter()
            .map(|item| {
                let expr_sql = self.render_expr(&item.expr);
                match &item.alias {
                    Some(alias) => format!("{expr_sql} AS {}", self.dialect.quote_ident(alias)),
                    None => expr_sql,
                }
            })
            .collect();

        let distinct_kw = if query.distinct { "DISTINCT " } else { "" };
        let mut sql = format!(
            "SELECT {distinct_kw}{} FROM {}",
            select_items.join(", "),
            self.render_table_ref(&query.from)
        );

        if !query.filters.is_empty() {
            let filters: Vec<String> = query.filters.iter().map(|f| self.render_expr(f)).collect();
            sql.push_str(&format!(" WHERE {}", filters.join(" AND ")));
        }

        if !query.group_by.is_empty() {
            let groups: Vec<String> = query.group_by.iter().map(|g| self.render_expr(g)).collect();
            sql.push_str(&format!(" GROUP BY {}", groups.join(", ")));
        }

        if !query.order_by.is_empty() {
            let orders: Vec<String> = query
                .order_by
                .iter()
                .map(|o| {
                    let expr = self.render_expr(&o.expr);
                    let dir = match o.direction {
                        SortDirection::Asc => "ASC",
                        SortDirection::Desc => "DESC",
                    };
                    format!("{expr} {dir}")
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }

    fn render_table_ref(&self, table: &TableRef) -> String {
        self.dialect
            .qualify_table(table.schema.as_deref(), &table.name)
    }

    fn render_expr(&self, expr: &SqlExpr) -> String {
        match expr {
            SqlExpr::Column(column) => self.dialect.quote_ident(column.name()),
            SqlExpr::Alias(alias) => self.dialect.quote_ident(alias),
            SqlExpr::Star => "*".to_string(),
            SqlExpr::Literal(v) => self.dialect.render_literal(v),
            SqlExpr::Param(idx) => self.dialect.placeholder(*idx),
            SqlExpr::Function { func, args } => {
                let rendered_args: Vec<String> = args.iter().map(|a| self.render_expr(a)).collect();
                self.dialect.render_function(func, rendered_args)
            }
            SqlExpr::BinaryOp { op, left, right } => {
                let op_sql = match op {
                    SqlBinaryOperator::Add => "+",
                    SqlBinaryOperator::Subtract => "-",
                };
                format!(
                    "({} {} {})",
                    self.render_expr(left),
                    op_sql,
                    self.render_expr(right)
                )
            }
            SqlExpr::Aggregate { agg, expr } => self
                .dialect
                .render_aggregation(agg, &self.render_expr(expr)),
            SqlExpr::InList { expr, list } => {
                let rendered_values: Vec<String> =
                    list.iter().map(|v| self.render_expr(v)).collect();
                format!(
                    "{} IN ({})",
                    self.render_expr(expr),
                    rendered_values.join(", ")
                )
            }
            SqlExpr::IsNotNull(inner) => format!("{} IS NOT NULL", self.render_expr(inner)),
        }
    }
}
