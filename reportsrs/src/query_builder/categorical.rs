use crate::schema::ColumnRef;
use crate::sql_ast::{OrderItem, SelectItem, SelectQuery, SortDirection, SqlExpr, TableRef};

use super::measures::TOTAL_RENTALS;

/// `SELECT category, measures ... GROUP BY category ORDER BY total_rentals DESC LIMIT n`.
///
/// Rentals without a category are not a group of their own.
pub(super) fn build(
    table: TableRef,
    category: &ColumnRef,
    measures: Vec<SelectItem>,
    mut filters: Vec<SqlExpr>,
    top_n: u32,
) -> SelectQuery {
    let mut select = vec![SelectItem {
        expr: SqlExpr::column(category),
        alias: None,
    }];
    select.extend(measures);
    filters.push(SqlExpr::IsNotNull(Box::new(SqlExpr::column(category))));

    SelectQuery {
        distinct: false,
        select,
        from: table,
        filters,
        group_by: vec![SqlExpr::column(category)],
        order_by: vec![OrderItem {
            expr: SqlExpr::Alias(TOTAL_RENTALS.to_string()),
            direction: SortDirection::Desc,
        }],
        limit: Some(u64::from(top_n)),
    }
}
