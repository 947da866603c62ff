use crate::sql_ast::{OrderItem, SelectItem, SelectQuery, SortDirection, SqlExpr, TableRef};

use super::grain::TimeBucket;

/// `SELECT year, bucket, measures ... GROUP BY year, bucket ORDER BY year, bucket`.
///
/// The bucket expression is repeated in GROUP BY; ordering uses the output
/// aliases so a derived quarter is not computed a third time. Rows with a NULL
/// year or bucket source have no period and are left out.
pub(super) fn build(
    table: TableRef,
    bucket: &TimeBucket,
    measures: Vec<SelectItem>,
    mut filters: Vec<SqlExpr>,
) -> SelectQuery {
    let year = bucket.year();
    let bucket_alias = bucket.bucket_alias();

    let mut select = vec![
        SelectItem {
            expr: SqlExpr::column(year),
            alias: None,
        },
        SelectItem {
            expr: bucket.bucket_expr(),
            alias: Some(bucket_alias.to_string()),
        },
    ];
    select.extend(measures);

    // After the predicate so positional placeholders keep their order.
    filters.push(SqlExpr::IsNotNull(Box::new(SqlExpr::column(year))));
    filters.push(SqlExpr::IsNotNull(Box::new(SqlExpr::column(
        bucket.bucket_source(),
    ))));

    SelectQuery {
        distinct: false,
        select,
        from: table,
        filters,
        group_by: vec![SqlExpr::column(year), bucket.bucket_expr()],
        order_by: vec![
            OrderItem {
                expr: SqlExpr::Alias(year.name().to_string()),
                direction: SortDirection::Asc,
            },
            OrderItem {
                expr: SqlExpr::Alias(bucket_alias.to_string()),
                direction: SortDirection::Asc,
            },
        ],
        limit: None,
    }
}
