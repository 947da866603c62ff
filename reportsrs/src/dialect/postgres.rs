//! PostgreSQL dialect implementation.

use crate::sql_ast::{Aggregation, Function};

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn placeholder(&self, idx: usize) -> String {
        format!("${}", idx + 1) // PostgreSQL uses $1, $2, ...
    }

    fn render_function(&self, func: &Function, args: Vec<String>) -> String {
        match func {
            // Integer operands divide with truncation in PostgreSQL.
            Function::IntDivide => match args.as_slice() {
                [left, right] => format!("({left} / {right})"),
                _ => "NULL".to_string(),
            },
            Function::Coalesce => format!("coalesce({})", args.join(", ")),
        }
    }

    // SUM over NUMERIC stays NUMERIC; cast so revenue arrives as a float.
    fn render_aggregation(&self, agg: &Aggregation, expr: &str) -> String {
        match agg {
            Aggregation::Count => format!("COUNT({expr})"),
            Aggregation::Sum => format!("CAST(SUM({expr}) AS DOUBLE PRECISION)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_from_one() {
        assert_eq!(PostgresDialect.placeholder(0), "$1");
        assert_eq!(PostgresDialect.placeholder(2), "$3");
    }

    #[test]
    fn sums_are_cast_to_double() {
        assert_eq!(
            PostgresDialect.render_aggregation(&Aggregation::Sum, "\"rental_amount\""),
            "CAST(SUM(\"rental_amount\") AS DOUBLE PRECISION)"
        );
    }

    #[test]
    fn qualifies_schema_and_table() {
        assert_eq!(
            PostgresDialect.qualify_table(Some("public"), "vw_rental_analysis"),
            "\"public\".\"vw_rental_analysis\""
        );
    }
}
