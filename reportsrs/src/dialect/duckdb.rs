//! DuckDB dialect implementation.

use crate::sql_ast::Function;

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct DuckDbDialect;

impl Dialect for DuckDbDialect {
    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn render_function(&self, func: &Function, args: Vec<String>) -> String {
        match func {
            // `/` is float division in DuckDB; `//` keeps integers integral.
            Function::IntDivide => match args.as_slice() {
                [left, right] => format!("({left} // {right})"),
                _ => "NULL".to_string(),
            },
            Function::Coalesce => format!("coalesce({})", args.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_embedded_double_quotes() {
        assert_eq!(DuckDbDialect.quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn integer_division_uses_floor_operator() {
        let sql = DuckDbDialect.render_function(
            &Function::IntDivide,
            vec!["(\"month\" - 1)".to_string(), "3".to_string()],
        );
        assert_eq!(sql, "((\"month\" - 1) // 3)");
    }

    #[test]
    fn placeholders_are_positional_question_marks() {
        assert_eq!(DuckDbDialect.placeholder(0), "?");
        assert_eq!(DuckDbDialect.placeholder(7), "?");
    }
}
