//! Print the report SQL a view with the given columns would get.
//!
//! Usage: print_sql <comma-separated columns> [month|quarter] [top_n]

use std::env;

use pagila_reports::dialect::DuckDbDialect;
use pagila_reports::query_builder::{compile_filters, FilterSpec};
use pagila_reports::{Metric, ReportBuilder, TimeGrain, ViewSchema};
use serde_json::json;

fn usage() {
    eprintln!("Usage: print_sql <columns> [month|quarter] [top_n]");
    eprintln!("Example: cargo run --example print_sql -- year,month,film_category,rental_amount quarter 10");
}

fn main() -> anyhow::Result<()> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let Some(columns) = args.first() else {
        usage();
        std::process::exit(1);
    };
    let grain: TimeGrain = args.get(1).map(|g| g.parse()).transpose()?.unwrap_or_default();
    let top_n: u32 = args.get(2).map(|n| n.parse()).transpose()?.unwrap_or(10);

    let schema = ViewSchema::new("vw_rental_analysis", columns.split(','));
    let dialect = DuckDbDialect;

    // Restrict the category filter to one value when the view has one, so the
    // printed SQL shows a bound parameter.
    let mut specs = Vec::new();
    if let Some(category) = schema.capabilities().category {
        specs.push(FilterSpec::new(
            category,
            vec![json!("Action"), json!("Comedy"), json!("Drama")],
            vec![json!("Action")],
        ));
    }
    let predicate = compile_filters(&specs)?;

    let builder = ReportBuilder::new(&schema);
    for query in [
        builder.categorical(&predicate, Metric::TotalRentals, top_n, &dialect),
        builder.trend(&predicate, Metric::TotalRentals, grain, &dialect),
    ] {
        match query {
            Ok(query) => {
                println!("-- {} report, params {:?}", query.kind, query.params);
                println!("{};", query.sql);
            }
            Err(e) => println!("-- {e}"),
        }
    }
    Ok(())
}
