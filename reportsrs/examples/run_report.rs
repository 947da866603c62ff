//! Build a small rental view in a DuckDB file and render the dashboard as JSON.

use std::path::Path;

use pagila_reports::{
    Dashboard, DimensionKind, ReportOptions, ReportsConfig, Selections, TimeGrain,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn bootstrap_duckdb(path: &Path) -> anyhow::Result<()> {
    let conn = duckdb::Connection::open(path)?;
    conn.execute_batch(
        "
        CREATE TABLE rentals (
            rental_id INTEGER PRIMARY KEY,
            rented_at DATE,
            film_category VARCHAR,
            film_rating VARCHAR,
            store_id INTEGER,
            rental_amount DECIMAL(5, 2)
        );
        INSERT INTO rentals VALUES
            (1, '2022-01-14', 'Action', 'PG', 1, 4.99),
            (2, '2022-02-03', 'Action', 'R', 2, 2.99),
            (3, '2022-02-20', 'Comedy', 'PG', 1, 0.99),
            (4, '2022-05-11', 'Drama', 'G', 2, 4.99),
            (5, '2022-07-02', 'Comedy', 'PG-13', 1, 2.99),
            (6, '2022-11-28', 'Action', 'PG', 2, NULL);
        CREATE VIEW vw_rental_analysis AS
            SELECT
                CAST(year(rented_at) AS INTEGER) AS year,
                CAST(month(rented_at) AS INTEGER) AS month,
                film_category,
                film_rating,
                store_id,
                rental_amount
            FROM rentals;
        ",
    )?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pagila_reports=info,warn")),
        )
        .init();

    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("pagila_demo.duckdb");
    bootstrap_duckdb(&db_path)?;

    let mut config = ReportsConfig::load_default();
    config.postgres.connection_string = None;
    config.duckdb.path = Some(db_path.display().to_string());
    let dashboard = Dashboard::connect(config)?;

    let panel = dashboard.filter_panel().await?;
    println!("{}", serde_json::to_string_pretty(&panel)?);

    let selections = Selections::new().select(DimensionKind::Store, [json!(1)]);
    let options = ReportOptions {
        grain: TimeGrain::Quarter,
        ..Default::default()
    };
    let view = dashboard.render(&selections, &options).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
