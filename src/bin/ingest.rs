use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use wc26_predictor::config;
use wc26_predictor::dataset;

/// Mirror the international results snapshot into the local SQLite store.
#[derive(Parser)]
#[command(name = "ingest")]
struct Args {
    /// Results snapshot (date,home_team,away_team,home_score,away_score,...)
    #[arg(long, default_value = "data/results.csv")]
    csv: PathBuf,

    /// SQLite database path
    #[arg(long, env = "WC26_DB_PATH")]
    db: Option<PathBuf>,
}

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_tracing();
    let args = Args::parse();

    let db_path = args.db.unwrap_or_else(dataset::default_db_path);
    let records = dataset::read_results_csv(&args.csv)?;

    let mut conn = dataset::open_db(&db_path)?;
    let source = args.csv.display().to_string();
    let summary = dataset::ingest_records(&mut conn, db_path.clone(), &source, &records)
        .with_context(|| format!("ingest {source}"))?;

    println!("Results ingest complete");
    println!("DB: {}", summary.db_path.display());
    println!("Source: {source}");
    println!("Rows read: {}", summary.rows_read);
    println!("Rows upserted: {}", summary.rows_upserted);
    println!("Same-day duplicates merged: {}", summary.merged_duplicates);
    println!("Unscored fixtures: {}", summary.unscored);
    println!(
        "Date range: {} .. {}",
        summary.earliest_date.as_deref().unwrap_or("n/a"),
        summary.latest_date.as_deref().unwrap_or("n/a")
    );

    Ok(())
}
