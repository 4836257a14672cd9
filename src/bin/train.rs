use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use wc26_predictor::artifacts::{self, ArtifactPaths};
use wc26_predictor::config::{self, DEFAULT_ARTIFACT_DIR};
use wc26_predictor::dataset::{self, TrainingRunRecord};
use wc26_predictor::forest::ForestConfig;
use wc26_predictor::preprocess::{self, MatchResult};
use wc26_predictor::teams::TeamRegistry;
use wc26_predictor::training;

/// Preprocess, fit, evaluate and persist the match outcome model.
#[derive(Parser)]
#[command(name = "train")]
struct Args {
    /// Read the results snapshot directly instead of the SQLite store
    #[arg(long)]
    csv: Option<PathBuf>,

    /// SQLite store: the training source when --csv is absent, and the run log
    #[arg(long, env = "WC26_DB_PATH")]
    db: Option<PathBuf>,

    /// Artifact output directory
    #[arg(long, env = "WC26_ARTIFACT_DIR", default_value = DEFAULT_ARTIFACT_DIR)]
    out: PathBuf,

    /// Number of trees
    #[arg(long, default_value_t = 100)]
    trees: usize,

    /// Forest seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_tracing();
    let args = Args::parse();
    let started_at = Utc::now().to_rfc3339();

    let db_path = args.db.clone().unwrap_or_else(dataset::default_db_path);
    let conn = dataset::open_db(&db_path)?;
    let (records, source) = match &args.csv {
        Some(csv) => (dataset::read_results_csv(csv)?, csv.display().to_string()),
        None => (dataset::load_records(&conn)?, db_path.display().to_string()),
    };

    let prepared = preprocess::preprocess(&records).context("preprocess results")?;
    let forest_config = ForestConfig {
        n_estimators: args.trees,
        seed: args.seed,
        ..ForestConfig::default()
    };
    let outcome = training::train(&prepared.examples, forest_config).context("train forest")?;

    let paths = ArtifactPaths::in_dir(&args.out);
    let fingerprint = artifacts::save_pair(&paths, &prepared.encoder, &outcome.model)
        .with_context(|| format!("write artifacts to {}", args.out.display()))?;

    let summary = &prepared.summary;
    println!("Training complete");
    println!("Source: {source}");
    println!(
        "Rows: raw={} pre_cutoff={} unscored={} kept={}",
        summary.raw_rows, summary.pre_cutoff, summary.unscored, summary.kept
    );
    println!(
        "Classes: home_win={:.1}% away_win={:.1}% draw={:.1}%",
        summary.classes.share(MatchResult::HomeWin) * 100.0,
        summary.classes.share(MatchResult::AwayWin) * 100.0,
        summary.classes.share(MatchResult::Draw) * 100.0
    );
    println!("Teams encoded: {}", summary.teams_encoded);
    println!(
        "Split: train={} eval={}",
        outcome.train_rows, outcome.eval_rows
    );
    println!();
    println!("Model Accuracy: {:.4}", outcome.accuracy());
    println!();
    print!("{}", outcome.evaluation.report.render());
    println!();
    let probs = &outcome.evaluation.probs;
    println!(
        "Brier={:.4} LogLoss={:.4} n={}",
        probs.brier, probs.log_loss, probs.samples
    );
    println!("Confusion (rows=actual, cols=predicted; draw, home_win, away_win):");
    for row in outcome.evaluation.report.confusion {
        println!("  {:>6} {:>6} {:>6}", row[0], row[1], row[2]);
    }

    let gaps = TeamRegistry::world_cup().coverage_gaps(&prepared.encoder);
    if !gaps.is_empty() {
        println!("Registry teams missing from encoder: {}", gaps.join(", "));
    }

    println!();
    println!("Model: {}", paths.model.display());
    println!("Encoder: {}", paths.encoder.display());
    println!("Encoder fingerprint: {fingerprint}");

    let run_id = dataset::record_training_run(
        &conn,
        &TrainingRunRecord {
            started_at,
            source,
            raw_rows: summary.raw_rows,
            modern_rows: summary.kept,
            train_rows: outcome.train_rows,
            eval_rows: outcome.eval_rows,
            accuracy: outcome.accuracy(),
            encoder_fingerprint: fingerprint,
            artifact_dir: args.out.display().to_string(),
        },
    )?;
    println!("Training run #{run_id} logged to {}", db_path.display());

    Ok(())
}
