mod common;

use std::fs;

use rusqlite::Connection;

use wc26_predictor::artifacts::{ArtifactError, ArtifactPaths, load_pair, save_pair};
use wc26_predictor::dataset::{self, TrainingRunRecord, read_results_csv};
use wc26_predictor::forest::{Classifier, ForestConfig};
use wc26_predictor::preprocess::preprocess;
use wc26_predictor::training::train;

fn small_forest() -> ForestConfig {
    ForestConfig {
        n_estimators: 10,
        ..ForestConfig::default()
    }
}

#[test]
fn trained_pair_survives_persistence() {
    let records = read_results_csv(&common::fixture("results_sample.csv")).expect("fixture");
    let prepared = preprocess(&records).expect("preprocess");
    let outcome = train(&prepared.examples, small_forest()).expect("train");
    assert_eq!(outcome.eval_rows, 7);
    assert_eq!(outcome.train_rows, 28);

    let dir = tempfile::tempdir().expect("tempdir");
    let paths = ArtifactPaths::in_dir(dir.path());
    save_pair(&paths, &prepared.encoder, &outcome.model).expect("save");
    let pair = load_pair(&paths).expect("load");

    for (team, code) in prepared.encoder.codes() {
        assert_eq!(pair.encoder.encode(team), Ok(*code), "code drifted for {team}");
    }
    for example in &prepared.examples {
        let features = example.features();
        assert_eq!(
            pair.model.predict_probability(&features),
            outcome.model.predict_probability(&features)
        );
    }
}

#[test]
fn artifact_files_carry_the_binding_metadata() {
    let records = read_results_csv(&common::fixture("results_sample.csv")).expect("fixture");
    let prepared = preprocess(&records).expect("preprocess");
    let outcome = train(&prepared.examples, small_forest()).expect("train");

    let dir = tempfile::tempdir().expect("tempdir");
    let paths = ArtifactPaths::in_dir(dir.path());
    let fingerprint = save_pair(&paths, &prepared.encoder, &outcome.model).expect("save");

    let model: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&paths.model).expect("read")).expect("json");
    assert_eq!(model["encoder_fingerprint"], fingerprint.as_str());
    assert_eq!(
        model["feature_names"],
        serde_json::json!(["home_team_code", "away_team_code", "neutral"])
    );
    assert_eq!(model["classes"], serde_json::json!([0, 1, 2]));

    let mapping: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&paths.encoder).expect("read")).expect("json");
    assert_eq!(mapping["fingerprint"], fingerprint.as_str());
    assert_eq!(mapping["codes"]["Argentina"], 0);
}

#[test]
fn model_paired_with_foreign_encoder_refuses_to_load() {
    let records = read_results_csv(&common::fixture("results_sample.csv")).expect("fixture");
    let prepared = preprocess(&records).expect("preprocess");
    let outcome = train(&prepared.examples, small_forest()).expect("train");

    let dir = tempfile::tempdir().expect("tempdir");
    let paths = ArtifactPaths::in_dir(dir.path());
    save_pair(&paths, &prepared.encoder, &outcome.model).expect("save");

    let world_cup = common::world_cup_encoder();
    let other_dir = tempfile::tempdir().expect("tempdir");
    let other = ArtifactPaths::in_dir(other_dir.path());
    save_pair(&other, &world_cup, &outcome.model).expect("save");
    fs::copy(&other.encoder, &paths.encoder).expect("swap encoder");

    match load_pair(&paths) {
        Err(ArtifactError::EncoderMismatch {
            model_expects,
            encoder_has,
        }) => {
            assert_eq!(model_expects, prepared.encoder.fingerprint());
            assert_eq!(encoder_has, world_cup.fingerprint());
        }
        other => panic!("expected encoder mismatch, got {other:?}"),
    }
}

#[test]
fn training_runs_are_logged() {
    let conn = Connection::open_in_memory().expect("in-memory db");
    dataset::init_schema(&conn).expect("schema");

    let id = dataset::record_training_run(
        &conn,
        &TrainingRunRecord {
            started_at: "2026-06-01T00:00:00+00:00".to_string(),
            source: "tests/fixtures/results_sample.csv".to_string(),
            raw_rows: 42,
            modern_rows: 35,
            train_rows: 28,
            eval_rows: 7,
            accuracy: 0.57,
            encoder_fingerprint: "abc".to_string(),
            artifact_dir: "data".to_string(),
        },
    )
    .expect("record run");
    assert!(id > 0);

    let (rows, accuracy): (i64, f64) = conn
        .query_row(
            "SELECT train_rows, accuracy FROM training_runs WHERE run_id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("query run");
    assert_eq!(rows, 28);
    assert!((accuracy - 0.57).abs() < 1e-12);
}
