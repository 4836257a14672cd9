use std::path::PathBuf;

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use wc26_predictor::dataset::read_results_csv;
use wc26_predictor::encoder::TeamEncoder;
use wc26_predictor::forest::{ForestConfig, RandomForest};
use wc26_predictor::preprocess::{FeatureVector, MatchResult, preprocess};
use wc26_predictor::service::PredictionService;
use wc26_predictor::teams::{TeamRegistry, WORLD_CUP_TEAMS};

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/results_sample.csv")
}

fn synthetic_rows(teams: u32) -> (Vec<FeatureVector>, Vec<MatchResult>) {
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for home in 0..teams {
        for away in 0..teams {
            if home == away {
                continue;
            }
            let neutral = (home * 7 + away) % 4 == 0;
            features.push(FeatureVector::new(home, away, neutral));
            labels.push(MatchResult::ALL[((home + 2 * away) % 3) as usize]);
        }
    }
    (features, labels)
}

fn world_cup_service() -> PredictionService {
    let encoder = TeamEncoder::fit(WORLD_CUP_TEAMS);
    let (features, labels) = synthetic_rows(encoder.len() as u32);
    let forest = RandomForest::fit(&features, &labels, ForestConfig::default()).unwrap();
    PredictionService::new(TeamRegistry::world_cup().clone(), encoder, Box::new(forest))
}

fn bench_preprocess(c: &mut Criterion) {
    let records = read_results_csv(&fixture_path()).expect("valid fixture csv");
    c.bench_function("preprocess_fixture", |b| {
        b.iter(|| {
            let prepared = preprocess(black_box(&records)).unwrap();
            black_box(prepared.examples.len());
        })
    });
}

fn bench_forest_fit(c: &mut Criterion) {
    let (features, labels) = synthetic_rows(38);
    let config = ForestConfig {
        n_estimators: 25,
        ..ForestConfig::default()
    };
    c.bench_function("forest_fit_25_trees", |b| {
        b.iter(|| {
            let forest = RandomForest::fit(black_box(&features), black_box(&labels), config).unwrap();
            black_box(forest.total_nodes());
        })
    });
}

fn bench_predict(c: &mut Criterion) {
    let service = world_cup_service();
    c.bench_function("predict_brazil_france", |b| {
        b.iter(|| {
            let response = service
                .predict(black_box("Brazil"), black_box("France"), black_box(true))
                .unwrap();
            black_box(response.prediction);
        })
    });
}

criterion_group!(benches, bench_preprocess, bench_forest_fit, bench_predict);
criterion_main!(benches);
