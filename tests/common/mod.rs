#![allow(dead_code)]

use std::path::PathBuf;

use wc26_predictor::encoder::TeamEncoder;
use wc26_predictor::forest::{ForestConfig, RandomForest};
use wc26_predictor::preprocess::{FeatureVector, MatchResult};
use wc26_predictor::service::PredictionService;
use wc26_predictor::teams::{TeamRegistry, WORLD_CUP_TEAMS};

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn world_cup_encoder() -> TeamEncoder {
    TeamEncoder::fit(WORLD_CUP_TEAMS)
}

/// Small forest over every registry team: lower codes tend to win at home,
/// neutral fixtures between neighbours draw.
pub fn world_cup_forest(encoder: &TeamEncoder) -> RandomForest {
    let n = encoder.len() as u32;
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for home in 0..n {
        for away in 0..n {
            if home == away {
                continue;
            }
            let neutral = (home + away) % 3 == 0;
            let label = if neutral && home.abs_diff(away) <= 2 {
                MatchResult::Draw
            } else if home < away {
                MatchResult::HomeWin
            } else {
                MatchResult::AwayWin
            };
            features.push(FeatureVector::new(home, away, neutral));
            labels.push(label);
        }
    }
    let config = ForestConfig {
        n_estimators: 12,
        ..ForestConfig::default()
    };
    RandomForest::fit(&features, &labels, config).expect("fit synthetic forest")
}

pub fn world_cup_service() -> PredictionService {
    let encoder = world_cup_encoder();
    let forest = world_cup_forest(&encoder);
    PredictionService::new(
        TeamRegistry::world_cup().clone(),
        encoder,
        Box::new(forest),
    )
}
