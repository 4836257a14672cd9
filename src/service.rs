use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::artifacts::{ArtifactError, ArtifactPaths, load_pair};
use crate::encoder::{EncodeError, TeamEncoder};
use crate::forest::{ClassProbabilities, Classifier};
use crate::preprocess::{FeatureVector, MatchResult};
use crate::teams::TeamRegistry;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PredictError {
    #[error("unknown team: {0}")]
    UnknownTeam(String),

    #[error("teams must be different")]
    SameTeam,

    #[error(transparent)]
    Encoding(#[from] EncodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Probability {
    pub draw: f64,
    pub home_win: f64,
    pub away_win: f64,
}

impl Probability {
    fn rounded(p: ClassProbabilities) -> Self {
        Self {
            draw: round2(p[MatchResult::Draw.index()]),
            home_win: round2(p[MatchResult::HomeWin.index()]),
            away_win: round2(p[MatchResult::AwayWin.index()]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchInfo {
    pub home: String,
    pub away: String,
    pub neutral: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub prediction: MatchResult,
    pub probability: Probability,
    pub match_info: MatchInfo,
}

fn round2(p: f64) -> f64 {
    (p * 100.0).round() / 100.0
}

/// Registry, encoder and model, loaded once and never mutated afterwards.
pub struct PredictionService {
    registry: TeamRegistry,
    encoder: TeamEncoder,
    model: Box<dyn Classifier>,
}

impl PredictionService {
    pub fn new(registry: TeamRegistry, encoder: TeamEncoder, model: Box<dyn Classifier>) -> Self {
        for team in registry.coverage_gaps(&encoder) {
            warn!(team, "registry team has no encoder code; requests for it will fail");
        }
        Self {
            registry,
            encoder,
            model,
        }
    }

    pub fn from_artifact_dir(registry: TeamRegistry, dir: &Path) -> Result<Self, ArtifactError> {
        let pair = load_pair(&ArtifactPaths::in_dir(dir))?;
        info!(
            dir = %dir.display(),
            teams = pair.encoder.len(),
            trees = pair.model.n_estimators(),
            generated_at = %pair.generated_at,
            "artifacts loaded"
        );
        Ok(Self::new(registry, pair.encoder, Box::new(pair.model)))
    }

    pub fn registry(&self) -> &TeamRegistry {
        &self.registry
    }

    /// Validated features for a fixture, in model column order.
    fn features(&self, home: &str, away: &str, neutral: bool) -> Result<FeatureVector, PredictError> {
        for team in [home, away] {
            if !self.registry.is_valid(team) {
                return Err(PredictError::UnknownTeam(team.to_string()));
            }
        }
        if home == away {
            return Err(PredictError::SameTeam);
        }
        let codes = self
            .encoder
            .encode(home)
            .and_then(|h| self.encoder.encode(away).map(|a| (h, a)));
        match codes {
            Ok((h, a)) => Ok(FeatureVector::new(h, a, neutral)),
            Err(err) => {
                warn!(home, away, error = %err, "registry and encoder disagree");
                Err(err.into())
            }
        }
    }

    /// Unrounded class probabilities `[draw, home_win, away_win]`.
    pub fn predict_raw(
        &self,
        home: &str,
        away: &str,
        neutral: bool,
    ) -> Result<ClassProbabilities, PredictError> {
        let features = self.features(home, away, neutral)?;
        Ok(self.model.predict_probability(&features))
    }

    pub fn predict(
        &self,
        home: &str,
        away: &str,
        neutral: bool,
    ) -> Result<PredictionResponse, PredictError> {
        let features = self.features(home, away, neutral)?;
        let probs = self.model.predict_probability(&features);
        Ok(PredictionResponse {
            prediction: self.model.predict(&features),
            probability: Probability::rounded(probs),
            match_info: MatchInfo {
                home: home.to_string(),
                away: away.to_string(),
                neutral,
            },
        })
    }
}

/// Holds the served context. Readers clone the `Arc` and drop the lock
/// before predicting; a reload swaps in a fully built replacement.
pub struct ServiceSlot {
    inner: RwLock<Arc<PredictionService>>,
}

impl ServiceSlot {
    pub fn new(service: PredictionService) -> Self {
        Self {
            inner: RwLock::new(Arc::new(service)),
        }
    }

    pub fn current(&self) -> Arc<PredictionService> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn swap(&self, service: PredictionService) {
        let fresh = Arc::new(service);
        match self.inner.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }

    /// Load a new pair from `dir`; on failure the current context stays.
    pub fn reload(&self, dir: &Path) -> Result<(), ArtifactError> {
        let registry = self.current().registry().clone();
        let service = PredictionService::from_artifact_dir(registry, dir)?;
        self.swap(service);
        info!(dir = %dir.display(), "prediction context reloaded");
        Ok(())
    }
}
