use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::info;

use crate::forest::{Classifier, ClassProbabilities, ForestConfig, ForestError, RandomForest};
use crate::metrics::{ClassificationReport, ProbMetrics, evaluate_probs};
use crate::preprocess::{FeatureVector, MatchExample, MatchResult};

pub const EVAL_FRACTION: f64 = 0.2;
pub const SPLIT_SEED: u64 = 42;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("need at least 2 examples to split, got {0}")]
    TooFewExamples(usize),

    #[error(transparent)]
    Forest(#[from] ForestError),
}

#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<MatchExample>,
    pub eval: Vec<MatchExample>,
}

/// Seeded shuffle of the example indices; the first `ceil(n * fraction)`
/// go to evaluation, the rest to training.
pub fn train_eval_split(examples: &[MatchExample], fraction: f64, seed: u64) -> Split {
    let n = examples.len();
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let n_eval = ((n as f64) * fraction).ceil() as usize;
    let n_eval = n_eval.min(n);
    let eval = order[..n_eval].iter().map(|i| examples[*i]).collect();
    let train = order[n_eval..].iter().map(|i| examples[*i]).collect();
    Split { train, eval }
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub report: ClassificationReport,
    pub probs: ProbMetrics,
}

pub fn evaluate(model: &dyn Classifier, examples: &[MatchExample]) -> Evaluation {
    let actual: Vec<MatchResult> = examples.iter().map(|e| e.result).collect();
    let probs: Vec<ClassProbabilities> = examples
        .iter()
        .map(|e| model.predict_probability(&e.features()))
        .collect();
    let predicted: Vec<MatchResult> = examples.iter().map(|e| model.predict(&e.features())).collect();

    Evaluation {
        report: ClassificationReport::compute(&actual, &predicted),
        probs: evaluate_probs(&probs, &actual),
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: RandomForest,
    pub train_rows: usize,
    pub eval_rows: usize,
    pub evaluation: Evaluation,
}

impl TrainingOutcome {
    pub fn accuracy(&self) -> f64 {
        self.evaluation.report.accuracy
    }
}

pub fn train(examples: &[MatchExample], config: ForestConfig) -> Result<TrainingOutcome, TrainingError> {
    if examples.len() < 2 {
        return Err(TrainingError::TooFewExamples(examples.len()));
    }

    let split = train_eval_split(examples, EVAL_FRACTION, SPLIT_SEED);
    let features: Vec<FeatureVector> = split.train.iter().map(MatchExample::features).collect();
    let labels: Vec<MatchResult> = split.train.iter().map(|e| e.result).collect();

    info!(
        train = split.train.len(),
        eval = split.eval.len(),
        trees = config.n_estimators,
        seed = config.seed,
        "fitting random forest"
    );
    let model = RandomForest::fit(&features, &labels, config)?;
    let evaluation = evaluate(&model, &split.eval);
    info!(
        accuracy = evaluation.report.accuracy,
        brier = evaluation.probs.brier,
        log_loss = evaluation.probs.log_loss,
        nodes = model.total_nodes(),
        "evaluation complete"
    );

    Ok(TrainingOutcome {
        model,
        train_rows: split.train.len(),
        eval_rows: split.eval.len(),
        evaluation,
    })
}
