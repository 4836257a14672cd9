//! Random forest classifier over the three match features.
//!
//! Bagged CART trees grown to purity on bootstrap samples, Gini impurity,
//! `floor(sqrt(n_features))` candidate features per split. Prediction averages
//! the per-tree class frequencies, so the output is a proper distribution in
//! the fixed order `[draw, home_win, away_win]`.
//!
//! Tree `i` draws from an RNG seeded with `seed + i`, which keeps a fit
//! reproducible even though trees are grown in parallel.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::preprocess::{FeatureVector, MatchResult};

pub type ClassProbabilities = [f64; 3];

const N_FEATURES: usize = 3;
const N_CLASSES: usize = 3;

/// Black-box classifier seam used by the prediction service.
pub trait Classifier: Send + Sync {
    fn predict_probability(&self, features: &FeatureVector) -> ClassProbabilities;

    fn predict(&self, features: &FeatureVector) -> MatchResult {
        argmax(self.predict_probability(features))
    }
}

/// Highest-probability class; ties go to the lower class code.
pub fn argmax(probs: ClassProbabilities) -> MatchResult {
    let mut best = MatchResult::Draw;
    for class in MatchResult::ALL {
        if probs[class.index()] > probs[best.index()] {
            best = class;
        }
    }
    best
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ForestError {
    #[error("cannot fit a forest on zero examples")]
    NoExamples,

    #[error("{features} feature rows but {labels} labels")]
    LengthMismatch { features: usize, labels: usize },

    #[error("n_estimators must be at least 1")]
    NoEstimators,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_estimators: usize,
    /// `None` means `floor(sqrt(n_features))`.
    pub max_features: Option<usize>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_features: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

impl ForestConfig {
    fn resolved_max_features(&self) -> usize {
        self.max_features
            .unwrap_or_else(|| (N_FEATURES as f64).sqrt().floor() as usize)
            .clamp(1, N_FEATURES)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: ClassProbabilities,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Values `<= threshold` go left.
    pub fn predict_probability(&self, features: &FeatureVector) -> ClassProbabilities {
        let values = features.values();
        let mut idx = 0usize;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = values.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if v.is_nan() || v <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                // Unreachable for a validated tree; treat as uninformative.
                None => return [1.0 / 3.0; N_CLASSES],
            }
        }
    }

    /// Every child index must point forward inside the node list, which also
    /// rules out cycles.
    fn is_well_formed(&self) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        self.nodes.iter().enumerate().all(|(idx, node)| match node {
            TreeNode::Leaf { .. } => true,
            TreeNode::Split {
                feature,
                left,
                right,
                ..
            } => {
                *feature < N_FEATURES
                    && *left > idx
                    && *right > idx
                    && *left < self.nodes.len()
                    && *right < self.nodes.len()
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(
        features: &[FeatureVector],
        labels: &[MatchResult],
        config: ForestConfig,
    ) -> Result<Self, ForestError> {
        if features.len() != labels.len() {
            return Err(ForestError::LengthMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }
        if features.is_empty() {
            return Err(ForestError::NoExamples);
        }
        if config.n_estimators == 0 {
            return Err(ForestError::NoEstimators);
        }

        let x: Vec<[f64; N_FEATURES]> = features.iter().map(|f| *f.values()).collect();
        let y: Vec<usize> = labels.iter().map(|l| l.index()).collect();

        let trees = (0..config.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(tree_idx as u64));
                let n = x.len();
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                grow_tree(&x, &y, bootstrap, &config, &mut rng)
            })
            .collect::<Vec<_>>();

        Ok(Self { config, trees })
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn total_nodes(&self) -> usize {
        self.trees.iter().map(DecisionTree::node_count).sum()
    }

    /// Structural check for forests read back from disk.
    pub fn is_well_formed(&self) -> bool {
        !self.trees.is_empty() && self.trees.iter().all(DecisionTree::is_well_formed)
    }
}

impl Classifier for RandomForest {
    fn predict_probability(&self, features: &FeatureVector) -> ClassProbabilities {
        if self.trees.is_empty() {
            return [1.0 / 3.0; N_CLASSES];
        }
        let sum = self.trees.iter().fold([0.0; N_CLASSES], |mut acc, tree| {
            let probs = tree.predict_probability(features);
            for (a, p) in acc.iter_mut().zip(probs) {
                *a += p;
            }
            acc
        });
        let n = self.trees.len() as f64;
        [sum[0] / n, sum[1] / n, sum[2] / n]
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn grow_tree(
    x: &[[f64; N_FEATURES]],
    y: &[usize],
    root_samples: Vec<usize>,
    config: &ForestConfig,
    rng: &mut StdRng,
) -> DecisionTree {
    let max_features = config.resolved_max_features();
    let min_split = config.min_samples_split.max(2);
    let min_leaf = config.min_samples_leaf.max(1);

    let mut nodes = vec![TreeNode::Leaf {
        value: [0.0; N_CLASSES],
    }];
    let mut stack: Vec<(usize, Vec<usize>, usize)> = vec![(0, root_samples, 0)];

    while let Some((node_idx, samples, depth)) = stack.pop() {
        let counts = class_counts(y, &samples);
        let n = samples.len();
        let pure = counts.iter().any(|c| *c == n);
        let depth_capped = config.max_depth.is_some_and(|d| depth >= d);

        let split = if pure || depth_capped || n < min_split {
            None
        } else {
            best_split(x, y, &samples, &counts, max_features, min_leaf, rng)
        };

        let Some(split) = split else {
            nodes[node_idx] = TreeNode::Leaf {
                value: leaf_value(&counts, n),
            };
            continue;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|s| x[*s][split.feature] <= split.threshold);

        let left_idx = nodes.len();
        let right_idx = left_idx + 1;
        nodes.push(TreeNode::Leaf {
            value: [0.0; N_CLASSES],
        });
        nodes.push(TreeNode::Leaf {
            value: [0.0; N_CLASSES],
        });
        nodes[node_idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_idx,
            right: right_idx,
        };
        stack.push((right_idx, right, depth + 1));
        stack.push((left_idx, left, depth + 1));
    }

    DecisionTree { nodes }
}

fn best_split(
    x: &[[f64; N_FEATURES]],
    y: &[usize],
    samples: &[usize],
    counts: &[usize; N_CLASSES],
    max_features: usize,
    min_leaf: usize,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let mut order: Vec<usize> = (0..N_FEATURES).collect();
    order.shuffle(rng);

    let n = samples.len();
    let mut best: Option<SplitCandidate> = None;
    let mut visited = 0usize;
    let mut sorted = samples.to_vec();

    for feature in order {
        // Keep drawing past max_features until some feature yields a split.
        if visited >= max_features && best.is_some() {
            break;
        }
        sorted.sort_by(|a, b| x[*a][feature].total_cmp(&x[*b][feature]));
        let first = x[sorted[0]][feature];
        let last = x[sorted[n - 1]][feature];
        if first == last {
            continue;
        }
        visited += 1;

        let mut left = [0usize; N_CLASSES];
        for i in 0..n - 1 {
            left[y[sorted[i]]] += 1;
            let here = x[sorted[i]][feature];
            let next = x[sorted[i + 1]][feature];
            if here == next {
                continue;
            }
            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let mut right = [0usize; N_CLASSES];
            for c in 0..N_CLASSES {
                right[c] = counts[c] - left[c];
            }
            let impurity = (n_left as f64 * gini(&left, n_left)
                + n_right as f64 * gini(&right, n_right))
                / n as f64;
            if best.is_none_or(|b| impurity < b.impurity) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    impurity,
                });
            }
        }
    }

    best
}

fn class_counts(y: &[usize], samples: &[usize]) -> [usize; N_CLASSES] {
    let mut counts = [0usize; N_CLASSES];
    for s in samples {
        counts[y[*s]] += 1;
    }
    counts
}

fn gini(counts: &[usize; N_CLASSES], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|c| {
            let p = *c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

fn leaf_value(counts: &[usize; N_CLASSES], n: usize) -> ClassProbabilities {
    if n == 0 {
        return [1.0 / 3.0; N_CLASSES];
    }
    let n = n as f64;
    [
        counts[0] as f64 / n,
        counts[1] as f64 / n,
        counts[2] as f64 / n,
    ]
}
