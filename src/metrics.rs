use std::fmt::Write as _;

use serde::Serialize;

use crate::forest::{ClassProbabilities, argmax};
use crate::preprocess::MatchResult;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProbMetrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    /// Indexed by class code: draw, home_win, away_win.
    pub per_class: [ClassScores; 3],
    pub accuracy: f64,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
    /// `confusion[actual][predicted]`.
    pub confusion: [[usize; 3]; 3],
}

pub fn accuracy(actual: &[MatchResult], predicted: &[MatchResult]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return 0.0;
    }
    let correct = actual.iter().zip(predicted).filter(|(a, p)| a == p).count();
    correct as f64 / actual.len() as f64
}

pub fn confusion_matrix(actual: &[MatchResult], predicted: &[MatchResult]) -> [[usize; 3]; 3] {
    let mut out = [[0usize; 3]; 3];
    for (a, p) in actual.iter().zip(predicted) {
        out[a.index()][p.index()] += 1;
    }
    out
}

impl ClassificationReport {
    /// Undefined ratios (no predictions or no support for a class) count as 0.
    pub fn compute(actual: &[MatchResult], predicted: &[MatchResult]) -> Self {
        let confusion = if actual.len() == predicted.len() {
            confusion_matrix(actual, predicted)
        } else {
            [[0usize; 3]; 3]
        };

        let mut per_class = [ClassScores::default(); 3];
        for class in MatchResult::ALL {
            let c = class.index();
            let tp = confusion[c][c];
            let predicted_c: usize = (0..3).map(|a| confusion[a][c]).sum();
            let support: usize = confusion[c].iter().sum();
            let precision = ratio(tp, predicted_c);
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            per_class[c] = ClassScores {
                precision,
                recall,
                f1,
                support,
            };
        }

        let total: usize = per_class.iter().map(|s| s.support).sum();
        let macro_avg = ClassScores {
            precision: per_class.iter().map(|s| s.precision).sum::<f64>() / 3.0,
            recall: per_class.iter().map(|s| s.recall).sum::<f64>() / 3.0,
            f1: per_class.iter().map(|s| s.f1).sum::<f64>() / 3.0,
            support: total,
        };
        let weighted = |pick: fn(&ClassScores) -> f64| {
            if total == 0 {
                return 0.0;
            }
            per_class
                .iter()
                .map(|s| pick(s) * s.support as f64)
                .sum::<f64>()
                / total as f64
        };
        let weighted_avg = ClassScores {
            precision: weighted(|s| s.precision),
            recall: weighted(|s| s.recall),
            f1: weighted(|s| s.f1),
            support: total,
        };

        Self {
            per_class,
            accuracy: accuracy(actual, predicted),
            macro_avg,
            weighted_avg,
            confusion,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        );
        for class in MatchResult::ALL {
            let s = &self.per_class[class.index()];
            let _ = writeln!(
                out,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                format!("{} ({})", class.label(), class.code()),
                s.precision,
                s.recall,
                s.f1,
                s.support
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        );
        for (name, s) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            let _ = writeln!(
                out,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, s.precision, s.recall, s.f1, s.support
            );
        }
        out
    }
}

pub fn evaluate_probs(predictions: &[ClassProbabilities], outcomes: &[MatchResult]) -> ProbMetrics {
    if predictions.is_empty() || outcomes.is_empty() || predictions.len() != outcomes.len() {
        return ProbMetrics::default();
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, outcome) in predictions.iter().zip(outcomes) {
        let y = one_hot(*outcome);
        brier_sum += p.iter().zip(y).map(|(pi, yi)| (pi - yi).powi(2)).sum::<f64>();

        let actual_prob = p[outcome.index()].clamp(1e-12, 1.0);
        log_loss_sum += -actual_prob.ln();

        if argmax(*p) == *outcome {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    ProbMetrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

fn one_hot(outcome: MatchResult) -> ClassProbabilities {
    let mut out = [0.0; 3];
    out[outcome.index()] = 1.0;
    out
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::MatchResult::{AwayWin, Draw, HomeWin};

    #[test]
    fn perfect_predictions_have_zero_brier() {
        let preds = vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let outcomes = vec![HomeWin, Draw, AwayWin];
        let m = evaluate_probs(&preds, &outcomes);
        assert_eq!(m.samples, 3);
        assert!(m.brier < 1e-12);
        assert!((m.accuracy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mismatched_lengths_yield_empty_metrics() {
        let m = evaluate_probs(&[[0.2, 0.5, 0.3]], &[]);
        assert_eq!(m.samples, 0);
        assert_eq!(accuracy(&[HomeWin], &[]), 0.0);

        let report = ClassificationReport::compute(&[HomeWin, Draw], &[HomeWin]);
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.macro_avg.support, 0);
    }

    #[test]
    fn report_matches_hand_computed_scores() {
        let actual = vec![HomeWin, HomeWin, HomeWin, AwayWin, AwayWin, Draw];
        let predicted = vec![HomeWin, HomeWin, AwayWin, AwayWin, HomeWin, HomeWin];
        let report = ClassificationReport::compute(&actual, &predicted);

        let home = report.per_class[HomeWin.index()];
        assert!((home.precision - 0.5).abs() < 1e-12); // 2 of 4 home predictions
        assert!((home.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(home.support, 3);

        let away = report.per_class[AwayWin.index()];
        assert!((away.precision - 1.0).abs() < 1e-12);
        assert!((away.recall - 0.5).abs() < 1e-12);

        let draw = report.per_class[Draw.index()];
        assert_eq!(draw.precision, 0.0);
        assert_eq!(draw.f1, 0.0);

        assert!((report.accuracy - 0.5).abs() < 1e-12);
        assert_eq!(report.accuracy, accuracy(&actual, &predicted));
        assert_eq!(report.confusion[HomeWin.index()][AwayWin.index()], 1);
        assert!(report.render().contains("weighted avg"));
    }
}
