//! Holdout evaluation reports
//!
//! Computed once after training and stored in the artifact. Nothing here
//! gates a deployment; the numbers are for operators.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub n_samples: usize,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub per_class: Vec<ClassMetrics>,
    /// `confusion[actual][predicted]`
    pub confusion: Vec<Vec<usize>>,
}

impl ClassificationReport {
    pub fn compute(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Self {
        let mut confusion = vec![vec![0usize; n_classes]; n_classes];
        for (&actual, &predicted) in y_true.iter().zip(y_pred) {
            if actual < n_classes && predicted < n_classes {
                confusion[actual][predicted] += 1;
            }
        }

        let n_samples = y_true.len().min(y_pred.len());
        let correct: usize = (0..n_classes).map(|c| confusion[c][c]).sum();
        let accuracy = ratio(correct, n_samples);

        let per_class: Vec<ClassMetrics> = (0..n_classes)
            .map(|c| {
                let tp = confusion[c][c];
                let predicted: usize = (0..n_classes).map(|a| confusion[a][c]).sum();
                let support: usize = confusion[c].iter().sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let macro_f1 = if per_class.is_empty() {
            0.0
        } else {
            per_class.iter().map(|m| m.f1).sum::<f64>() / per_class.len() as f64
        };

        Self {
            n_samples,
            accuracy,
            macro_f1,
            per_class,
            confusion,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetMetrics {
    pub target: String,
    pub mse: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionReport {
    pub n_samples: usize,
    pub targets: Vec<TargetMetrics>,
}

impl RegressionReport {
    /// `y_true[row][target]` and `y_pred[row][target]`.
    pub fn compute(target_names: &[&str], y_true: &[Vec<f64>], y_pred: &[Vec<f64>]) -> Self {
        let targets = target_names
            .iter()
            .enumerate()
            .map(|(t, name)| {
                let actual: Vec<f64> = y_true.iter().map(|row| row[t]).collect();
                let predicted: Vec<f64> = y_pred.iter().map(|row| row[t]).collect();
                TargetMetrics {
                    target: name.to_string(),
                    mse: mean_squared_error(&actual, &predicted),
                    r2: r2_score(&actual, &predicted),
                }
            })
            .collect();

        Self {
            n_samples: y_true.len(),
            targets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationReport {
    Classification(ClassificationReport),
    Regression(RegressionReport),
}

impl EvaluationReport {
    /// One-line summary for logs.
    pub fn headline(&self) -> String {
        match self {
            EvaluationReport::Classification(r) => format!(
                "accuracy={:.3} macro_f1={:.3} n={}",
                r.accuracy, r.macro_f1, r.n_samples
            ),
            EvaluationReport::Regression(r) => r
                .targets
                .iter()
                .map(|t| format!("{}: mse={:.3} r2={:.3}", t.target, t.mse, t.r2))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

/// Coefficient of determination. A constant `y_true` scores 1.0 when
/// predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(a, p)| (a - p).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
