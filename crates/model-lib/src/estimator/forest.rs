//! Bootstrap-aggregated forests
//!
//! Each tree is grown on a bootstrap sample drawn with its own seeded RNG
//! (`random_state + tree index`), so a fit is fully reproducible.

use super::tree::{DecisionTree, Targets, TreeParams};
use crate::error::{ModelError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Forest hyperparameters recorded in the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub random_state: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            random_state: 42,
        }
    }
}

impl ForestParams {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ModelError::dataset("n_estimators must be at least 1"));
        }
        Ok(())
    }
}

fn bootstrap_sample(n_samples: usize, rng: &mut StdRng) -> Vec<usize> {
    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn check_training_matrix(x: &[Vec<f64>], n_targets: usize) -> Result<usize> {
    let n_features = x
        .first()
        .map(Vec::len)
        .ok_or_else(|| ModelError::dataset("cannot fit a forest on zero rows"))?;
    if x.iter().any(|row| row.len() != n_features) {
        return Err(ModelError::schema_mismatch("training rows have unequal widths"));
    }
    if n_targets != x.len() {
        return Err(ModelError::dataset(format!(
            "{} feature rows but {} targets",
            x.len(),
            n_targets
        )));
    }
    Ok(n_features)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: ForestParams,
    n_classes: usize,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForestClassifier {
    /// Fit on class indices in `0..n_classes`. Each split considers
    /// `sqrt(n_features)` randomly drawn features.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        params: ForestParams,
    ) -> Result<Self> {
        params.validate()?;
        let n_features = check_training_matrix(x, y.len())?;
        if let Some(bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(ModelError::dataset(format!(
                "class {} outside 0..{}",
                bad, n_classes
            )));
        }

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            max_features: Some(((n_features as f64).sqrt() as usize).max(1)),
            ..TreeParams::default()
        };
        let targets = Targets::Classes { y, n_classes };

        let trees = (0..params.n_estimators)
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(params.random_state.wrapping_add(i as u64));
                let rows = bootstrap_sample(x.len(), &mut rng);
                DecisionTree::fit(x, targets, &rows, &tree_params, &mut rng)
            })
            .collect::<Vec<_>>();

        debug!(
            trees = trees.len(),
            n_features,
            n_classes,
            max_tree_depth = trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
            "Fitted random forest classifier"
        );

        Ok(Self {
            params,
            n_classes,
            n_features,
            trees,
        })
    }

    /// Mean of the trees' leaf class distributions.
    pub fn predict_proba(&self, sample: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (p, v) in proba.iter_mut().zip(tree.leaf(sample)) {
                *p += v;
            }
        }
        let n = self.trees.len().max(1) as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    /// Most probable class; ties go to the lowest class index.
    pub fn predict(&self, sample: &[f64]) -> usize {
        argmax(&self.predict_proba(sample))
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForestRegressor {
    /// Fit a single-output forest. Every split considers all features.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: ForestParams) -> Result<Self> {
        params.validate()?;
        let n_features = check_training_matrix(x, y.len())?;
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            ..TreeParams::default()
        };
        let targets = Targets::Values(y);

        let trees = (0..params.n_estimators)
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(params.random_state.wrapping_add(i as u64));
                let rows = bootstrap_sample(x.len(), &mut rng);
                DecisionTree::fit(x, targets, &rows, &tree_params, &mut rng)
            })
            .collect();

        Ok(Self {
            params,
            n_features,
            trees,
        })
    }

    pub fn predict(&self, sample: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.leaf(sample)[0]).sum();
        total / self.trees.len().max(1) as f64
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }
}

/// One independent forest per target, all sharing the same seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiOutputRegressor {
    forests: Vec<RandomForestRegressor>,
}

impl MultiOutputRegressor {
    /// `y[row][target]`
    pub fn fit(x: &[Vec<f64>], y: &[Vec<f64>], params: ForestParams) -> Result<Self> {
        let n_targets = y
            .first()
            .map(Vec::len)
            .ok_or_else(|| ModelError::dataset("cannot fit a forest on zero rows"))?;
        if n_targets == 0 || y.iter().any(|row| row.len() != n_targets) {
            return Err(ModelError::dataset("target rows must share a non-zero width"));
        }

        let forests = (0..n_targets)
            .map(|t| {
                let column: Vec<f64> = y.iter().map(|row| row[t]).collect();
                RandomForestRegressor::fit(x, &column, params)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(targets = n_targets, "Fitted multi-output random forest regressor");
        Ok(Self { forests })
    }

    pub fn predict(&self, sample: &[f64]) -> Vec<f64> {
        self.forests.iter().map(|f| f.predict(sample)).collect()
    }

    pub fn n_outputs(&self) -> usize {
        self.forests.len()
    }

    pub fn n_features(&self) -> usize {
        self.forests.first().map(|f| f.n_features()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> ForestParams {
        ForestParams {
            n_estimators: 15,
            ..ForestParams::default()
        }
    }

    /// Two well separated clusters on feature 0, noise on feature 1.
    fn clusters() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            x.push(vec![i as f64 * 0.1, (i % 3) as f64]);
            y.push(0);
            x.push(vec![10.0 + i as f64 * 0.1, (i % 3) as f64]);
            y.push(1);
        }
        (x, y)
    }

    #[test]
    fn test_classifier_learns_clusters() {
        let (x, y) = clusters();
        let forest = RandomForestClassifier::fit(&x, &y, 2, small()).unwrap();
        assert_eq!(forest.predict(&[0.5, 1.0]), 0);
        assert_eq!(forest.predict(&[11.0, 1.0]), 1);
        let proba = forest.predict_proba(&[11.0, 1.0]);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_classifier_is_deterministic() {
        let (x, y) = clusters();
        let a = RandomForestClassifier::fit(&x, &y, 2, small()).unwrap();
        let b = RandomForestClassifier::fit(&x, &y, 2, small()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_vote_tie_goes_to_lowest_class() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.25, 0.5, 0.5]), 1);
        assert_eq!(argmax(&[0.4, 0.6]), 1);
    }

    #[test]
    fn test_classifier_rejects_bad_labels() {
        let (x, mut y) = clusters();
        y[0] = 2;
        assert!(RandomForestClassifier::fit(&x, &y, 2, small()).is_err());
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let (x, y) = clusters();
        let params = ForestParams {
            n_estimators: 0,
            ..ForestParams::default()
        };
        assert!(RandomForestClassifier::fit(&x, &y, 2, params).is_err());
    }

    #[test]
    fn test_multi_output_regressor() {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let y: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![2.0 * i as f64, 100.0 - i as f64, 7.0])
            .collect();
        let model = MultiOutputRegressor::fit(&x, &y, small()).unwrap();
        assert_eq!(model.n_outputs(), 3);
        assert_eq!(model.n_features(), 1);

        let out = model.predict(&[15.0]);
        assert!((out[0] - 30.0).abs() < 6.0);
        assert!((out[1] - 85.0).abs() < 6.0);
        assert_eq!(out[2], 7.0);
    }

    #[test]
    fn test_empty_training_set_rejected() {
        assert!(RandomForestRegressor::fit(&[], &[], small()).is_err());
        assert!(MultiOutputRegressor::fit(&[], &[], small()).is_err());
    }
}
