//! Estimators behind the prediction contract
//!
//! The predictor only sees the [`Estimator`] trait: one encoded vector in,
//! one raw output per target out. The concrete models are random forests,
//! a classifier for labels and a multi-output regressor for continuous
//! targets.

mod forest;
mod tree;

pub use forest::{ForestParams, MultiOutputRegressor, RandomForestClassifier, RandomForestRegressor};
pub use tree::{DecisionTree, TreeNode, TreeParams};

use crate::error::{ModelError, Result};
use crate::models::EncodedVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fitted model consuming encoded vectors.
pub trait Estimator: Send + Sync + fmt::Debug {
    /// Raw outputs in target order: a class index for labels, the
    /// unrounded value for continuous targets.
    fn predict(&self, x: &EncodedVector) -> Result<Vec<f64>>;

    /// Expected input width.
    fn n_features(&self) -> usize;

    fn n_outputs(&self) -> usize;
}

/// Model families the training driver can fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    RandomForest,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "random_forest",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "random_forest" | "randomforest" => Ok(ModelType::RandomForest),
            _ => Err(ModelError::UnsupportedModelType(s.to_string())),
        }
    }
}

/// Serializable fitted model stored inside an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedEstimator {
    Classifier(RandomForestClassifier),
    Regressor(MultiOutputRegressor),
}

impl FittedEstimator {
    pub fn model_type(&self) -> ModelType {
        ModelType::RandomForest
    }
}

impl Estimator for FittedEstimator {
    fn predict(&self, x: &EncodedVector) -> Result<Vec<f64>> {
        if x.len() != self.n_features() {
            return Err(ModelError::schema_mismatch(format!(
                "estimator expects {} features, got {}",
                self.n_features(),
                x.len()
            )));
        }
        Ok(match self {
            FittedEstimator::Classifier(model) => vec![model.predict(x.as_slice()) as f64],
            FittedEstimator::Regressor(model) => model.predict(x.as_slice()),
        })
    }

    fn n_features(&self) -> usize {
        match self {
            FittedEstimator::Classifier(model) => model.n_features(),
            FittedEstimator::Regressor(model) => model.n_features(),
        }
    }

    fn n_outputs(&self) -> usize {
        match self {
            FittedEstimator::Classifier(_) => 1,
            FittedEstimator::Regressor(model) => model.n_outputs(),
        }
    }
}
