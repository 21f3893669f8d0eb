//! Offline training driver
//!
//! dataset -> seeded split -> fit preprocessor on the train split ->
//! fit estimator -> evaluate on the holdout -> composite artifact.

use crate::artifact::{ModelArtifact, SplitSummary};
use crate::dataset::{train_test_split, Dataset};
use crate::error::{ModelError, Result};
use crate::estimator::{
    Estimator, FittedEstimator, ForestParams, ModelType, MultiOutputRegressor,
    RandomForestClassifier,
};
use crate::evaluation::{ClassificationReport, EvaluationReport, RegressionReport};
use crate::models::EncodedVector;
use crate::preprocess::Preprocessor;
use crate::schema::{TargetKind, TaskSchema};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Model family name, parsed at fit time
    pub model_type: String,
    pub forest: ForestParams,
    /// Share of rows held out for evaluation
    pub test_fraction: f64,
    pub split_seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_type: ModelType::RandomForest.to_string(),
            forest: ForestParams::default(),
            test_fraction: 0.2,
            split_seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub evaluation: EvaluationReport,
}

/// Train one task end to end.
pub fn train(
    dataset: &Dataset,
    schema: &TaskSchema,
    config: &TrainingConfig,
) -> Result<TrainingOutcome> {
    let model_type: ModelType = config.model_type.parse()?;
    let (train_idx, test_idx) =
        train_test_split(dataset.len(), config.test_fraction, config.split_seed)?;
    let (train_records, train_targets) = dataset.subset(&train_idx);
    let (test_records, test_targets) = dataset.subset(&test_idx);

    let mut preprocessor = Preprocessor::new(schema);
    preprocessor.fit(&train_records)?;
    let x_train = to_matrix(preprocessor.transform(&train_records)?);
    let x_test = preprocessor.transform(&test_records)?;

    let (estimator, evaluation) = if is_classification(schema)? {
        let y_train = to_labels(&train_targets);
        let y_test = to_labels(&test_targets);
        let forest = RandomForestClassifier::fit(&x_train, &y_train, 2, config.forest)?;
        let estimator = FittedEstimator::Classifier(forest);
        let y_pred = predict_all(&estimator, &x_test)?
            .into_iter()
            .map(|row| row[0] as usize)
            .collect::<Vec<_>>();
        let report = ClassificationReport::compute(&y_test, &y_pred, 2);
        (estimator, EvaluationReport::Classification(report))
    } else {
        let forest = MultiOutputRegressor::fit(&x_train, &train_targets, config.forest)?;
        let estimator = FittedEstimator::Regressor(forest);
        let y_pred = predict_all(&estimator, &x_test)?;
        let report = RegressionReport::compute(&schema.target_names(), &test_targets, &y_pred);
        (estimator, EvaluationReport::Regression(report))
    };

    info!(
        task = %schema.task,
        model_type = %model_type,
        train_rows = train_idx.len(),
        test_rows = test_idx.len(),
        evaluation = %evaluation.headline(),
        "Trained model"
    );

    let split = SplitSummary {
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
        dropped_rows: dataset.dropped_rows(),
        test_fraction: config.test_fraction,
        seed: config.split_seed,
    };
    let artifact = ModelArtifact::new(
        schema,
        model_type,
        config.forest,
        split,
        evaluation.clone(),
        preprocessor,
        estimator,
    );

    Ok(TrainingOutcome {
        artifact,
        evaluation,
    })
}

fn is_classification(schema: &TaskSchema) -> Result<bool> {
    let labels = schema
        .targets
        .iter()
        .filter(|t| t.kind == TargetKind::BinaryLabel)
        .count();
    match labels {
        0 => Ok(false),
        1 if schema.targets.len() == 1 => Ok(true),
        _ => Err(ModelError::schema_mismatch(format!(
            "task '{}' mixes label and continuous targets",
            schema.task
        ))),
    }
}

fn to_matrix(vectors: Vec<EncodedVector>) -> Vec<Vec<f64>> {
    vectors.into_iter().map(EncodedVector::into_inner).collect()
}

fn to_labels(targets: &[Vec<f64>]) -> Vec<usize> {
    targets.iter().map(|row| row[0] as usize).collect()
}

fn predict_all(estimator: &FittedEstimator, x: &[EncodedVector]) -> Result<Vec<Vec<f64>>> {
    x.iter().map(|v| estimator.predict(v)).collect()
}
