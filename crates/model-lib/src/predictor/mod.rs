//! Prediction engine
//!
//! A [`Predictor`] pairs a fitted preprocessor and estimator with the task
//! schema they were trained for. The pairing is checked once at
//! construction; afterwards the predictor is immutable and shared via `Arc`.
//!
//! Per-record pipeline: validate, apply rule overrides, encode, estimate,
//! format.

mod handle;
mod output;

pub use handle::{PredictorHandle, Reloaded};
pub use output::{OutputConfig, OutputFormatter, DEFAULT_DECIMAL_PLACES};

use crate::artifact::ModelArtifact;
use crate::error::{ModelError, Result};
use crate::estimator::{Estimator, FittedEstimator};
use crate::models::{Decision, Prediction, RawRecord};
use crate::preprocess::Preprocessor;
use crate::rules::RulePolicy;
use crate::schema::{TargetKind, TaskSchema};
use crate::validation::Validator;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Identity of the model behind a predictor, reported by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub schema_fingerprint: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct Predictor {
    schema: TaskSchema,
    preprocessor: Preprocessor,
    estimator: Arc<dyn Estimator>,
    rules: RulePolicy,
    formatter: OutputFormatter,
    info: Option<ModelInfo>,
}

impl Predictor {
    pub fn new(
        schema: TaskSchema,
        preprocessor: Preprocessor,
        estimator: Arc<dyn Estimator>,
    ) -> Result<Self> {
        check_pairing(&schema, &preprocessor, estimator.as_ref())?;
        let rules = RulePolicy::for_task(schema.task);
        Ok(Self {
            schema,
            preprocessor,
            estimator,
            rules,
            formatter: OutputFormatter::new(),
            info: None,
        })
    }

    /// Build from an artifact after checking its version, fingerprint and
    /// pairing.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        let schema = TaskSchema::for_task(artifact.task);
        let info = ModelInfo {
            model_type: artifact.model_type.to_string(),
            schema_fingerprint: artifact.schema_fingerprint.clone(),
            created_at: artifact.created_at.to_rfc3339(),
        };
        artifact.verify()?;
        let estimator: Arc<dyn Estimator> = Arc::new(artifact.estimator);
        let mut predictor = Self::new(schema, artifact.preprocessor, estimator)?;
        predictor.info = Some(info);
        Ok(predictor)
    }

    pub fn with_rules(mut self, rules: RulePolicy) -> Self {
        self.rules = rules;
        self
    }

    pub fn schema(&self) -> &TaskSchema {
        &self.schema
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn rules(&self) -> &RulePolicy {
        &self.rules
    }

    pub fn info(&self) -> Option<&ModelInfo> {
        self.info.as_ref()
    }

    /// Predict a single raw record.
    ///
    /// Validation failures surface as `ModelError::Validation`. When a rule
    /// override fires the estimator is never invoked.
    pub fn predict(&self, raw: &RawRecord) -> Result<Prediction> {
        let validated = Validator::new(&self.schema).validate(raw)?;

        if let Some(rule) = self.rules.evaluate(&validated) {
            debug!(task = %self.schema.task, rule = rule.name, "Rule override matched");
            return Ok(Prediction {
                task: self.schema.task,
                outputs: rule.outcome.to_record(),
                decision: Decision::RuleOverride {
                    rule: rule.name.to_string(),
                },
            });
        }

        let encoded = self.preprocessor.transform_one(&validated)?;
        let raw_outputs = self.estimator.predict(&encoded)?;
        let outputs = self.formatter.format(&self.schema.targets, &raw_outputs)?;

        Ok(Prediction {
            task: self.schema.task,
            outputs,
            decision: Decision::Model,
        })
    }
}

/// Verify that a preprocessor and estimator can serve `schema` together.
pub fn check_pairing(
    schema: &TaskSchema,
    preprocessor: &Preprocessor,
    estimator: &dyn Estimator,
) -> Result<()> {
    preprocessor.check_schema(schema)?;

    let width = preprocessor.output_width()?;
    if estimator.n_features() != width {
        return Err(ModelError::schema_mismatch(format!(
            "estimator expects {} features but preprocessor produces {}",
            estimator.n_features(),
            width
        )));
    }
    if estimator.n_outputs() != schema.targets.len() {
        return Err(ModelError::schema_mismatch(format!(
            "estimator has {} outputs but task '{}' declares {} targets",
            estimator.n_outputs(),
            schema.task,
            schema.targets.len()
        )));
    }
    Ok(())
}

/// Labels need a classifier, continuous targets a regressor.
pub fn check_estimator_kind(schema: &TaskSchema, estimator: &FittedEstimator) -> Result<()> {
    let wants_classifier = schema
        .targets
        .iter()
        .all(|t| t.kind == TargetKind::BinaryLabel);
    match (wants_classifier, estimator) {
        (true, FittedEstimator::Classifier(_)) | (false, FittedEstimator::Regressor(_)) => Ok(()),
        _ => Err(ModelError::schema_mismatch(format!(
            "estimator kind does not match targets of task '{}'",
            schema.task
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{ForestParams, MultiOutputRegressor};
    use crate::models::{EncodedVector, FeatureValue, OutputValue};
    use crate::schema::Task;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and returns a fixed output.
    #[derive(Debug)]
    struct SpyEstimator {
        n_features: usize,
        output: Vec<f64>,
        calls: AtomicUsize,
    }

    impl Estimator for SpyEstimator {
        fn predict(&self, _x: &EncodedVector) -> Result<Vec<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }

        fn n_features(&self) -> usize {
            self.n_features
        }

        fn n_outputs(&self) -> usize {
            self.output.len()
        }
    }

    fn printability_record(tg_min: f64) -> RawRecord {
        RawRecord::new()
            .with("Gelatin_pct", 15.0)
            .with("Silk_pct", 4.5)
            .with("LH", 0.68)
            .with("PP", 55.0)
            .with("PS", 10.0)
            .with("T", 23.5)
            .with("TG_min", tg_min)
            .with("Used_crosslinker", 1.0)
            .with("Needle", "22G")
    }

    fn fitted_printability_preprocessor() -> Preprocessor {
        let schema = TaskSchema::for_task(Task::Printability);
        let batch: Vec<RawRecord> = (0..10)
            .map(|i| printability_record(1.0 + i as f64 * 0.5).with("Needle", ["22G", "25G"][i % 2]))
            .collect();
        let mut pre = Preprocessor::new(&schema);
        pre.fit(&batch).unwrap();
        pre
    }

    fn spy_predictor(output: f64) -> (Predictor, Arc<SpyEstimator>) {
        let pre = fitted_printability_preprocessor();
        let spy = Arc::new(SpyEstimator {
            n_features: pre.output_width().unwrap(),
            output: vec![output],
            calls: AtomicUsize::new(0),
        });
        let predictor = Predictor::new(
            TaskSchema::for_task(Task::Printability),
            pre,
            spy.clone(),
        )
        .unwrap();
        (predictor, spy)
    }

    #[test]
    fn test_zero_gelation_time_short_circuits_model() {
        let (predictor, spy) = spy_predictor(1.0);
        let prediction = predictor.predict(&printability_record(0.0)).unwrap();

        assert_eq!(prediction.outputs.get("Printable"), Some(OutputValue::Label(0)));
        assert_eq!(
            prediction.decision,
            Decision::RuleOverride {
                rule: "no_gelation_time".to_string()
            }
        );
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_model_path_invokes_estimator() {
        let (predictor, spy) = spy_predictor(1.0);
        let prediction = predictor.predict(&printability_record(6.0)).unwrap();
        assert_eq!(prediction.outputs.get("Printable"), Some(OutputValue::Label(1)));
        assert_eq!(prediction.decision, Decision::Model);
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_validation_runs_before_rules() {
        let (predictor, spy) = spy_predictor(1.0);
        let record = printability_record(0.0).with("PS", 99.0);
        let err = predictor.predict(&record).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_tg_min_goes_to_model() {
        let (predictor, spy) = spy_predictor(0.0);
        let record = printability_record(6.0).with("TG_min", FeatureValue::Missing);
        let prediction = predictor.predict(&record).unwrap();
        assert_eq!(prediction.decision, Decision::Model);
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_annotation_ignored() {
        let (predictor, _) = spy_predictor(1.0);
        let with_remark = printability_record(6.0).with("Remarks", "smooth filament");
        assert_eq!(
            predictor.predict(&with_remark).unwrap(),
            predictor.predict(&printability_record(6.0)).unwrap()
        );
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let pre = fitted_printability_preprocessor();
        let spy = Arc::new(SpyEstimator {
            n_features: 3,
            output: vec![1.0],
            calls: AtomicUsize::new(0),
        });
        assert!(matches!(
            Predictor::new(TaskSchema::for_task(Task::Printability), pre, spy),
            Err(ModelError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_unfitted_preprocessor_rejected() {
        let schema = TaskSchema::for_task(Task::Printability);
        let pre = Preprocessor::new(&schema);
        let spy = Arc::new(SpyEstimator {
            n_features: 14,
            output: vec![1.0],
            calls: AtomicUsize::new(0),
        });
        assert!(matches!(
            Predictor::new(schema, pre, spy),
            Err(ModelError::NotFitted)
        ));
    }

    #[test]
    fn test_preprocessor_for_other_task_rejected() {
        let pre = fitted_printability_preprocessor();
        let spy = Arc::new(SpyEstimator {
            n_features: pre.output_width().unwrap(),
            output: vec![1.0, 2.0, 3.0],
            calls: AtomicUsize::new(0),
        });
        assert!(matches!(
            Predictor::new(TaskSchema::for_task(Task::Degradation), pre, spy),
            Err(ModelError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_estimator_kind_check() {
        let x = vec![vec![0.0], vec![1.0]];
        let y = vec![vec![1.0, 2.0, 3.0], vec![2.0, 3.0, 4.0]];
        let regressor = FittedEstimator::Regressor(
            MultiOutputRegressor::fit(
                &x,
                &y,
                ForestParams {
                    n_estimators: 2,
                    ..ForestParams::default()
                },
            )
            .unwrap(),
        );
        assert!(check_estimator_kind(&TaskSchema::for_task(Task::Degradation), &regressor).is_ok());
        assert!(
            check_estimator_kind(&TaskSchema::for_task(Task::Printability), &regressor).is_err()
        );
    }

    #[test]
    fn test_predictor_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Predictor>();
    }
}
