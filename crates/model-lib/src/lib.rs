//! Model library for bioprinting outcome prediction
//!
//! This crate provides the core functionality for:
//! - Per-task schemas, input validation and rule overrides
//! - Preprocessing (imputation, scaling, one-hot encoding)
//! - Random forest training, evaluation and composite artifacts
//! - Hot-swappable serving predictors
//! - Health checks and observability

pub mod artifact;
pub mod dataset;
pub mod error;
pub mod estimator;
pub mod evaluation;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod preprocess;
pub mod rules;
pub mod schema;
pub mod training;
pub mod validation;

pub use artifact::{LoadedArtifact, ModelArtifact, SplitSummary};
pub use dataset::Dataset;
pub use error::{ModelError, Result, ValidationError, ValidationIssue};
pub use estimator::{Estimator, FittedEstimator, ForestParams, ModelType};
pub use evaluation::EvaluationReport;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{PredictorMetrics, StructuredLogger};
pub use predictor::{ModelInfo, Predictor, PredictorHandle, Reloaded};
pub use preprocess::Preprocessor;
pub use rules::RulePolicy;
pub use schema::{Task, TaskSchema};
pub use training::{train, TrainingConfig, TrainingOutcome};
pub use validation::Validator;
