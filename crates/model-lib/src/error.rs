//! Error taxonomy for preprocessing, training and prediction

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Top-level error type for the model library.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Malformed, out-of-range or missing input. Recoverable at the boundary.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// `transform` or `predict` reached an untrained preprocessor.
    #[error("preprocessor has not been fitted")]
    NotFitted,

    #[error("preprocessor is already fitted and cannot be refit")]
    AlreadyFitted,

    /// Preprocessor/estimator pairing, fingerprint or column-order mismatch.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("unsupported model type: {0}")]
    UnsupportedModelType(String),

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ModelError {
    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::Artifact(msg.into())
    }

    /// True for errors the caller can fix by correcting the input record.
    pub fn is_validation(&self) -> bool {
        matches!(self, ModelError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("invalid field '{field}': {issue}")]
pub struct ValidationError {
    pub field: String,
    pub issue: ValidationIssue,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, issue: ValidationIssue) -> Self {
        Self {
            field: field.into(),
            issue,
        }
    }
}

/// What was wrong with a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    Missing,
    Unexpected,
    ExpectedNumber,
    ExpectedText,
    NotFinite,
    Empty,
    OutOfRange { value: f64, min: Option<f64>, max: Option<f64> },
    NotAllowed { value: f64, allowed: Vec<f64> },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::Missing => write!(f, "required field is missing"),
            ValidationIssue::Unexpected => write!(f, "field is not part of the task schema"),
            ValidationIssue::ExpectedNumber => write!(f, "expected a number"),
            ValidationIssue::ExpectedText => write!(f, "expected a text value"),
            ValidationIssue::NotFinite => write!(f, "value must be finite"),
            ValidationIssue::Empty => write!(f, "value cannot be empty"),
            ValidationIssue::OutOfRange { value, min, max } => {
                let lo = min.map(|v| v.to_string()).unwrap_or_else(|| "-inf".to_string());
                let hi = max.map(|v| v.to_string()).unwrap_or_else(|| "inf".to_string());
                write!(f, "{} is outside the valid range [{}, {}]", value, lo, hi)
            }
            ValidationIssue::NotAllowed { value, allowed } => {
                write!(f, "{} is not one of {:?}", value, allowed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_message() {
        let err = ValidationError::new(
            "Porosity_Percentage",
            ValidationIssue::OutOfRange {
                value: 150.0,
                min: Some(0.0),
                max: Some(100.0),
            },
        );
        assert_eq!(
            err.to_string(),
            "invalid field 'Porosity_Percentage': 150 is outside the valid range [0, 100]"
        );
    }

    #[test]
    fn test_open_upper_bound_rendered_as_inf() {
        let issue = ValidationIssue::OutOfRange {
            value: -1.0,
            min: Some(0.0),
            max: None,
        };
        assert!(issue.to_string().ends_with("[0, inf]"));
    }

    #[test]
    fn test_is_validation() {
        let err: ModelError = ValidationError::new("PS", ValidationIssue::Missing).into();
        assert!(err.is_validation());
        assert!(!ModelError::NotFitted.is_validation());
    }

    #[test]
    fn test_issue_serializes_with_kind_tag() {
        let json = serde_json::to_value(ValidationIssue::Empty).unwrap();
        assert_eq!(json["kind"], "empty");
    }
}
