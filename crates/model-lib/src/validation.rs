//! Input validation stage
//!
//! One pass over a raw record that applies each field's declared policy:
//! reject, clamp to the declared bounds, or route unseen categories to the
//! unknown bucket. Runs before the rule policy and the preprocessor.

use crate::error::{ValidationError, ValidationIssue};
use crate::models::{FeatureValue, RawRecord};
use crate::schema::{FeatureKind, FeatureSpec, FieldPolicy, TaskSchema, ValidRange};
use serde_json::{Map, Value};
use tracing::debug;

pub struct Validator<'a> {
    schema: &'a TaskSchema,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a TaskSchema) -> Self {
        Self { schema }
    }

    /// Convert a JSON object of feature values into a raw record.
    ///
    /// `null` is an explicit missing value. Booleans, arrays and objects are
    /// reported against the field they were sent for; on the annotation
    /// column they are dropped.
    pub fn record_from_json(&self, object: &Map<String, Value>) -> Result<RawRecord, ValidationError> {
        let mut record = RawRecord::new();
        for (key, value) in object {
            let value = match value {
                Value::Null => FeatureValue::Missing,
                Value::String(s) => FeatureValue::Text(s.clone()),
                Value::Number(n) => match n.as_f64() {
                    Some(v) => FeatureValue::Number(v),
                    None => return Err(ValidationError::new(key, ValidationIssue::NotFinite)),
                },
                _ if self.schema.is_annotation(key) => continue,
                _ => {
                    let issue = match self.schema.feature(key).map(|f| f.kind) {
                        Some(FeatureKind::Numeric) => ValidationIssue::ExpectedNumber,
                        Some(FeatureKind::Categorical) => ValidationIssue::ExpectedText,
                        None => ValidationIssue::Unexpected,
                    };
                    return Err(ValidationError::new(key, issue));
                }
            };
            record.insert(key.as_str(), value);
        }
        Ok(record)
    }

    /// Validate a record and return a cleaned copy with the annotation
    /// column removed and clamped values applied.
    pub fn validate(&self, record: &RawRecord) -> Result<RawRecord, ValidationError> {
        for key in record.keys() {
            if self.schema.feature(key).is_none() && !self.schema.is_annotation(key) {
                return Err(ValidationError::new(key, ValidationIssue::Unexpected));
            }
        }

        let mut cleaned = RawRecord::new();
        for spec in &self.schema.features {
            let value = record
                .get(spec.name)
                .ok_or_else(|| ValidationError::new(spec.name, ValidationIssue::Missing))?;
            cleaned.insert(spec.name, self.check_field(spec, value)?);
        }
        Ok(cleaned)
    }

    fn check_field(
        &self,
        spec: &FeatureSpec,
        value: &FeatureValue,
    ) -> Result<FeatureValue, ValidationError> {
        match (spec.kind, value) {
            (_, FeatureValue::Missing) => Ok(FeatureValue::Missing),
            (FeatureKind::Numeric, FeatureValue::Number(v)) => {
                check_numeric(spec, *v).map(FeatureValue::Number)
            }
            (FeatureKind::Numeric, FeatureValue::Text(_)) => Err(ValidationError::new(
                spec.name,
                ValidationIssue::ExpectedNumber,
            )),
            (FeatureKind::Categorical, FeatureValue::Text(s)) => {
                let token = s.trim();
                if token.is_empty() {
                    return Err(ValidationError::new(spec.name, ValidationIssue::Empty));
                }
                // Trimmed like dataset cells. Unseen tokens are accepted under
                // every policy and land in the unknown slot during encoding.
                Ok(FeatureValue::Text(token.to_string()))
            }
            (FeatureKind::Categorical, FeatureValue::Number(_)) => Err(ValidationError::new(
                spec.name,
                ValidationIssue::ExpectedText,
            )),
        }
    }
}

fn check_numeric(spec: &FeatureSpec, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new(spec.name, ValidationIssue::NotFinite));
    }

    match &spec.valid_range {
        Some(ValidRange::Numeric { min, max }) => {
            let below = min.map(|lo| value < lo).unwrap_or(false);
            let above = max.map(|hi| value > hi).unwrap_or(false);
            if !below && !above {
                return Ok(value);
            }
            match spec.policy {
                FieldPolicy::Clamp => {
                    let clamped = match (below, min, max) {
                        (true, Some(lo), _) => *lo,
                        (_, _, Some(hi)) => *hi,
                        _ => value,
                    };
                    debug!(field = spec.name, value, clamped, "Clamped out-of-range value");
                    Ok(clamped)
                }
                FieldPolicy::Reject | FieldPolicy::UnknownBucket => Err(ValidationError::new(
                    spec.name,
                    ValidationIssue::OutOfRange {
                        value,
                        min: *min,
                        max: *max,
                    },
                )),
            }
        }
        Some(ValidRange::Discrete { allowed }) => {
            if allowed.iter().any(|a| (a - value).abs() < f64::EPSILON) {
                return Ok(value);
            }
            match spec.policy {
                FieldPolicy::Clamp => {
                    let nearest = allowed
                        .iter()
                        .copied()
                        .min_by(|a, b| {
                            (a - value)
                                .abs()
                                .partial_cmp(&(b - value).abs())
                                .unwrap_or(std::cmp::Ordering::Equal)
                        })
                        .unwrap_or(value);
                    debug!(field = spec.name, value, nearest, "Snapped value to allowed set");
                    Ok(nearest)
                }
                FieldPolicy::Reject | FieldPolicy::UnknownBucket => Err(ValidationError::new(
                    spec.name,
                    ValidationIssue::NotAllowed {
                        value,
                        allowed: allowed.to_vec(),
                    },
                )),
            }
        }
        Some(ValidRange::Categorical { .. }) | None => Ok(value),
    }
}
