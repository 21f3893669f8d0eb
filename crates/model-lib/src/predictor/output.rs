//! Prediction output formatting
//!
//! Converts raw estimator outputs into named, display-ready values:
//! binary labels become integer 0/1, continuous targets are rounded.

use crate::error::{ModelError, Result};
use crate::models::{OutputRecord, OutputValue};
use crate::schema::{TargetKind, TargetSpec};

/// Decimal places kept for continuous outputs
pub const DEFAULT_DECIMAL_PLACES: i32 = 3;

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub decimal_places: i32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            decimal_places: DEFAULT_DECIMAL_PLACES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputFormatter {
    config: OutputConfig,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self {
            config: OutputConfig::default(),
        }
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Pair each raw output with its target, in target order.
    pub fn format(&self, targets: &[TargetSpec], raw: &[f64]) -> Result<OutputRecord> {
        if raw.len() != targets.len() {
            return Err(ModelError::schema_mismatch(format!(
                "estimator produced {} outputs for {} targets",
                raw.len(),
                targets.len()
            )));
        }

        let mut record = OutputRecord::new();
        for (target, &value) in targets.iter().zip(raw) {
            if !value.is_finite() {
                return Err(ModelError::schema_mismatch(format!(
                    "estimator produced a non-finite value for '{}'",
                    target.name
                )));
            }
            let formatted = match target.kind {
                TargetKind::BinaryLabel => OutputValue::Label(to_label(value)),
                TargetKind::Continuous => {
                    OutputValue::Continuous(self.round(value))
                }
            };
            record.push(target.name, formatted);
        }
        Ok(record)
    }

    fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.config.decimal_places);
        (value * factor).round() / factor
    }
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn to_label(value: f64) -> u8 {
    if value >= 0.5 {
        1
    } else {
        0
    }
}
