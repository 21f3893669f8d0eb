//! Schema registry for the printability and degradation tasks
//!
//! Declares, per task, the ordered input features with their kinds, valid
//! ranges and validation policies, the ordered outputs, and the optional
//! free-text annotation column that is never used as a model feature.

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Prediction tasks served by this workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Printability,
    Degradation,
}

impl Task {
    pub const ALL: [Task; 2] = [Task::Printability, Task::Degradation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Printability => "printability",
            Task::Degradation => "degradation",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "printability" => Ok(Task::Printability),
            "degradation" => Ok(Task::Degradation),
            other => Err(ModelError::UnknownTask(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

/// Declared domain of a feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidRange {
    /// Inclusive bounds; `None` leaves that side open
    Numeric { min: Option<f64>, max: Option<f64> },
    /// Numeric flags restricted to a finite set of values
    Discrete { allowed: &'static [f64] },
    /// Documented vocabulary; membership is not enforced
    Categorical { allowed: &'static [&'static str] },
}

/// What the validation stage does with a value outside its declared domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    Reject,
    Clamp,
    UnknownBucket,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub kind: FeatureKind,
    pub valid_range: Option<ValidRange>,
    pub policy: FieldPolicy,
}

impl FeatureSpec {
    pub fn numeric(name: &'static str, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            name,
            kind: FeatureKind::Numeric,
            valid_range: Some(ValidRange::Numeric { min, max }),
            policy: FieldPolicy::Reject,
        }
    }

    pub fn flag(name: &'static str, allowed: &'static [f64]) -> Self {
        Self {
            name,
            kind: FeatureKind::Numeric,
            valid_range: Some(ValidRange::Discrete { allowed }),
            policy: FieldPolicy::Reject,
        }
    }

    pub fn categorical(name: &'static str, allowed: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: FeatureKind::Categorical,
            valid_range: Some(ValidRange::Categorical { allowed }),
            policy: FieldPolicy::UnknownBucket,
        }
    }

    pub fn with_policy(mut self, policy: FieldPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    BinaryLabel,
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSpec {
    pub name: &'static str,
    pub kind: TargetKind,
}

/// Full input/output declaration for one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSchema {
    pub task: Task,
    pub features: Vec<FeatureSpec>,
    pub targets: Vec<TargetSpec>,
    pub annotation: Option<&'static str>,
}

const BINARY: &[f64] = &[0.0, 1.0];
const NEEDLES: &[&str] = &["22G", "25G", "27G", "30G"];
const GEOMETRIES: &[&str] = &[
    "Body Centered",
    "Body Centered Shifted",
    "Body Centered Cubic",
];

impl TaskSchema {
    pub fn for_task(task: Task) -> Self {
        match task {
            Task::Printability => Self::printability(),
            Task::Degradation => Self::degradation(),
        }
    }

    /// Look up a schema by task name.
    pub fn by_name(name: &str) -> Result<Self> {
        Ok(Self::for_task(name.parse()?))
    }

    fn printability() -> Self {
        Self {
            task: Task::Printability,
            features: vec![
                FeatureSpec::numeric("Gelatin_pct", Some(0.0), Some(30.0)),
                FeatureSpec::numeric("Silk_pct", Some(0.0), Some(10.0)),
                FeatureSpec::numeric("LH", Some(0.0), Some(1.0)),
                FeatureSpec::numeric("PP", Some(0.0), Some(100.0)),
                FeatureSpec::numeric("PS", Some(0.0), Some(30.0)),
                FeatureSpec::numeric("T", Some(10.0), Some(40.0)),
                FeatureSpec::numeric("TG_min", Some(0.0), Some(10.0)),
                FeatureSpec::flag("Used_crosslinker", BINARY),
                FeatureSpec::categorical("Needle", NEEDLES),
            ],
            targets: vec![TargetSpec {
                name: "Printable",
                kind: TargetKind::BinaryLabel,
            }],
            annotation: Some("Remarks"),
        }
    }

    fn degradation() -> Self {
        Self {
            task: Task::Degradation,
            features: vec![
                FeatureSpec::categorical("Scaffold_Geometry", GEOMETRIES),
                FeatureSpec::numeric("Porosity_Percentage", Some(0.0), Some(100.0)),
                FeatureSpec::numeric("Immersion_Time_Days", Some(0.0), None),
                FeatureSpec::flag("Mechanical_Loading", BINARY),
            ],
            targets: vec![
                TargetSpec {
                    name: "Compressive_Stiffness_MPa",
                    kind: TargetKind::Continuous,
                },
                TargetSpec {
                    name: "Weight_Loss_Percentage",
                    kind: TargetKind::Continuous,
                },
                TargetSpec {
                    name: "Water_Absorption_Percentage",
                    kind: TargetKind::Continuous,
                },
            ],
            annotation: None,
        }
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn feature_names(&self) -> Vec<&'static str> {
        self.features.iter().map(|f| f.name).collect()
    }

    /// Numeric columns in declaration order.
    pub fn numeric_columns(&self) -> Vec<&'static str> {
        self.columns_of(FeatureKind::Numeric)
    }

    /// Categorical columns in declaration order.
    pub fn categorical_columns(&self) -> Vec<&'static str> {
        self.columns_of(FeatureKind::Categorical)
    }

    fn columns_of(&self, kind: FeatureKind) -> Vec<&'static str> {
        self.features
            .iter()
            .filter(|f| f.kind == kind)
            .map(|f| f.name)
            .collect()
    }

    pub fn target_names(&self) -> Vec<&'static str> {
        self.targets.iter().map(|t| t.name).collect()
    }

    pub fn is_annotation(&self, name: &str) -> bool {
        self.annotation == Some(name)
    }

    /// SHA-256 over the task name and the ordered feature and target
    /// declarations. Artifacts carry this value and are rejected at load
    /// time when it no longer matches the registry.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.task.as_str().as_bytes());
        for feature in &self.features {
            hasher.update(b"|f:");
            hasher.update(feature.name.as_bytes());
            hasher.update(b":");
            hasher.update(kind_tag(feature.kind).as_bytes());
        }
        for target in &self.targets {
            hasher.update(b"|t:");
            hasher.update(target.name.as_bytes());
            hasher.update(b":");
            hasher.update(target_tag(target.kind).as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

fn kind_tag(kind: FeatureKind) -> &'static str {
    match kind {
        FeatureKind::Numeric => "numeric",
        FeatureKind::Categorical => "categorical",
    }
}

fn target_tag(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::BinaryLabel => "binary_label",
        TargetKind::Continuous => "continuous",
    }
}
