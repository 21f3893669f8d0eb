//! Composite model artifacts
//!
//! One JSON document per task bundles the fitted preprocessor, the fitted
//! estimator and the schema fingerprint they were trained against. Loading
//! recomputes the fingerprint from the live schema registry and refuses
//! artifacts built for a different column layout.

use crate::error::{ModelError, Result};
use crate::estimator::{FittedEstimator, ForestParams, ModelType};
use crate::evaluation::EvaluationReport;
use crate::predictor::{check_estimator_kind, check_pairing};
use crate::preprocess::Preprocessor;
use crate::schema::{Task, TaskSchema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bumped whenever the artifact layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

/// How the training data was partitioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub dropped_rows: usize,
    pub test_fraction: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub task: Task,
    pub schema_fingerprint: String,
    pub model_type: ModelType,
    pub created_at: DateTime<Utc>,
    pub hyperparameters: ForestParams,
    pub split: SplitSummary,
    pub evaluation: EvaluationReport,
    pub preprocessor: Preprocessor,
    pub estimator: FittedEstimator,
}

/// An artifact read from disk together with the checksum of its bytes.
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub artifact: ModelArtifact,
    pub checksum: String,
}

impl ModelArtifact {
    /// Bundle a freshly trained model, stamping it with the current schema
    /// fingerprint.
    pub fn new(
        schema: &TaskSchema,
        model_type: ModelType,
        hyperparameters: ForestParams,
        split: SplitSummary,
        evaluation: EvaluationReport,
        preprocessor: Preprocessor,
        estimator: FittedEstimator,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            task: schema.task,
            schema_fingerprint: schema.fingerprint(),
            model_type,
            created_at: Utc::now(),
            hyperparameters,
            split,
            evaluation,
            preprocessor,
            estimator,
        }
    }

    /// Check version, fingerprint and component pairing.
    pub fn verify(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(ModelError::artifact(format!(
                "unsupported artifact format version {} (expected {})",
                self.format_version, FORMAT_VERSION
            )));
        }

        let schema = TaskSchema::for_task(self.task);
        let expected = schema.fingerprint();
        if self.schema_fingerprint != expected {
            return Err(ModelError::schema_mismatch(format!(
                "artifact fingerprint {} does not match the '{}' schema ({})",
                short(&self.schema_fingerprint),
                self.task,
                short(&expected)
            )));
        }

        check_estimator_kind(&schema, &self.estimator)?;
        check_pairing(&schema, &self.preprocessor, &self.estimator)
    }

    /// Write atomically: temp file, fsync, rename. Returns the SHA-256 of
    /// the written bytes.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec_pretty(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = temp_path_for(path);
        if let Err(e) = write_synced(&temp_path, &bytes).and_then(|_| fs::rename(&temp_path, path)) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        let checksum = compute_checksum(&bytes);
        info!(
            task = %self.task,
            path = %path.display(),
            bytes = bytes.len(),
            checksum = %checksum,
            "Saved model artifact"
        );
        Ok(checksum)
    }

    /// Read and verify an artifact, optionally requiring a specific task.
    pub fn open(path: impl AsRef<Path>, expected_task: Option<Task>) -> Result<LoadedArtifact> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            ModelError::artifact(format!("cannot read {}: {}", path.display(), e))
        })?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)?;

        if let Some(task) = expected_task {
            if artifact.task != task {
                return Err(ModelError::schema_mismatch(format!(
                    "artifact at {} is for task '{}', expected '{}'",
                    path.display(),
                    artifact.task,
                    task
                )));
            }
        }
        artifact.verify()?;

        let checksum = compute_checksum(&bytes);
        debug!(
            task = %artifact.task,
            path = %path.display(),
            checksum = %checksum,
            "Verified model artifact"
        );
        Ok(LoadedArtifact { artifact, checksum })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::open(path, None)?.artifact)
    }

    pub fn load_for(path: impl AsRef<Path>, task: Task) -> Result<Self> {
        Ok(Self::open(path, Some(task))?.artifact)
    }
}

/// Sibling of `path` named after the full file name, so `a.json` and
/// `a.toml` never share a temp file.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// SHA-256 hex digest.
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
