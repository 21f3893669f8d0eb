//! CSV training datasets
//!
//! Columns are resolved by header name against the task schema. Extra
//! columns, including the annotation column, are ignored. Rows with any
//! missing target are dropped before training.

use crate::error::{ModelError, Result};
use crate::models::{FeatureValue, RawRecord};
use crate::schema::{FeatureKind, TargetKind, TaskSchema};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

const MISSING_TOKENS: [&str; 4] = ["na", "nan", "null", "none"];

#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<RawRecord>,
    /// `targets[row][target]` in schema target order
    targets: Vec<Vec<f64>>,
    dropped_rows: usize,
}

impl Dataset {
    pub fn from_csv(path: impl AsRef<Path>, schema: &TaskSchema) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ModelError::dataset(format!("cannot open {}: {}", path.display(), e))
        })?;
        let dataset = Self::from_reader(file, schema)?;
        info!(
            path = %path.display(),
            task = %schema.task,
            rows = dataset.len(),
            dropped = dataset.dropped_rows,
            "Loaded dataset"
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R, schema: &TaskSchema) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let position = |name: &str| headers.iter().position(|h| h == name);

        let missing: Vec<&str> = schema
            .feature_names()
            .into_iter()
            .chain(schema.target_names())
            .filter(|name| position(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ModelError::schema_mismatch(format!(
                "dataset is missing column(s): {}",
                missing.join(", ")
            )));
        }

        let feature_columns: Vec<(usize, &'static str, FeatureKind)> = schema
            .features
            .iter()
            .filter_map(|f| position(f.name).map(|i| (i, f.name, f.kind)))
            .collect();
        let target_columns: Vec<(usize, &'static str, TargetKind)> = schema
            .targets
            .iter()
            .filter_map(|t| position(t.name).map(|i| (i, t.name, t.kind)))
            .collect();

        let mut records = Vec::new();
        let mut targets = Vec::new();
        let mut dropped_rows = 0;

        for (index, row) in rdr.records().enumerate() {
            let row = row?;
            let line = row.position().map(|p| p.line()).unwrap_or(index as u64 + 2);
            let cell = |col: usize| row.get(col).unwrap_or("");

            let mut values = Vec::with_capacity(target_columns.len());
            for &(col, name, kind) in &target_columns {
                let value = parse_number(cell(col)).map_err(|raw| {
                    ModelError::dataset(format!(
                        "line {}, column '{}': cannot parse '{}' as a number",
                        line, name, raw
                    ))
                })?;
                if let (Some(v), TargetKind::BinaryLabel) = (value, kind) {
                    if v != 0.0 && v != 1.0 {
                        return Err(ModelError::dataset(format!(
                            "line {}, column '{}': label must be 0 or 1, got {}",
                            line, name, v
                        )));
                    }
                }
                values.push(value);
            }
            let Some(values) = values.into_iter().collect::<Option<Vec<f64>>>() else {
                dropped_rows += 1;
                continue;
            };

            let mut record = RawRecord::new();
            for &(col, name, kind) in &feature_columns {
                let raw = cell(col);
                let value = match kind {
                    FeatureKind::Numeric => match parse_number(raw) {
                        Ok(Some(v)) => FeatureValue::Number(v),
                        Ok(None) => FeatureValue::Missing,
                        Err(raw) => {
                            return Err(ModelError::dataset(format!(
                                "line {}, column '{}': cannot parse '{}' as a number",
                                line, name, raw
                            )))
                        }
                    },
                    FeatureKind::Categorical if is_missing_token(raw) => FeatureValue::Missing,
                    FeatureKind::Categorical => FeatureValue::Text(raw.trim().to_string()),
                };
                record.insert(name, value);
            }

            records.push(record);
            targets.push(values);
        }

        if dropped_rows > 0 {
            warn!(
                task = %schema.task,
                dropped = dropped_rows,
                "Dropped rows with a missing target"
            );
        }
        if records.is_empty() {
            return Err(ModelError::dataset("dataset has no usable rows"));
        }

        Ok(Self {
            records,
            targets,
            dropped_rows,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn targets(&self) -> &[Vec<f64>] {
        &self.targets
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    /// Clone out the rows at `indices`.
    pub fn subset(&self, indices: &[usize]) -> (Vec<RawRecord>, Vec<Vec<f64>>) {
        indices
            .iter()
            .map(|&i| (self.records[i].clone(), self.targets[i].clone()))
            .unzip()
    }
}

/// Empty cells and the usual NA spellings are missing. On failure the
/// offending text is returned.
/// Empty cells and the usual NA spellings, case-insensitive.
fn is_missing_token(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || MISSING_TOKENS.contains(&trimmed.to_ascii_lowercase().as_str())
}

fn parse_number(raw: &str) -> std::result::Result<Option<f64>, String> {
    if is_missing_token(raw) {
        return Ok(None);
    }
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(trimmed.to_string()),
    }
}

/// Shuffle `0..n` with a seeded RNG and cut off `ceil(n * test_fraction)`
/// indices for the test split. Returns `(train, test)`.
pub fn train_test_split(
    n: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ModelError::dataset(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test >= n {
        return Err(ModelError::dataset(format!(
            "{} rows are too few to hold out {:.0}% for testing",
            n,
            test_fraction * 100.0
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);
    Ok((train, indices))
}
