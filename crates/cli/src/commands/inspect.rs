//! Artifact inspection command

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use model_lib::ModelArtifact;
use serde_json::json;
use std::path::Path;
use tabled::Tabled;

use super::train::print_evaluation;
use crate::output::{print_heading, print_json, print_table, print_warning, OutputFormat};

/// Row for numeric column statistics
#[derive(Tabled)]
struct NumericRow {
    #[tabled(rename = "Column")]
    name: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Scale")]
    scale: String,
}

/// Row for categorical vocabularies
#[derive(Tabled)]
struct CategoricalRow {
    #[tabled(rename = "Column")]
    name: String,
    #[tabled(rename = "Categories")]
    categories: String,
    #[tabled(rename = "Mode")]
    mode: String,
}

/// Show the metadata, fitted statistics and evaluation stored in an artifact
pub fn run(path: &Path, format: OutputFormat) -> Result<()> {
    let loaded = ModelArtifact::open(path, None)
        .with_context(|| format!("Failed to load artifact {}", path.display()))?;
    let artifact = &loaded.artifact;

    if format == OutputFormat::Json {
        return print_json(&json!({
            "path": path.display().to_string(),
            "checksum": loaded.checksum,
            "task": artifact.task,
            "format_version": artifact.format_version,
            "model_type": artifact.model_type,
            "created_at": artifact.created_at,
            "schema_fingerprint": artifact.schema_fingerprint,
            "hyperparameters": artifact.hyperparameters,
            "split": artifact.split,
            "evaluation": artifact.evaluation,
            "preprocessor": artifact.preprocessor.fitted_state(),
        }));
    }

    print_heading("Model Artifact");
    let age_days = Utc::now()
        .signed_duration_since(artifact.created_at)
        .num_days();
    println!("Path:         {}", path.display());
    println!("Task:         {}", artifact.task.as_str().cyan());
    println!("Model type:   {}", artifact.model_type);
    println!("Format:       v{}", artifact.format_version);
    println!(
        "Created:      {} ({} days ago)",
        artifact.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        age_days
    );
    println!("Fingerprint:  {}", artifact.schema_fingerprint);
    println!("Checksum:     {}", loaded.checksum);
    println!();

    let params = &artifact.hyperparameters;
    println!(
        "Hyperparameters: n_estimators={} max_depth={} random_state={}",
        params.n_estimators,
        params
            .max_depth
            .map(|d| d.to_string())
            .unwrap_or_else(|| "none".to_string()),
        params.random_state
    );
    let split = &artifact.split;
    println!(
        "Split: {} train / {} test (fraction {}, seed {}), {} rows dropped",
        split.train_rows, split.test_rows, split.test_fraction, split.seed, split.dropped_rows
    );
    println!();

    match artifact.preprocessor.fitted_state() {
        Some(state) => {
            let numeric: Vec<NumericRow> = state
                .numeric
                .iter()
                .map(|c| NumericRow {
                    name: c.name.clone(),
                    mean: format!("{:.4}", c.mean),
                    scale: format!("{:.4}", c.scale),
                })
                .collect();
            print_table(&numeric);

            let categorical: Vec<CategoricalRow> = state
                .categorical
                .iter()
                .map(|c| CategoricalRow {
                    name: c.name.clone(),
                    categories: c.categories.join(", "),
                    mode: c.mode.clone().unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            print_table(&categorical);
        }
        None => print_warning("Preprocessor is not fitted"),
    }
    println!();

    print_evaluation(&artifact.evaluation);
    Ok(())
}
