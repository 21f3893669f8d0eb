//! Offline training command

use anyhow::{Context, Result};
use model_lib::evaluation::{ClassificationReport, EvaluationReport, RegressionReport};
use model_lib::{train, Dataset, StructuredLogger, Task, TaskSchema, TrainingConfig};
use serde_json::json;
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    color_score, format_metric, print_heading, print_json, print_success, print_table,
    OutputFormat,
};

/// Row for per-class metrics
#[derive(Tabled)]
struct ClassRow {
    #[tabled(rename = "Class")]
    class: usize,
    #[tabled(rename = "Precision")]
    precision: String,
    #[tabled(rename = "Recall")]
    recall: String,
    #[tabled(rename = "F1")]
    f1: String,
    #[tabled(rename = "Support")]
    support: usize,
}

/// Row for per-target regression metrics
#[derive(Tabled)]
struct TargetRow {
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "MSE")]
    mse: String,
    #[tabled(rename = "R²")]
    r2: String,
}

/// Train a model for `task` from a CSV file and write the artifact
pub fn run(
    task: Task,
    data: &Path,
    output: &Path,
    config: &TrainingConfig,
    format: OutputFormat,
) -> Result<()> {
    let schema = TaskSchema::for_task(task);
    let dataset = Dataset::from_csv(data, &schema)
        .with_context(|| format!("Failed to load dataset {}", data.display()))?;

    let outcome = train(&dataset, &schema, config)?;
    let checksum = outcome
        .artifact
        .save(output)
        .with_context(|| format!("Failed to write artifact {}", output.display()))?;

    StructuredLogger::new("bioprint-cli").log_training_completed(
        task.as_str(),
        dataset.len(),
        &outcome.evaluation.headline(),
        &output.display().to_string(),
    );

    match format {
        OutputFormat::Json => print_json(&json!({
            "task": task,
            "artifact": output.display().to_string(),
            "checksum": checksum,
            "split": outcome.artifact.split,
            "evaluation": outcome.evaluation,
        }))?,
        OutputFormat::Table => {
            print_success(&format!(
                "Trained {} model on {} rows ({} held out), saved to {}",
                task,
                outcome.artifact.split.train_rows,
                outcome.artifact.split.test_rows,
                output.display()
            ));
            if outcome.artifact.split.dropped_rows > 0 {
                println!(
                    "Dropped {} rows with missing targets",
                    outcome.artifact.split.dropped_rows
                );
            }
            println!("Checksum: {}", checksum);
            println!();
            print_evaluation(&outcome.evaluation);
        }
    }

    Ok(())
}

/// Print a holdout evaluation report
pub fn print_evaluation(evaluation: &EvaluationReport) {
    match evaluation {
        EvaluationReport::Classification(report) => print_classification(report),
        EvaluationReport::Regression(report) => print_regression(report),
    }
}

fn print_classification(report: &ClassificationReport) {
    print_heading("Holdout Evaluation");
    println!("Samples:   {}", report.n_samples);
    println!("Accuracy:  {}", color_score(report.accuracy));
    println!("Macro F1:  {}", color_score(report.macro_f1));
    println!();

    let rows: Vec<ClassRow> = report
        .per_class
        .iter()
        .map(|c| ClassRow {
            class: c.class,
            precision: format_metric(c.precision),
            recall: format_metric(c.recall),
            f1: format_metric(c.f1),
            support: c.support,
        })
        .collect();
    print_table(&rows);

    println!("Confusion matrix (rows = actual, columns = predicted):");
    for (actual, row) in report.confusion.iter().enumerate() {
        let cells: Vec<String> = row.iter().map(|n| format!("{:>5}", n)).collect();
        println!("  {} |{}", actual, cells.join(""));
    }
}

fn print_regression(report: &RegressionReport) {
    print_heading("Holdout Evaluation");
    println!("Samples: {}", report.n_samples);
    println!();

    let rows: Vec<TargetRow> = report
        .targets
        .iter()
        .map(|t| TargetRow {
            target: t.target.clone(),
            mse: format_metric(t.mse),
            r2: color_score(t.r2),
        })
        .collect();
    print_table(&rows);
}
