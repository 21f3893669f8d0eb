//! Commands that talk to a running prediction server

use anyhow::Result;
use model_lib::{Task, TaskSchema};
use tabled::Tabled;

use super::predict::print_prediction;
use crate::client::{ApiClient, ModelList, PredictRequest, PredictResponse};
use crate::input::build_record;
use crate::output::{color_status, print_json, print_table, OutputFormat};
use std::path::Path;

/// Row for the remote models table
#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Loaded")]
    loaded: String,
    #[tabled(rename = "Model")]
    model_type: String,
    #[tabled(rename = "Created")]
    created_at: String,
    #[tabled(rename = "Rollback")]
    rollback: String,
    #[tabled(rename = "Artifact")]
    artifact: String,
}

/// Predict one record on the server
pub async fn predict(
    client: &ApiClient,
    task: Task,
    input: Option<&Path>,
    assignments: &[String],
    format: OutputFormat,
) -> Result<()> {
    let schema = TaskSchema::for_task(task);
    let record = build_record(&schema, input, assignments)?;

    let path = format!("v1/predict/{}", task);
    let response: PredictResponse = client
        .post(&path, &PredictRequest { features: &record })
        .await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            print_prediction(task, &record, &response.outputs, &response.decision);
            if let Some(model) = &response.model {
                println!("Model: {} ({})", model.model_type, model.created_at);
            }
        }
    }
    Ok(())
}

/// List the models the server is serving
pub async fn models(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: ModelList = client.get("v1/models").await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            let rows: Vec<ModelRow> = result
                .models
                .iter()
                .map(|m| ModelRow {
                    task: m.task.clone(),
                    loaded: color_status(if m.loaded { "yes" } else { "no" }),
                    model_type: m
                        .model
                        .as_ref()
                        .map(|i| i.model_type.clone())
                        .unwrap_or_else(|| "-".to_string()),
                    created_at: m
                        .model
                        .as_ref()
                        .map(|i| i.created_at.clone())
                        .unwrap_or_else(|| "-".to_string()),
                    rollback: if m.can_rollback { "available" } else { "-" }.to_string(),
                    artifact: m.artifact.clone().unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            print_table(&rows);
        }
    }
    Ok(())
}
