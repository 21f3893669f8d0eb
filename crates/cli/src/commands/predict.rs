//! Local prediction command

use anyhow::{bail, Context, Result};
use model_lib::{
    Decision, ModelArtifact, ModelError, OutputRecord, OutputValue, Predictor, RawRecord, Task,
    TaskSchema,
};
use serde_json::json;
use std::path::Path;
use tabled::Tabled;

use crate::commentary;
use crate::input::build_record;
use crate::output::{
    color_label, print_heading, print_info, print_json, print_success, print_table,
    print_warning, OutputFormat,
};

/// Row for the outputs table
#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "Output")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Predict one record with a local model artifact
pub fn run(
    task: Task,
    model: &Path,
    input: Option<&Path>,
    assignments: &[String],
    format: OutputFormat,
) -> Result<()> {
    let schema = TaskSchema::for_task(task);
    let record = build_record(&schema, input, assignments)?;

    let artifact = ModelArtifact::load_for(model, task)
        .with_context(|| format!("Failed to load model {}", model.display()))?;
    let predictor = Predictor::from_artifact(artifact)?;

    let prediction = match predictor.predict(&record) {
        Ok(prediction) => prediction,
        Err(ModelError::Validation(e)) => bail!(
            "Invalid input for '{}': {}. Correct the value and try again.",
            e.field,
            e.issue
        ),
        Err(e) => return Err(e.into()),
    };

    match format {
        OutputFormat::Json => print_json(&json!({
            "task": prediction.task,
            "outputs": prediction.outputs,
            "decision": prediction.decision,
            "model": predictor.info(),
        }))?,
        OutputFormat::Table => print_prediction(task, &record, &prediction.outputs, &prediction.decision),
    }

    Ok(())
}

/// Human-readable prediction with commentary
pub fn print_prediction(task: Task, record: &RawRecord, outputs: &OutputRecord, decision: &Decision) {
    print_heading(&format!("{} prediction", capitalize(task.as_str())));

    let rows: Vec<OutputRow> = outputs
        .iter()
        .map(|(name, value)| OutputRow {
            name: name.to_string(),
            value: match value {
                OutputValue::Label(label) => color_label(label),
                OutputValue::Continuous(v) => format!("{:.3}", v),
            },
        })
        .collect();
    print_table(&rows);

    match decision {
        Decision::Model => println!("Source: model"),
        Decision::RuleOverride { rule } => {
            println!("Source: rule override ({})", rule);
        }
    }

    if let Some(commentary) = commentary::for_prediction(task, record, outputs) {
        println!();
        for insight in &commentary.insights {
            print_info(insight);
        }
        if commentary.favorable {
            print_success(&commentary.verdict);
        } else {
            print_warning(&commentary.verdict);
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
