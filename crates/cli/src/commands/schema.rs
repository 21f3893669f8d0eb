//! Schema listing command

use anyhow::Result;
use model_lib::schema::{FeatureKind, FieldPolicy, TargetKind, ValidRange};
use model_lib::{Task, TaskSchema};
use serde_json::json;
use tabled::Tabled;

use crate::output::{print_heading, print_json, print_table, OutputFormat};

/// Row for the feature table
#[derive(Tabled)]
struct FeatureRow {
    #[tabled(rename = "Feature")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Valid range")]
    range: String,
    #[tabled(rename = "Out of range")]
    policy: String,
}

/// Row for the target table
#[derive(Tabled)]
struct TargetRow {
    #[tabled(rename = "Output")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
}

/// Show the declared inputs and outputs of one task, or all of them
pub fn run(task: Option<Task>, format: OutputFormat) -> Result<()> {
    let tasks: Vec<Task> = match task {
        Some(task) => vec![task],
        None => Task::ALL.to_vec(),
    };
    let schemas: Vec<TaskSchema> = tasks.into_iter().map(TaskSchema::for_task).collect();

    if format == OutputFormat::Json {
        let documents: Vec<_> = schemas
            .iter()
            .map(|schema| json!({ "fingerprint": schema.fingerprint(), "schema": schema }))
            .collect();
        return print_json(&documents);
    }

    for schema in &schemas {
        print_heading(&format!("Task: {}", schema.task));

        let features: Vec<FeatureRow> = schema
            .features
            .iter()
            .map(|f| FeatureRow {
                name: f.name.to_string(),
                kind: match f.kind {
                    FeatureKind::Numeric => "numeric".to_string(),
                    FeatureKind::Categorical => "categorical".to_string(),
                },
                range: f
                    .valid_range
                    .as_ref()
                    .map(format_range)
                    .unwrap_or_else(|| "-".to_string()),
                policy: match f.policy {
                    FieldPolicy::Reject => "reject".to_string(),
                    FieldPolicy::Clamp => "clamp".to_string(),
                    FieldPolicy::UnknownBucket => "unknown bucket".to_string(),
                },
            })
            .collect();
        print_table(&features);

        let targets: Vec<TargetRow> = schema
            .targets
            .iter()
            .map(|t| TargetRow {
                name: t.name.to_string(),
                kind: match t.kind {
                    TargetKind::BinaryLabel => "label (0/1)".to_string(),
                    TargetKind::Continuous => "continuous".to_string(),
                },
            })
            .collect();
        print_table(&targets);

        if let Some(annotation) = schema.annotation {
            println!("Ignored annotation column: {}", annotation);
        }
        println!("Fingerprint: {}", schema.fingerprint());
        println!();
    }

    Ok(())
}

fn format_range(range: &ValidRange) -> String {
    match range {
        ValidRange::Numeric { min, max } => format!(
            "[{}, {}]",
            min.map(|v| v.to_string()).unwrap_or_else(|| "-inf".to_string()),
            max.map(|v| v.to_string()).unwrap_or_else(|| "inf".to_string())
        ),
        ValidRange::Discrete { allowed } => {
            let values: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
            format!("{{{}}}", values.join(", "))
        }
        ValidRange::Categorical { allowed } => allowed.join(" | "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_range() {
        assert_eq!(
            format_range(&ValidRange::Numeric {
                min: Some(0.0),
                max: None
            }),
            "[0, inf]"
        );
        assert_eq!(
            format_range(&ValidRange::Discrete {
                allowed: &[0.0, 1.0]
            }),
            "{0, 1}"
        );
        assert_eq!(
            format_range(&ValidRange::Categorical {
                allowed: &["22G", "25G"]
            }),
            "22G | 25G"
        );
    }
}
