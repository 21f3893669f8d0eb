//! Building raw records from command line assignments and JSON input

use anyhow::{bail, Context, Result};
use model_lib::schema::FeatureKind;
use model_lib::{FeatureValue, RawRecord, TaskSchema, Validator};
use std::io::Read;
use std::path::Path;

/// Parse one `KEY=VALUE` assignment using the schema to decide the type.
///
/// Empty values and `null` become explicit missing values. Keys outside the
/// schema are kept so validation can report them.
pub fn parse_assignment(schema: &TaskSchema, assignment: &str) -> Result<(String, FeatureValue)> {
    let Some((key, raw)) = assignment.split_once('=') else {
        bail!("Expected KEY=VALUE, got '{}'", assignment);
    };
    let key = key.trim();
    let raw = raw.trim();
    if key.is_empty() {
        bail!("Missing feature name in '{}'", assignment);
    }

    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return Ok((key.to_string(), FeatureValue::Missing));
    }

    let value = match schema.feature(key).map(|f| f.kind) {
        Some(FeatureKind::Numeric) => {
            let number: f64 = raw
                .parse()
                .with_context(|| format!("Feature '{}' expects a number, got '{}'", key, raw))?;
            FeatureValue::Number(number)
        }
        Some(FeatureKind::Categorical) => FeatureValue::Text(raw.to_string()),
        None => match raw.parse::<f64>() {
            Ok(number) => FeatureValue::Number(number),
            Err(_) => FeatureValue::Text(raw.to_string()),
        },
    };
    Ok((key.to_string(), value))
}

/// Read a JSON object from a file, or from stdin when `path` is `-`.
pub fn read_record(schema: &TaskSchema, path: &Path) -> Result<RawRecord> {
    let content = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read record from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&content).context("Input must be a JSON object of feature values")?;
    Validator::new(schema).record_from_json(&object).map_err(|e| {
        anyhow::anyhow!(
            "Invalid input for '{}': {}. Correct the value and try again.",
            e.field,
            e.issue
        )
    })
}

/// Combine an optional JSON input with `KEY=VALUE` overrides.
pub fn build_record(
    schema: &TaskSchema,
    input: Option<&Path>,
    assignments: &[String],
) -> Result<RawRecord> {
    let mut record = match input {
        Some(path) => read_record(schema, path)?,
        None => RawRecord::new(),
    };
    for assignment in assignments {
        let (key, value) = parse_assignment(schema, assignment)?;
        record.insert(key, value);
    }
    if record.is_empty() {
        bail!("No features given; use --set KEY=VALUE or --input <file>");
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_lib::Task;

    #[test]
    fn test_numeric_and_categorical_assignments() {
        let schema = TaskSchema::for_task(Task::Degradation);
        let (key, value) = parse_assignment(&schema, "Porosity_Percentage=62.5").unwrap();
        assert_eq!(key, "Porosity_Percentage");
        assert_eq!(value, FeatureValue::Number(62.5));

        let (_, value) = parse_assignment(&schema, "Scaffold_Geometry=Body Centered").unwrap();
        assert_eq!(value, FeatureValue::Text("Body Centered".to_string()));
    }

    #[test]
    fn test_null_is_missing() {
        let schema = TaskSchema::for_task(Task::Degradation);
        let (_, value) = parse_assignment(&schema, "Immersion_Time_Days=null").unwrap();
        assert!(value.is_missing());
        let (_, value) = parse_assignment(&schema, "Immersion_Time_Days=").unwrap();
        assert!(value.is_missing());
    }

    #[test]
    fn test_bad_assignments() {
        let schema = TaskSchema::for_task(Task::Printability);
        assert!(parse_assignment(&schema, "PS").is_err());
        assert!(parse_assignment(&schema, "=3").is_err());
        assert!(parse_assignment(&schema, "PS=fast").is_err());
    }

    #[test]
    fn test_overrides_apply_after_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");
        std::fs::write(&path, r#"{"PS": 10, "Needle": "22G"}"#).unwrap();

        let schema = TaskSchema::for_task(Task::Printability);
        let record = build_record(&schema, Some(&path), &["PS=12".to_string()]).unwrap();
        assert_eq!(record.get("PS"), Some(&FeatureValue::Number(12.0)));
        assert_eq!(
            record.get("Needle"),
            Some(&FeatureValue::Text("22G".to_string()))
        );
    }

    #[test]
    fn test_input_file_with_wrong_json_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");
        std::fs::write(&path, r#"{"PS": true, "Needle": "22G"}"#).unwrap();

        let schema = TaskSchema::for_task(Task::Printability);
        let err = build_record(&schema, Some(&path), &[]).unwrap_err();
        assert!(err.to_string().contains("Invalid input for 'PS'"), "{err}");
    }

    #[test]
    fn test_empty_record_rejected() {
        let schema = TaskSchema::for_task(Task::Printability);
        assert!(build_record(&schema, None, &[]).is_err());
    }
}
