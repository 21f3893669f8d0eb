//! CLI integration tests

use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn bioprint(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bioprint"))
        .args(args)
        .env("BIOPRINT_CONFIG", dir.join("no-config.json"))
        .env_remove("BIOPRINT_API_URL")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn write_printability_csv(dir: &Path) -> String {
    let mut csv = String::from(
        "Gelatin_pct,Silk_pct,LH,PP,PS,T,TG_min,Used_crosslinker,Needle,Remarks,Printable\n",
    );
    for i in 0..40 {
        let gelatin = 5.0 + (i % 20) as f64;
        let printable = u8::from((12.0..=18.0).contains(&gelatin));
        let needle = ["22G", "25G", "27G"][i % 3];
        csv.push_str(&format!(
            "{gelatin},4.5,0.68,55,10,23.5,{},1,{needle},run {i},{printable}\n",
            1 + i % 9
        ));
    }
    let path = dir.join("printability.csv");
    std::fs::write(&path, csv).unwrap();
    path.display().to_string()
}

fn train_printability(dir: &Path) -> String {
    let data = write_printability_csv(dir);
    let model = dir.join("models").join("printability.json").display().to_string();
    let output = bioprint(
        dir,
        &[
            "--format",
            "json",
            "train",
            "--task",
            "printability",
            "--data",
            &data,
            "--output",
            &model,
            "--n-estimators",
            "10",
        ],
    );
    assert!(
        output.status.success(),
        "train should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let body = stdout_json(&output);
    assert_eq!(body["task"], "printability");
    assert_eq!(body["checksum"].as_str().unwrap().len(), 64);
    assert_eq!(body["split"]["test_rows"], 8);
    model
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    let output = bioprint(dir.path(), &["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("bioprint"), "Should show app name");
    for command in ["train", "predict", "inspect", "schema", "remote"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    let output = bioprint(dir.path(), &["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("bioprint"), "Should show binary name");
}

#[test]
fn test_predict_help() {
    let dir = TempDir::new().unwrap();
    let output = bioprint(dir.path(), &["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--set"), "Should show set option");
    assert!(stdout.contains("--model"), "Should show model option");
}

#[test]
fn test_schema_json() {
    let dir = TempDir::new().unwrap();
    let output = bioprint(dir.path(), &["--format", "json", "schema", "degradation"]);
    assert!(output.status.success());

    let body = stdout_json(&output);
    let documents = body.as_array().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["schema"]["task"], "degradation");
    assert_eq!(documents[0]["schema"]["features"].as_array().unwrap().len(), 4);
    assert_eq!(documents[0]["fingerprint"].as_str().unwrap().len(), 64);
}

#[test]
fn test_schema_table_lists_all_tasks() {
    let dir = TempDir::new().unwrap();
    let output = bioprint(dir.path(), &["schema"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("Task: printability"));
    assert!(stdout.contains("Task: degradation"));
    assert!(stdout.contains("Remarks"));
}

#[test]
fn test_unknown_task_rejected() {
    let dir = TempDir::new().unwrap();
    let output = bioprint(dir.path(), &["schema", "viscosity"]);
    assert!(!output.status.success());
}

#[test]
fn test_train_predict_inspect() {
    let dir = TempDir::new().unwrap();
    let model = train_printability(dir.path());

    let output = bioprint(
        dir.path(),
        &[
            "--format",
            "json",
            "predict",
            "--task",
            "printability",
            "--model",
            &model,
            "--set",
            "Gelatin_pct=15",
            "--set",
            "Silk_pct=4.5",
            "--set",
            "LH=0.68",
            "--set",
            "PP=55",
            "--set",
            "PS=10",
            "--set",
            "T=23.5",
            "--set",
            "TG_min=0",
            "--set",
            "Used_crosslinker=1",
            "--set",
            "Needle=22G",
        ],
    );
    assert!(
        output.status.success(),
        "predict should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let body = stdout_json(&output);
    assert_eq!(body["outputs"]["Printable"], 0);
    assert_eq!(body["decision"]["source"], "rule_override");
    assert_eq!(body["model"]["model_type"], "random_forest");

    let output = bioprint(dir.path(), &["--format", "json", "inspect", &model]);
    assert!(output.status.success());
    let body = stdout_json(&output);
    assert_eq!(body["task"], "printability");
    assert_eq!(body["format_version"], 1);
    assert_eq!(body["evaluation"]["kind"], "classification");
    assert_eq!(body["preprocessor"]["categorical"][0]["name"], "Needle");

    let output = bioprint(dir.path(), &["inspect", &model]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Model Artifact"));
    assert!(stdout.contains("Holdout Evaluation"));
}

#[test]
fn test_predict_from_input_file_with_commentary() {
    let dir = TempDir::new().unwrap();
    let model = train_printability(dir.path());

    let input = dir.path().join("record.json");
    std::fs::write(
        &input,
        r#"{"Gelatin_pct": 14, "Silk_pct": 4.5, "LH": 0.7, "PP": 55, "PS": 0,
            "T": 23.5, "TG_min": 5, "Used_crosslinker": 1, "Needle": "25G"}"#,
    )
    .unwrap();

    let output = bioprint(
        dir.path(),
        &[
            "predict",
            "--task",
            "printability",
            "--model",
            &model,
            "--input",
            &input.display().to_string(),
        ],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Not printable"));
    assert!(stdout.contains("rule override (no_print_speed)"));
    assert!(stdout.contains("Optimal gelatin content"));
}

#[test]
fn test_invalid_input_reports_field() {
    let dir = TempDir::new().unwrap();
    let model = train_printability(dir.path());

    let output = bioprint(
        dir.path(),
        &[
            "predict",
            "--task",
            "printability",
            "--model",
            &model,
            "--set",
            "Gelatin_pct=15",
            "--set",
            "PS=99",
        ],
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("Invalid input"), "stderr: {}", stderr);
}

#[test]
fn test_wrong_task_model_rejected() {
    let dir = TempDir::new().unwrap();
    let model = train_printability(dir.path());

    let output = bioprint(
        dir.path(),
        &[
            "predict",
            "--task",
            "degradation",
            "--model",
            &model,
            "--set",
            "Porosity_Percentage=50",
        ],
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("Failed to load model"), "stderr: {}", stderr);
}

#[test]
fn test_remote_models_unreachable_server() {
    let dir = TempDir::new().unwrap();
    let output = bioprint(
        dir.path(),
        &["--api-url", "http://127.0.0.1:9", "remote", "models"],
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("Failed to send request"), "stderr: {}", stderr);
}
