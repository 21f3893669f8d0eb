//! Observability infrastructure for training and serving
//!
//! Provides:
//! - Prometheus metrics (prediction latency, decisions, rejections, reloads, loaded model info)
//! - Structured event logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, Encoder, GaugeVec,
    HistogramVec, IntCounterVec, TextEncoder,
};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PredictorMetricsInner> = OnceLock::new();

struct PredictorMetricsInner {
    prediction_latency_seconds: HistogramVec,
    predictions_total: IntCounterVec,
    validation_rejections_total: IntCounterVec,
    prediction_errors_total: IntCounterVec,
    model_reloads_total: IntCounterVec,
    model_info: GaugeVec,
    /// Label values currently exported per task, so a reload can retire them
    model_info_labels: Mutex<HashMap<String, [String; 3]>>,
}

impl PredictorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram_vec!(
                "bioprint_prediction_latency_seconds",
                "Time spent validating, encoding and scoring one record",
                &["task"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "bioprint_predictions_total",
                "Predictions served, by decision source",
                &["task", "decision"]
            )
            .expect("Failed to register predictions_total"),

            validation_rejections_total: register_int_counter_vec!(
                "bioprint_validation_rejections_total",
                "Records rejected by input validation",
                &["task", "field"]
            )
            .expect("Failed to register validation_rejections_total"),

            prediction_errors_total: register_int_counter_vec!(
                "bioprint_prediction_errors_total",
                "Predictions that failed after validation",
                &["task"]
            )
            .expect("Failed to register prediction_errors_total"),

            model_reloads_total: register_int_counter_vec!(
                "bioprint_model_reloads_total",
                "Artifact reload attempts",
                &["task", "outcome"]
            )
            .expect("Failed to register model_reloads_total"),

            model_info: register_gauge_vec!(
                "bioprint_model_info",
                "Information about the currently loaded model per task",
                &["task", "model_type", "fingerprint", "created_at"]
            )
            .expect("Failed to register model_info"),

            model_info_labels: Mutex::new(HashMap::new()),
        }
    }
}

/// Lightweight handle to the global prediction metrics.
#[derive(Clone)]
pub struct PredictorMetrics {
    _private: (),
}

impl Default for PredictorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PredictorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PredictorMetricsInner {
        GLOBAL_METRICS.get_or_init(PredictorMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, task: &str, duration_secs: f64) {
        self.inner()
            .prediction_latency_seconds
            .with_label_values(&[task])
            .observe(duration_secs);
    }

    pub fn inc_predictions(&self, task: &str, decision: &str) {
        self.inner()
            .predictions_total
            .with_label_values(&[task, decision])
            .inc();
    }

    pub fn inc_validation_rejections(&self, task: &str, field: &str) {
        self.inner()
            .validation_rejections_total
            .with_label_values(&[task, field])
            .inc();
    }

    pub fn inc_prediction_errors(&self, task: &str) {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[task])
            .inc();
    }

    pub fn inc_reloads(&self, task: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.inner()
            .model_reloads_total
            .with_label_values(&[task, outcome])
            .inc();
    }

    /// Replace the exported model info series for `task`.
    pub fn set_model_info(&self, task: &str, model_type: &str, fingerprint: &str, created_at: &str) {
        let inner = self.inner();
        let mut labels = match inner.model_info_labels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some([old_type, old_fp, old_created]) = labels.get(task) {
            let _ = inner
                .model_info
                .remove_label_values(&[task, old_type.as_str(), old_fp.as_str(), old_created.as_str()]);
        }
        inner
            .model_info
            .with_label_values(&[task, model_type, fingerprint, created_at])
            .set(1.0);
        labels.insert(
            task.to_string(),
            [
                model_type.to_string(),
                fingerprint.to_string(),
                created_at.to_string(),
            ],
        );
    }

    /// Render the default registry in the Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for prediction and lifecycle events
///
/// Every record carries an `event` key so log pipelines can filter on it.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn log_prediction(&self, task: &str, decision: &str, outputs: &str, latency_ms: f64) {
        info!(
            event = "prediction_served",
            instance = %self.instance,
            task = %task,
            decision = %decision,
            outputs = %outputs,
            latency_ms = latency_ms,
            "Prediction served"
        );
    }

    pub fn log_rule_override(&self, task: &str, rule: &str) {
        info!(
            event = "rule_override_applied",
            instance = %self.instance,
            task = %task,
            rule = %rule,
            "Rule override short-circuited the model"
        );
    }

    pub fn log_rejection(&self, task: &str, field: &str, reason: &str) {
        info!(
            event = "prediction_rejected",
            instance = %self.instance,
            task = %task,
            field = %field,
            reason = %reason,
            "Input record rejected"
        );
    }

    pub fn log_model_loaded(&self, task: &str, path: &str, fingerprint: &str, checksum: &str) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            task = %task,
            path = %path,
            fingerprint = %fingerprint,
            checksum = %checksum,
            "Model artifact loaded"
        );
    }

    pub fn log_reload_failed(&self, task: &str, path: &str, error: &str) {
        warn!(
            event = "model_reload_failed",
            instance = %self.instance,
            task = %task,
            path = %path,
            error = %error,
            "Model reload failed, keeping current predictor"
        );
    }

    pub fn log_training_completed(&self, task: &str, rows: usize, summary: &str, output: &str) {
        info!(
            event = "training_completed",
            instance = %self.instance,
            task = %task,
            rows = rows,
            summary = %summary,
            output = %output,
            "Training completed"
        );
    }

    pub fn log_startup(&self, version: &str, port: u16) {
        info!(
            event = "server_started",
            instance = %self.instance,
            version = %version,
            port = port,
            "Prediction server started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Prediction server shutting down"
        );
    }
}
