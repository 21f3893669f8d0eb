//! HTTP API for predictions, model lifecycle, health checks and Prometheus metrics

use crate::config::ServerConfig;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use model_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    observability::{PredictorMetrics, StructuredLogger},
    Decision, ModelError, ModelInfo, OutputRecord, Predictor, PredictorHandle, Reloaded, Task,
    ValidationError, Validator,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Shared application state
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: PredictorMetrics,
    pub logger: StructuredLogger,
    printability: Arc<PredictorHandle>,
    degradation: Arc<PredictorHandle>,
    artifacts: BTreeMap<Task, PathBuf>,
}

/// Why a reload did not install a new predictor.
#[derive(Debug)]
pub enum ReloadError {
    NotConfigured,
    Rejected(String),
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: PredictorMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            logger,
            printability: Arc::new(PredictorHandle::new(Task::Printability)),
            degradation: Arc::new(PredictorHandle::new(Task::Degradation)),
            artifacts: BTreeMap::new(),
        }
    }

    pub fn from_config(
        config: &ServerConfig,
        health_registry: HealthRegistry,
        metrics: PredictorMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Task::ALL.iter().fold(
            Self::new(health_registry, metrics, logger),
            |state, &task| match config.artifact_for(task) {
                Some(path) => state.with_artifact(task, path.clone()),
                None => state,
            },
        )
    }

    /// Serve `task` from the artifact at `path`.
    pub fn with_artifact(mut self, task: Task, path: impl Into<PathBuf>) -> Self {
        self.artifacts.insert(task, path.into());
        self
    }

    pub fn handle(&self, task: Task) -> &Arc<PredictorHandle> {
        match task {
            Task::Printability => &self.printability,
            Task::Degradation => &self.degradation,
        }
    }

    pub fn artifact(&self, task: Task) -> Option<&PathBuf> {
        self.artifacts.get(&task)
    }

    /// Require and load every configured model. Failures are logged and
    /// leave that model unhealthy.
    pub async fn load_configured_models(&self) {
        let configured: Vec<Task> = self.artifacts.keys().copied().collect();
        for task in configured {
            self.health_registry.require_model(task).await;
            // Outcome is already recorded in health, metrics and logs.
            let _ = self.reload_model(task).await;
        }
    }

    /// Load the configured artifact for `task` off the async runtime and
    /// swap it in. The serving predictor is untouched on failure.
    pub async fn reload_model(&self, task: Task) -> Result<Reloaded, ReloadError> {
        let Some(path) = self.artifacts.get(&task).cloned() else {
            return Err(ReloadError::NotConfigured);
        };

        let handle = Arc::clone(self.handle(task));
        let reload_path = path.clone();
        let outcome = tokio::task::spawn_blocking(move || handle.reload(&reload_path)).await;

        match outcome {
            Ok(Ok(reloaded)) => {
                self.metrics.inc_reloads(task.as_str(), true);
                if let Some(info) = reloaded.predictor.info() {
                    self.publish_model_info(task, info);
                    self.logger.log_model_loaded(
                        task.as_str(),
                        &path.display().to_string(),
                        &info.schema_fingerprint,
                        &reloaded.checksum,
                    );
                }
                self.health_registry
                    .set_healthy(&components::model(task))
                    .await;
                Ok(reloaded)
            }
            Ok(Err(e)) => Err(self.reload_failed(task, &path, e.to_string()).await),
            Err(e) => Err(self.reload_failed(task, &path, e.to_string()).await),
        }
    }

    async fn reload_failed(&self, task: Task, path: &std::path::Path, error: String) -> ReloadError {
        self.metrics.inc_reloads(task.as_str(), false);
        self.logger
            .log_reload_failed(task.as_str(), &path.display().to_string(), &error);

        let component = components::model(task);
        let message = format!("reload failed: {}", error);
        if self.handle(task).is_loaded() {
            self.health_registry.set_degraded(&component, message).await;
        } else {
            self.health_registry.set_unhealthy(&component, message).await;
        }
        ReloadError::Rejected(error)
    }

    /// Reinstate the previously served predictor for `task`.
    pub async fn rollback_model(&self, task: Task) -> Option<Arc<Predictor>> {
        let predictor = self.handle(task).rollback()?;
        if let Some(info) = predictor.info() {
            self.publish_model_info(task, info);
        }
        self.health_registry
            .set_healthy(&components::model(task))
            .await;
        Some(predictor)
    }

    fn publish_model_info(&self, task: Task, info: &ModelInfo) {
        self.metrics.set_model_info(
            task.as_str(),
            &info.model_type,
            &info.schema_fingerprint,
            &info.created_at,
        );
    }
}

/// Features arrive as a plain JSON object so a value of the wrong JSON
/// type is reported against its field instead of failing the whole body.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub features: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub task: Task,
    pub outputs: OutputRecord,
    pub decision: Decision,
    pub model: Option<ModelInfo>,
}

#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub task: Task,
    pub loaded: bool,
    pub can_rollback: bool,
    pub artifact: Option<String>,
    pub model: Option<ModelInfo>,
}

fn error_response(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

fn unknown_task(name: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        json!({ "error": "unknown task", "task": name }),
    )
}

fn decision_label(decision: &Decision) -> &'static str {
    match decision {
        Decision::Model => "model",
        Decision::RuleOverride { .. } => "rule_override",
    }
}

fn reject(state: &AppState, task: Task, e: ValidationError) -> Response {
    let message = e.issue.to_string();
    state
        .metrics
        .inc_validation_rejections(task.as_str(), &e.field);
    state
        .logger
        .log_rejection(task.as_str(), &e.field, &message);
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        json!({ "error": "validation", "field": e.field, "message": message }),
    )
}

/// Score one record for a task
async fn predict(
    State(state): State<Arc<AppState>>,
    Path(task_name): Path<String>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    let Ok(task) = task_name.parse::<Task>() else {
        return unknown_task(&task_name);
    };
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                json!({ "error": "invalid request", "message": rejection.body_text() }),
            );
        }
    };
    let Some(predictor) = state.handle(task).current() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": "model not loaded", "task": task }),
        );
    };

    let record = match Validator::new(predictor.schema()).record_from_json(&request.features) {
        Ok(record) => record,
        Err(e) => return reject(&state, task, e),
    };

    let start = Instant::now();
    match predictor.predict(&record) {
        Ok(prediction) => {
            let elapsed = start.elapsed();
            let decision = decision_label(&prediction.decision);
            state
                .metrics
                .observe_prediction_latency(task.as_str(), elapsed.as_secs_f64());
            state.metrics.inc_predictions(task.as_str(), decision);
            if let Decision::RuleOverride { rule } = &prediction.decision {
                state.logger.log_rule_override(task.as_str(), rule);
            }
            let outputs = serde_json::to_string(&prediction.outputs).unwrap_or_default();
            state.logger.log_prediction(
                task.as_str(),
                decision,
                &outputs,
                elapsed.as_secs_f64() * 1000.0,
            );

            Json(PredictResponse {
                task,
                outputs: prediction.outputs,
                decision: prediction.decision,
                model: predictor.info().cloned(),
            })
            .into_response()
        }
        Err(ModelError::Validation(e)) => reject(&state, task, e),
        Err(e) => {
            state.metrics.inc_prediction_errors(task.as_str());
            error!(task = %task, error = %e, "Prediction failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "prediction failed" }),
            )
        }
    }
}

/// Loaded model summaries
async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let models: Vec<ModelSummary> = Task::ALL
        .iter()
        .map(|&task| {
            let handle = state.handle(task);
            let current = handle.current();
            ModelSummary {
                task,
                loaded: current.is_some(),
                can_rollback: handle.has_previous(),
                artifact: state.artifact(task).map(|p| p.display().to_string()),
                model: current.and_then(|p| p.info().cloned()),
            }
        })
        .collect();

    Json(json!({ "models": models }))
}

async fn reload_model(
    State(state): State<Arc<AppState>>,
    Path(task_name): Path<String>,
) -> Response {
    let Ok(task) = task_name.parse::<Task>() else {
        return unknown_task(&task_name);
    };

    match state.reload_model(task).await {
        Ok(reloaded) => Json(json!({
            "task": task,
            "status": "reloaded",
            "checksum": reloaded.checksum,
            "model": reloaded.predictor.info(),
        }))
        .into_response(),
        Err(ReloadError::NotConfigured) => error_response(
            StatusCode::CONFLICT,
            json!({ "error": "no artifact configured", "task": task }),
        ),
        Err(ReloadError::Rejected(message)) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": "reload rejected", "task": task, "message": message }),
        ),
    }
}

async fn rollback_model(
    State(state): State<Arc<AppState>>,
    Path(task_name): Path<String>,
) -> Response {
    let Ok(task) = task_name.parse::<Task>() else {
        return unknown_task(&task_name);
    };

    match state.rollback_model(task).await {
        Some(predictor) => {
            info!(task = %task, "Model rolled back via API");
            Json(json!({
                "task": task,
                "status": "rolled_back",
                "model": predictor.info(),
            }))
            .into_response()
        }
        None => error_response(
            StatusCode::CONFLICT,
            json!({ "error": "no previous model", "task": task }),
        ),
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still serving
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        state.metrics.render(),
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/predict/:task", post(predict))
        .route("/v1/models", get(list_models))
        .route("/v1/models/:task/reload", post(reload_model))
        .route("/v1/models/:task/rollback", post(rollback_model))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
