//! Bioprint server - serves printability and degradation predictions
//!
//! Loads the configured model artifacts, exposes the prediction API and
//! keeps serving through reloads until interrupted.

use anyhow::Result;
use bioprint_server::{api, AppState, ServerConfig};
use model_lib::{
    health::{components, HealthRegistry},
    observability::{PredictorMetrics, StructuredLogger},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting bioprint-server");

    let config = ServerConfig::load()?;
    info!(
        instance = %config.instance_name,
        port = config.port,
        "Server configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::HTTP).await;

    let metrics = PredictorMetrics::new();
    let logger = StructuredLogger::new(&config.instance_name);

    let app_state = Arc::new(AppState::from_config(
        &config,
        health_registry.clone(),
        metrics,
        logger.clone(),
    ));

    app_state.load_configured_models().await;
    if config.printability_artifact.is_none() && config.degradation_artifact.is_none() {
        warn!("No model artifacts configured; predictions will return 503");
    }

    health_registry.set_initialized(true).await;
    logger.log_startup(SERVER_VERSION, config.port);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };
    api::serve(config.port, app_state, shutdown).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
