//! Serving boundary for the bioprint predictors
//!
//! Wraps one hot-swappable predictor per task behind an HTTP API with
//! health, readiness and Prometheus endpoints.

pub mod api;
pub mod config;

pub use api::{create_router, serve, AppState};
pub use config::ServerConfig;
