//! Server configuration

use anyhow::{Context, Result};
use model_lib::Task;
use serde::Deserialize;
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP port for predictions, health and metrics
    #[serde(default = "default_port")]
    pub port: u16,

    /// Instance name stamped on structured log records
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Artifact served for the printability task
    #[serde(default)]
    pub printability_artifact: Option<PathBuf>,

    /// Artifact served for the degradation task
    #[serde(default)]
    pub degradation_artifact: Option<PathBuf>,
}

fn default_port() -> u16 {
    8080
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "bioprint-server".to_string())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            instance_name: default_instance_name(),
            printability_artifact: None,
            degradation_artifact: None,
        }
    }
}

impl ServerConfig {
    /// Load from an optional `bioprint.toml` and then `BIOPRINT_*` variables.
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("bioprint").required(false))
            .add_source(config::Environment::with_prefix("BIOPRINT"));
        Self::from_builder(builder)
    }

    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config = builder.build().context("Failed to read configuration")?;
        config
            .try_deserialize()
            .context("Invalid server configuration")
    }

    /// Configured artifact path for `task`, if any.
    pub fn artifact_for(&self, task: Task) -> Option<&PathBuf> {
        match task {
            Task::Printability => self.printability_artifact.as_ref(),
            Task::Degradation => self.degradation_artifact.as_ref(),
        }
    }
}
