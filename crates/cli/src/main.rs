//! Bioprint predictor CLI
//!
//! Trains and inspects model artifacts, runs local predictions and talks to
//! a running prediction server.

mod client;
mod commands;
mod commentary;
mod config;
mod input;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{inspect, predict, remote, schema, train};
use model_lib::{ForestParams, Task, TrainingConfig};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Bioprint predictor CLI
#[derive(Parser)]
#[command(name = "bioprint")]
#[command(author, version, about = "CLI for the bioprint printability and degradation predictor", long_about = None)]
pub struct Cli {
    /// Prediction server URL (can also be set via BIOPRINT_API_URL env var)
    #[arg(long, env = "BIOPRINT_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, value_enum)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model from a CSV dataset and write the artifact
    Train {
        /// Task to train (printability, degradation)
        #[arg(long, short)]
        task: Task,

        /// CSV dataset path
        #[arg(long, short)]
        data: PathBuf,

        /// Artifact output path
        #[arg(long, short)]
        output: PathBuf,

        /// Model family
        #[arg(long, default_value = "random_forest")]
        model_type: String,

        /// Number of trees
        #[arg(long, default_value_t = 100)]
        n_estimators: usize,

        /// Maximum tree depth (unbounded if not specified)
        #[arg(long)]
        max_depth: Option<usize>,

        /// Share of rows held out for evaluation
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,

        /// Seed for the split and the forest
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Predict one record with a local model artifact
    Predict {
        /// Task to predict (printability, degradation)
        #[arg(long, short)]
        task: Task,

        /// Model artifact path
        #[arg(long, short)]
        model: PathBuf,

        /// JSON file with feature values ("-" reads stdin)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Feature value as KEY=VALUE (repeatable)
        #[arg(long = "set", short = 's', value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Show metadata, fitted statistics and evaluation of an artifact
    Inspect {
        /// Model artifact path
        path: PathBuf,
    },

    /// Show the input and output schema of a task
    Schema {
        /// Task to show (all tasks if not specified)
        task: Option<Task>,
    },

    /// Talk to a running prediction server
    #[command(subcommand)]
    Remote(RemoteCommands),
}

#[derive(Subcommand)]
pub enum RemoteCommands {
    /// Predict one record on the server
    Predict {
        /// Task to predict (printability, degradation)
        #[arg(long, short)]
        task: Task,

        /// JSON file with feature values ("-" reads stdin)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Feature value as KEY=VALUE (repeatable)
        #[arg(long = "set", short = 's', value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// List the models the server is serving
    Models,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let format = config.format(cli.format)?;
    debug!(?format, api_url = ?config.api_url, "Loaded CLI configuration");

    match cli.command {
        Commands::Train {
            task,
            data,
            output,
            model_type,
            n_estimators,
            max_depth,
            test_fraction,
            seed,
        } => {
            let training = TrainingConfig {
                model_type,
                forest: ForestParams {
                    n_estimators,
                    max_depth,
                    random_state: seed,
                },
                test_fraction,
                split_seed: seed,
            };
            train::run(task, &data, &output, &training, format)?;
        }
        Commands::Predict {
            task,
            model,
            input,
            set,
        } => {
            predict::run(task, &model, input.as_deref(), &set, format)?;
        }
        Commands::Inspect { path } => {
            inspect::run(&path, format)?;
        }
        Commands::Schema { task } => {
            schema::run(task, format)?;
        }
        Commands::Remote(remote_cmd) => {
            let client = client::ApiClient::new(&config.api_url(cli.api_url))?;
            match remote_cmd {
                RemoteCommands::Predict { task, input, set } => {
                    remote::predict(&client, task, input.as_deref(), &set, format).await?;
                }
                RemoteCommands::Models => {
                    remote::models(&client, format).await?;
                }
            }
        }
    }

    Ok(())
}
