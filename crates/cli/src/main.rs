//! `lob-forecast`: train, evaluate and run the order-book return forecaster.
//!
//! Subcommands:
//!   - `fit`      Train on a folder and save the model
//!   - `evaluate` 60/20/20 unshuffled evaluation of a folder
//!   - `forecast` Predict a data file with the saved model

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use forecast_cli::logging::init_tracing;
use forecast_cli::pipeline;
use forecast_core::Config;

#[derive(Parser)]
#[command(
    name = "lob-forecast",
    version,
    about = "Forecast short-horizon BTC/USD returns from order-book snapshots",
    propagate_version = true
)]
struct Cli {
    /// Path to the TOML configuration
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Emit JSON logs instead of human-readable lines
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on every row of a folder and save the model
    Fit {
        /// Folder holding the data and result files
        #[arg(long)]
        folder: PathBuf,
    },
    /// Train on 60% of a folder and report R² on train/validation/test
    Evaluate {
        /// Folder holding the data and result files
        #[arg(long)]
        folder: PathBuf,
    },
    /// Predict a data file with the saved model
    Forecast {
        /// Order-book/trade data file
        #[arg(long)]
        data: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs).context("install tracing subscriber")?;

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("load config {}", cli.config.display()))?;

    match cli.command {
        Commands::Fit { folder } => {
            pipeline::train(&config, &folder)
                .with_context(|| format!("fit on {}", folder.display()))?;
            info!(model = %config.model_path.display(), "training finished");
        }
        Commands::Evaluate { folder } => {
            let report = pipeline::evaluate(&config, &folder)
                .with_context(|| format!("evaluate {}", folder.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Forecast { data } => {
            let predictions = pipeline::forecast(&config, &data)
                .with_context(|| format!("forecast {}", data.display()))?;
            info!(
                rows = predictions.len(),
                output = %config.forecast_result_path.display(),
                "forecast finished"
            );
        }
    }
    Ok(())
}
