//! cairns CLI binary.
//!
//! Downloads daily equity bars into a local store, exports them to Parquet and
//! builds feature tables from the exported snapshot.

mod config;
mod integration;
mod logging;

use cairns_features::ScalingMethod;
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use integration::download::{DownloadArgs, run_download};
use integration::features::{FeatureArgs, run_features};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "cairns")]
#[command(about = "cairns: daily equity data ingestion and feature pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: cairns.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch provider data into the store, or export it
    Download {
        /// 1: reference table, 2: full history, 3: one trading day, 4: export
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
        mode: u8,

        /// Trading day for mode 3 (YYYYMMDD, default today)
        #[arg(long)]
        date: Option<String>,

        /// Snapshot path for mode 4 (default <data_path>/stock_data.parquet)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Build a feature table from an exported snapshot
    Features {
        /// 1: technical features, 2: model schema, 3: windowed scaling
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
        method: u8,

        /// Input snapshot (default <data_path>/stock_data.parquet)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output file (default <data_path>/stock_data_v<method>.parquet)
        #[arg(long)]
        output: Option<PathBuf>,

        /// First day of the scaling fit window (YYYYMMDD)
        #[arg(long, requires = "fit_end")]
        fit_start: Option<i64>,

        /// Last day of the scaling fit window (YYYYMMDD)
        #[arg(long, requires = "fit_start")]
        fit_end: Option<i64>,

        /// Scaling estimator for method 3
        #[arg(long, value_enum, default_value_t = ScalingArg::Robust)]
        scaling: ScalingArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScalingArg {
    /// Median and interquartile range
    Robust,
    /// Mean and standard deviation
    Zscore,
}

impl From<ScalingArg> for ScalingMethod {
    fn from(arg: ScalingArg) -> Self {
        match arg {
            ScalingArg::Robust => Self::Robust,
            ScalingArg::Zscore => Self::ZScore,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    logging::init_logging(&config.logging)?;

    match cli.command {
        Commands::Download { mode, date, output } => {
            run_download(&config, DownloadArgs { mode, date, output }).await?;
        }
        Commands::Features {
            method,
            input,
            output,
            fit_start,
            fit_end,
            scaling,
        } => {
            let window = fit_start.zip(fit_end);
            if method == 3 && window.is_none() {
                return Err("method 3 needs --fit-start and --fit-end".into());
            }
            run_features(
                &config,
                FeatureArgs {
                    method,
                    input,
                    output,
                    window,
                    scaling: scaling.into(),
                },
            )?;
        }
    }

    Ok(())
}
