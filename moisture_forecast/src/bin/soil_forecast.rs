//! # soil-forecast
//!
//! Runs the moisture forecasting pipeline on a telemetry CSV (or simulated
//! data) and writes the feature table, forecasts, metrics, decision and
//! trained models to an output directory.

use clap::Parser;
use moisture_forecast::analysis::analyse;
use moisture_forecast::config::PipelineConfig;
use moisture_forecast::data::DataLoader;
use moisture_forecast::error::Result;
use moisture_forecast::pipeline::Pipeline;
use moisture_forecast::simulate::{simulate, write_observations_csv, SimulationConfig};
use moisture_forecast::utils::hours;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "soil-forecast")]
#[command(about = "Forecast soil moisture and decide whether to water", long_about = None)]
struct Cli {
    /// Telemetry CSV with timestamp, moisture and optional temperature/humidity columns
    #[arg(short, long, conflicts_with = "simulate", required_unless_present = "simulate")]
    input: Option<PathBuf>,

    /// Use simulated drying-soil data instead of an input file
    #[arg(long)]
    simulate: bool,

    /// Seed for the simulated data
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Pipeline configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the output artifacts
    #[arg(short, long, default_value = "forecast_output")]
    output_dir: PathBuf,

    /// Print a descriptive report of the input data
    #[arg(long)]
    report: bool,
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    let observations = match &cli.input {
        Some(path) => DataLoader::from_csv(path)?,
        None => {
            let simulated = simulate(&SimulationConfig {
                seed: cli.seed,
                ..SimulationConfig::default()
            })?;
            std::fs::create_dir_all(&cli.output_dir)?;
            write_observations_csv(&simulated, cli.output_dir.join("simulated_data.csv"))?;
            simulated
        }
    };

    let pipeline = Pipeline::new(config)?;

    if cli.report {
        let interval = observations.sampling_interval()?;
        let aligned = observations.align(interval)?;
        let drop_window = hours(pipeline.config().features.short_window_hours)?;
        println!("{}", analyse(&aligned, drop_window)?);
    }

    let run = pipeline.run(&observations)?;
    run.write_artifacts(&cli.output_dir)?;

    println!("{}", run.linear_evaluation);
    println!("{}", run.sequence_evaluation);
    println!("{}", run.forecast);
    info!(output_dir = %cli.output_dir.display(), "Done");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moisture_forecast=info,soil_forecast=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Pipeline failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
