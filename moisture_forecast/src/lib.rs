//! # Moisture Forecast
//!
//! A Rust library for soil moisture forecasting and watering decisions.
//!
//! ## Features
//!
//! - Telemetry loading and alignment to a regular sampling grid
//! - Denoising (moving average, median filter, Savitzky-Golay)
//! - Feature engineering (calendar flags, rolling means, rates of change)
//! - Supervised examples and sequence windows at a horizon in sample steps
//! - Models (linear baseline, stacked LSTM) with chronological evaluation
//! - Autoregressive multi-step forecasts with a watering threshold
//!
//! ## Quick Start
//!
//! ```no_run
//! use moisture_forecast::config::PipelineConfig;
//! use moisture_forecast::data::DataLoader;
//! use moisture_forecast::pipeline::Pipeline;
//!
//! # fn main() -> moisture_forecast::error::Result<()> {
//! // Load data
//! let observations = DataLoader::from_csv("sensor_data.csv")?;
//!
//! // Train both models and forecast the next 24 hours
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let run = pipeline.run(&observations)?;
//!
//! println!("{}", run.linear_evaluation);
//! println!("{}", run.sequence_evaluation);
//! println!("{}", run.forecast.decision);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod data;
pub mod denoise;
pub mod error;
pub mod features;
pub mod forecast;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod simulate;
pub mod supervised;
pub mod utils;

// Re-export commonly used types
pub use crate::data::{DataLoader, Observation, ObservationSet};
pub use crate::error::ForecastError;
pub use crate::features::{FeatureColumn, FeatureSet};
pub use crate::forecast::{Forecast, WateringDecision};
pub use crate::models::{Regressor, WindowPredictor};
pub use crate::pipeline::Pipeline;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
