//! Error types for the moisture_forecast crate

use polars::prelude::PolarsError;
use soil_math::MathError;
use thiserror::Error;

/// Custom error types for the moisture_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Input data failed validation (missing column, bad timestamp, duplicates)
    #[error("Data error: {0}")]
    DataError(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The series is too short for the requested window, horizon or sequence length
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A chronological split left one side empty
    #[error("Degenerate split: {0}")]
    DegenerateSplit(String),

    /// Training diverged or produced unusable values
    #[error("Training error: {0}")]
    TrainingError(String),

    /// Feature columns at inference differ from the ones used in training
    #[error("Feature columns mismatch: expected {expected}, got {actual}")]
    ColumnMismatch { expected: String, actual: String },

    /// Error loading or parsing configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from numerical kernels
    #[error("Math error: {0}")]
    MathError(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error writing CSV artifacts
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error (de)serialising models and records
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::ConfigError(err.to_string())
    }
}
