//! # Soil Math
//!
//! Numerical building blocks for soil telemetry processing.
//! This crate provides the signal filters, gap-filling helpers, scalers and
//! least-squares solvers used by the moisture forecasting pipeline.

use thiserror::Error;

pub mod fill;
pub mod filters;
pub mod regression;
pub mod scaling;

/// Errors that can occur in numerical calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numerical operations
pub type Result<T> = std::result::Result<T, MathError>;
