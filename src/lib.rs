//! # Soil Sentinel
//!
//! Workspace crate re-exporting the soil telemetry libraries.
//!
//! - [`soil_math`]: rolling filters, Savitzky-Golay smoothing, gap filling,
//!   least squares and scalers
//! - [`moisture_forecast`]: data loading, features, models, evaluation and
//!   watering forecasts
//!
//! ## Example
//!
//! ```
//! use soil_sentinel_workspace::soil_math::filters::median;
//!
//! assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
//! ```

pub use moisture_forecast;
pub use soil_math;
