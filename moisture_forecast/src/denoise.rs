//! Denoising of raw moisture readings
//!
//! Three smoothing methods are available: a centred moving average, a
//! centred rolling median and Savitzky-Golay polynomial smoothing. The
//! polynomial filter needs a complete series; when the series is too short or
//! has gaps it degrades to a moving average over the same window and the
//! smoothed series records the substitution.

use crate::data::AlignedObservations;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use soil_math::filters::{centred_rolling_mean, centred_rolling_median, savitzky_golay};
use std::fmt;
use tracing::{debug, warn};

/// Smallest accepted smoothing window
pub const MIN_WINDOW: usize = 3;

/// Smoothing method with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SmoothingMethod {
    /// Centred rolling mean
    MovingAverage { window: usize },
    /// Centred rolling median
    Median { window: usize },
    /// Local polynomial of degree `order` evaluated at the window centre
    SavitzkyGolay { window: usize, order: usize },
}

impl Default for SmoothingMethod {
    fn default() -> Self {
        SmoothingMethod::SavitzkyGolay { window: 5, order: 2 }
    }
}

impl SmoothingMethod {
    /// Window length of the method
    pub fn window(&self) -> usize {
        match *self {
            SmoothingMethod::MovingAverage { window }
            | SmoothingMethod::Median { window }
            | SmoothingMethod::SavitzkyGolay { window, .. } => window,
        }
    }

    /// Check the window and order parameters
    pub fn validate(&self) -> Result<()> {
        let window = self.window();
        if window < MIN_WINDOW {
            return Err(ForecastError::ConfigError(format!(
                "Smoothing window must be at least {}, got {}",
                MIN_WINDOW, window
            )));
        }

        if let SmoothingMethod::SavitzkyGolay { window, order } = *self {
            if window % 2 == 0 {
                return Err(ForecastError::ConfigError(format!(
                    "Savitzky-Golay window must be odd, got {}",
                    window
                )));
            }
            if window <= order {
                return Err(ForecastError::ConfigError(format!(
                    "Savitzky-Golay window ({}) must exceed the polynomial order ({})",
                    window, order
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for SmoothingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmoothingMethod::MovingAverage { window } => write!(f, "moving average (window {})", window),
            SmoothingMethod::Median { window } => write!(f, "median filter (window {})", window),
            SmoothingMethod::SavitzkyGolay { window, order } => {
                write!(f, "Savitzky-Golay (window {}, order {})", window, order)
            }
        }
    }
}

/// Denoised moisture on the same rows as the aligned observations
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedSeries {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<Option<f64>>,
    requested: SmoothingMethod,
    applied: SmoothingMethod,
}

impl SmoothedSeries {
    /// Row timestamps
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Smoothed values; `None` only where a whole window had no reading
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Method asked for
    pub fn requested_method(&self) -> SmoothingMethod {
        self.requested
    }

    /// Method actually used
    pub fn applied_method(&self) -> SmoothingMethod {
        self.applied
    }

    /// Whether the requested method had to be replaced
    pub fn is_degraded(&self) -> bool {
        self.requested != self.applied
    }
}

/// Smooth the moisture column of aligned observations
pub fn smooth(aligned: &AlignedObservations, method: SmoothingMethod) -> Result<SmoothedSeries> {
    let (values, applied) = smooth_values(aligned.moisture(), method)?;

    debug!(rows = values.len(), method = %applied, "Smoothed moisture series");

    Ok(SmoothedSeries {
        timestamps: aligned.timestamps().to_vec(),
        values,
        requested: method,
        applied,
    })
}

/// Smooth a series with missing samples; returns the values and the method used
pub fn smooth_values(
    values: &[Option<f64>],
    method: SmoothingMethod,
) -> Result<(Vec<Option<f64>>, SmoothingMethod)> {
    method.validate()?;

    match method {
        SmoothingMethod::MovingAverage { window } => Ok((centred_rolling_mean(values, window)?, method)),
        SmoothingMethod::Median { window } => Ok((centred_rolling_median(values, window)?, method)),
        SmoothingMethod::SavitzkyGolay { window, order } => {
            let complete: Option<Vec<f64>> = values.iter().copied().collect();

            match complete {
                Some(series) if series.len() >= window && series.iter().all(|v| v.is_finite()) => {
                    let smoothed = savitzky_golay(&series, window, order)?;
                    Ok((smoothed.into_iter().map(Some).collect(), method))
                }
                _ => {
                    let fallback = SmoothingMethod::MovingAverage { window };
                    warn!(
                        rows = values.len(),
                        window,
                        "Savitzky-Golay needs a complete series of at least the window length, using {}",
                        fallback
                    );
                    Ok((centred_rolling_mean(values, window)?, fallback))
                }
            }
        }
    }
}
