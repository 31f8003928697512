//! Pipeline configuration loaded from TOML

use crate::denoise::SmoothingMethod;
use crate::error::{ForecastError, Result};
use crate::features::{FeatureColumn, FeatureConfig, FeatureSet, FeatureTable};
use crate::forecast::DEFAULT_THRESHOLD;
use crate::models::linear::DEFAULT_RIDGE;
use crate::models::sequence::SequenceConfig;
use crate::utils::{hours, samples_for_duration};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Largest accepted difference between a configured and a detected sampling interval
const INTERVAL_TOLERANCE_MS: i64 = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Expected sampling interval; checked against the detected one when set
    #[serde(default)]
    pub sampling_interval_minutes: Option<f64>,
    #[serde(default)]
    pub smoothing: SmoothingMethod,
    #[serde(default)]
    pub features: FeatureConfig,
    /// Model inputs; defaults to smoothed moisture, covariates, hour and the short mean
    #[serde(default)]
    pub feature_set: Option<Vec<FeatureColumn>>,
    /// How far ahead each example's target lies
    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: f64,
    /// Length of the autoregressive forecast
    #[serde(default = "default_forecast_hours")]
    pub forecast_hours: f64,
    /// Share of examples held out for testing
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Ridge term of the linear baseline
    #[serde(default = "default_ridge")]
    pub ridge: f64,
    #[serde(default)]
    pub sequence: SequenceConfig,
    /// Moisture level below which watering is needed
    #[serde(default = "default_threshold")]
    pub watering_threshold: f64,
}

fn default_horizon_hours() -> f64 {
    12.0
}

fn default_forecast_hours() -> f64 {
    24.0
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_ridge() -> f64 {
    DEFAULT_RIDGE
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampling_interval_minutes: None,
            smoothing: SmoothingMethod::default(),
            features: FeatureConfig::default(),
            feature_set: None,
            horizon_hours: default_horizon_hours(),
            forecast_hours: default_forecast_hours(),
            test_fraction: default_test_fraction(),
            ridge: default_ridge(),
            sequence: SequenceConfig::default(),
            watering_threshold: default_threshold(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ForecastError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "Loaded pipeline configuration");
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ForecastError::ConfigError(e.to_string()))
    }

    /// Check value ranges that do not depend on the data
    pub fn validate(&self) -> Result<()> {
        self.smoothing.validate()?;
        self.sequence.validate()?;

        for (name, value) in [
            ("horizon_hours", self.horizon_hours),
            ("forecast_hours", self.forecast_hours),
            ("features.short_window_hours", self.features.short_window_hours),
            ("features.long_window_hours", self.features.long_window_hours),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ForecastError::ConfigError(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if let Some(minutes) = self.sampling_interval_minutes {
            if !minutes.is_finite() || minutes <= 0.0 {
                return Err(ForecastError::ConfigError(format!(
                    "sampling_interval_minutes must be positive, got {}",
                    minutes
                )));
            }
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ForecastError::ConfigError(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if !self.ridge.is_finite() || self.ridge < 0.0 {
            return Err(ForecastError::ConfigError(format!(
                "ridge must be non-negative, got {}",
                self.ridge
            )));
        }
        if !self.watering_threshold.is_finite() {
            return Err(ForecastError::ConfigError(format!(
                "watering_threshold must be finite, got {}",
                self.watering_threshold
            )));
        }
        if let Some(columns) = &self.feature_set {
            FeatureSet::new(columns.clone())?;
        }
        Ok(())
    }

    /// The interval to work with, given the one detected in the data
    pub fn resolve_interval(&self, detected: Duration) -> Result<Duration> {
        let Some(minutes) = self.sampling_interval_minutes else {
            return Ok(detected);
        };

        let configured = Duration::milliseconds((minutes * 60_000.0).round() as i64);
        let difference = (configured - detected).num_milliseconds().abs();
        if difference > INTERVAL_TOLERANCE_MS {
            return Err(ForecastError::ConfigError(format!(
                "Configured sampling interval of {} minutes does not match the detected {} seconds",
                minutes,
                detected.num_seconds()
            )));
        }
        Ok(configured)
    }

    /// Horizon in sample steps at the given interval
    pub fn horizon_steps(&self, interval: Duration) -> Result<usize> {
        samples_for_duration(hours(self.horizon_hours)?, interval)
    }

    /// Forecast length in sample steps at the given interval
    pub fn forecast_steps(&self, interval: Duration) -> Result<usize> {
        samples_for_duration(hours(self.forecast_hours)?, interval)
    }

    /// Feature set for a table: the configured one, or the default
    pub fn resolve_feature_set(&self, table: &FeatureTable) -> Result<FeatureSet> {
        match &self.feature_set {
            Some(columns) => {
                let set = FeatureSet::new(columns.clone())?;
                if let Some(missing) = set.columns().iter().find(|&&c| !table.has_column(c)) {
                    return Err(ForecastError::ConfigError(format!(
                        "Feature '{}' is not available in this data",
                        missing
                    )));
                }
                Ok(set)
            }
            None => Ok(FeatureSet::default_for(table)),
        }
    }
}
