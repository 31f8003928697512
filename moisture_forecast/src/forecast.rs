//! Autoregressive multi-step forecasting and the watering decision

use crate::error::{ForecastError, Result};
use crate::features::{FeatureColumn, FeatureWindow};
use crate::models::{prepare_window, WindowPredictor};
use crate::utils::future_timestamps;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Default moisture level below which watering is needed
pub const DEFAULT_THRESHOLD: f64 = 30.0;

/// A predicted moisture value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub predicted_moisture: f64,
}

/// Whether the forecast drops below the threshold, and when it is lowest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WateringDecision {
    pub needs_watering: bool,
    /// Timestamp of the forecast minimum, set only when watering is needed
    pub trigger_time: Option<DateTime<Utc>>,
    pub minimum_value: f64,
    pub threshold: f64,
}

/// Forecast values with the derived decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub model: String,
    pub points: Vec<ForecastPoint>,
    pub decision: WateringDecision,
}

/// Forecast `steps` values by feeding each prediction back into the window.
///
/// Every synthetic row copies the newest row, replaces smoothed moisture with
/// the prediction and recomputes the calendar columns for its timestamp.
/// Covariates and rolling statistics keep their last observed values.
pub fn forecast<P: WindowPredictor + ?Sized>(
    model: &P,
    window: &FeatureWindow,
    steps: usize,
    interval: Duration,
    threshold: f64,
) -> Result<Forecast> {
    if steps == 0 {
        return Err(ForecastError::InvalidParameter(
            "Forecast must cover at least one step".to_string(),
        ));
    }
    if !threshold.is_finite() {
        return Err(ForecastError::InvalidParameter(format!(
            "Threshold must be finite, got {}",
            threshold
        )));
    }

    let mut current = prepare_window(model, window)?;
    let moisture = current
        .features()
        .position(FeatureColumn::Moisture)
        .ok_or_else(|| ForecastError::ColumnMismatch {
            expected: FeatureColumn::Moisture.to_string(),
            actual: current.features().to_string(),
        })?;
    let columns = current.features().columns().to_vec();
    let timestamps = future_timestamps(current.last_timestamp(), steps, interval)?;

    let mut points = Vec::with_capacity(steps);
    for timestamp in timestamps {
        let value = model.predict_window(&current)?;
        if !value.is_finite() {
            return Err(ForecastError::ValidationError(format!(
                "{} produced a non-finite forecast at {}",
                model.name(),
                timestamp
            )));
        }
        points.push(ForecastPoint {
            timestamp,
            predicted_moisture: value,
        });

        let mut row = current.last_row().to_vec();
        row[moisture] = value;
        for (cell, column) in row.iter_mut().zip(&columns) {
            if let Some(calendar) = column.calendar_value(timestamp) {
                *cell = calendar;
            }
        }
        current.roll(timestamp, row)?;
    }

    let decision = decide(&points, threshold)?;
    info!(
        model = model.name(),
        steps,
        minimum = decision.minimum_value,
        needs_watering = decision.needs_watering,
        "Forecast complete"
    );

    Ok(Forecast {
        model: model.name().to_string(),
        points,
        decision,
    })
}

/// Derive the watering decision from forecast points
pub fn decide(points: &[ForecastPoint], threshold: f64) -> Result<WateringDecision> {
    let lowest = points
        .iter()
        .fold(None, |lowest: Option<&ForecastPoint>, point| match lowest {
            Some(l) if l.predicted_moisture <= point.predicted_moisture => Some(l),
            _ => Some(point),
        })
        .ok_or_else(|| ForecastError::InsufficientData("Forecast has no points".to_string()))?;

    let needs_watering = lowest.predicted_moisture < threshold;
    Ok(WateringDecision {
        needs_watering,
        trigger_time: needs_watering.then_some(lowest.timestamp),
        minimum_value: lowest.predicted_moisture,
        threshold,
    })
}

impl Forecast {
    /// Predicted values in time order
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.predicted_moisture).collect()
    }

    /// Forecast timestamps
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    /// Write `timestamp,predicted_moisture` rows
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for point in &self.points {
            writer.serialize(point)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for WateringDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.needs_watering, self.trigger_time) {
            (true, Some(time)) => write!(
                f,
                "Watering needed: moisture expected to reach {:.2} at {} (threshold {:.2})",
                self.minimum_value, time, self.threshold
            ),
            _ => write!(
                f,
                "No watering needed: forecast minimum {:.2} is not below threshold {:.2}",
                self.minimum_value, self.threshold
            ),
        }
    }
}

impl fmt::Display for Forecast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} forecast:", self.model)?;
        for point in &self.points {
            writeln!(f, "  {}  {:.2}", point.timestamp.format("%Y-%m-%d %H:%M"), point.predicted_moisture)?;
        }
        writeln!(f, "{}", self.decision)
    }
}
