//! Feature engineering on aligned, smoothed telemetry
//!
//! A [`FeatureTable`] holds every derivable column for each aligned row, in
//! the fixed order of [`FeatureColumn::ALL`]. Models consume an ordered
//! [`FeatureSet`] drawn from it.

use crate::data::AlignedObservations;
use crate::denoise::SmoothedSeries;
use crate::error::{ForecastError, Result};
use crate::utils::{hours, samples_for_duration};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use soil_math::fill::fill_gaps;
use soil_math::filters::trailing_rolling_mean;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// First and last hour counted as daytime
const DAYTIME_HOURS: (u32, u32) = (6, 18);

/// A named feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    /// Moisture reading before smoothing
    #[serde(rename = "moisture_raw")]
    RawMoisture,
    /// Smoothed moisture
    #[serde(rename = "moisture_smooth")]
    Moisture,
    Temperature,
    Humidity,
    /// Hour of day, 0-23
    Hour,
    /// Monday = 0 through Sunday = 6
    DayOfWeek,
    /// 1 between 06:00 and 18:59, else 0
    IsDaytime,
    #[serde(rename = "moisture_short_mean")]
    RollingMeanShort,
    #[serde(rename = "moisture_long_mean")]
    RollingMeanLong,
    /// Change from the previous sample
    #[serde(rename = "moisture_change")]
    Change,
    /// Change from the previous sample in percent
    #[serde(rename = "moisture_change_pct")]
    ChangePct,
}

impl FeatureColumn {
    /// Every column in table order
    pub const ALL: [FeatureColumn; 11] = [
        FeatureColumn::RawMoisture,
        FeatureColumn::Moisture,
        FeatureColumn::Temperature,
        FeatureColumn::Humidity,
        FeatureColumn::Hour,
        FeatureColumn::DayOfWeek,
        FeatureColumn::IsDaytime,
        FeatureColumn::RollingMeanShort,
        FeatureColumn::RollingMeanLong,
        FeatureColumn::Change,
        FeatureColumn::ChangePct,
    ];

    /// Column name used in tables and configuration
    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::RawMoisture => "moisture_raw",
            FeatureColumn::Moisture => "moisture_smooth",
            FeatureColumn::Temperature => "temperature",
            FeatureColumn::Humidity => "humidity",
            FeatureColumn::Hour => "hour",
            FeatureColumn::DayOfWeek => "day_of_week",
            FeatureColumn::IsDaytime => "is_daytime",
            FeatureColumn::RollingMeanShort => "moisture_short_mean",
            FeatureColumn::RollingMeanLong => "moisture_long_mean",
            FeatureColumn::Change => "moisture_change",
            FeatureColumn::ChangePct => "moisture_change_pct",
        }
    }

    /// Whether the column is derived from the timestamp alone
    pub fn is_calendar(&self) -> bool {
        matches!(
            self,
            FeatureColumn::Hour | FeatureColumn::DayOfWeek | FeatureColumn::IsDaytime
        )
    }

    /// Value of a calendar column at `timestamp`; `None` for other columns
    pub fn calendar_value(&self, timestamp: DateTime<Utc>) -> Option<f64> {
        match self {
            FeatureColumn::Hour => Some(timestamp.hour() as f64),
            FeatureColumn::DayOfWeek => Some(timestamp.weekday().num_days_from_monday() as f64),
            FeatureColumn::IsDaytime => {
                let hour = timestamp.hour();
                let daytime = hour >= DAYTIME_HOURS.0 && hour <= DAYTIME_HOURS.1;
                Some(if daytime { 1.0 } else { 0.0 })
            }
            _ => None,
        }
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureColumn {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        FeatureColumn::ALL
            .into_iter()
            .find(|column| column.name() == s.trim())
            .ok_or_else(|| ForecastError::ConfigError(format!("Unknown feature column '{}'", s)))
    }
}

/// Rolling window spans for the derived moisture means
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Short trailing mean span in hours
    pub short_window_hours: f64,
    /// Long trailing mean span in hours
    pub long_window_hours: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            short_window_hours: 6.0,
            long_window_hours: 12.0,
        }
    }
}

impl FeatureConfig {
    /// Window lengths in samples at the given sampling interval
    pub fn window_samples(&self, interval: Duration) -> Result<(usize, usize)> {
        let short = samples_for_duration(hours(self.short_window_hours)?, interval)?;
        let long = samples_for_duration(hours(self.long_window_hours)?, interval)?;
        Ok((short, long))
    }
}

/// Engineered features for every aligned row, all gaps filled
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    interval: Duration,
    timestamps: Vec<DateTime<Utc>>,
    imputed: Vec<bool>,
    columns: Vec<(FeatureColumn, Vec<f64>)>,
}

/// Derive the feature table from aligned observations and their smoothed moisture.
///
/// Rolling means are trailing and cover at least one sample. After all
/// columns are computed each is backward-filled, then forward-filled.
pub fn build_features(
    aligned: &AlignedObservations,
    smoothed: &SmoothedSeries,
    config: &FeatureConfig,
) -> Result<FeatureTable> {
    if aligned.len() != smoothed.len() {
        return Err(ForecastError::ValidationError(format!(
            "Smoothed series has {} rows, observations have {}",
            smoothed.len(),
            aligned.len()
        )));
    }
    if aligned.is_empty() {
        return Err(ForecastError::InsufficientData(
            "No observations to derive features from".to_string(),
        ));
    }

    let (short, long) = config.window_samples(aligned.interval())?;
    let smooth = smoothed.values();
    let timestamps = aligned.timestamps();

    let mut raw_columns: Vec<(FeatureColumn, Vec<Option<f64>>)> = Vec::with_capacity(11);
    raw_columns.push((FeatureColumn::RawMoisture, aligned.moisture().to_vec()));
    raw_columns.push((FeatureColumn::Moisture, smooth.to_vec()));
    if let Some(temperature) = aligned.temperature() {
        raw_columns.push((FeatureColumn::Temperature, temperature.to_vec()));
    }
    if let Some(humidity) = aligned.humidity() {
        raw_columns.push((FeatureColumn::Humidity, humidity.to_vec()));
    }
    for column in [FeatureColumn::Hour, FeatureColumn::DayOfWeek, FeatureColumn::IsDaytime] {
        let values = timestamps.iter().map(|&t| column.calendar_value(t)).collect();
        raw_columns.push((column, values));
    }
    raw_columns.push((FeatureColumn::RollingMeanShort, trailing_rolling_mean(smooth, short)?));
    raw_columns.push((FeatureColumn::RollingMeanLong, trailing_rolling_mean(smooth, long)?));

    let mut change = vec![None; smooth.len()];
    let mut change_pct = vec![None; smooth.len()];
    for i in 1..smooth.len() {
        if let (Some(previous), Some(current)) = (smooth[i - 1], smooth[i]) {
            change[i] = Some(current - previous);
            if previous != 0.0 {
                change_pct[i] = Some((current - previous) / previous * 100.0);
            }
        }
    }
    raw_columns.push((FeatureColumn::Change, change));
    raw_columns.push((FeatureColumn::ChangePct, change_pct));

    let columns = raw_columns
        .into_iter()
        .map(|(column, values)| {
            fill_gaps(&values).map(|filled| (column, filled)).map_err(|_| {
                ForecastError::InsufficientData(format!("Column '{}' has no values to fill from", column))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        rows = aligned.len(),
        columns = columns.len(),
        short_window = short,
        long_window = long,
        "Built feature table"
    );

    Ok(FeatureTable {
        interval: aligned.interval(),
        timestamps: timestamps.to_vec(),
        imputed: aligned.imputed().to_vec(),
        columns,
    })
}

impl FeatureTable {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Sampling interval of the rows
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Row timestamps
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Which rows were inserted for missing sampling slots
    pub fn imputed(&self) -> &[bool] {
        &self.imputed
    }

    /// Present columns in table order
    pub fn column_names(&self) -> Vec<FeatureColumn> {
        self.columns.iter().map(|(column, _)| *column).collect()
    }

    /// Check if the table has a column
    pub fn has_column(&self, column: FeatureColumn) -> bool {
        self.columns.iter().any(|(c, _)| *c == column)
    }

    /// Values of one column
    pub fn column(&self, column: FeatureColumn) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, values)| values.as_slice())
    }

    /// One row restricted to the feature set, in feature-set order
    pub fn row(&self, index: usize, features: &FeatureSet) -> Result<Vec<f64>> {
        if index >= self.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Row {} out of range for a table of {} rows",
                index,
                self.len()
            )));
        }
        let columns = self.select(features)?;
        Ok(columns.iter().map(|values| values[index]).collect())
    }

    /// The last `length` rows restricted to the feature set
    pub fn window(&self, features: &FeatureSet, length: usize) -> Result<FeatureWindow> {
        if length == 0 || length > self.len() {
            return Err(ForecastError::InsufficientData(format!(
                "Cannot take a window of {} rows from a table of {} rows",
                length,
                self.len()
            )));
        }

        let columns = self.select(features)?;
        let start = self.len() - length;
        let rows = (start..self.len())
            .map(|i| columns.iter().map(|values| values[i]).collect())
            .collect();

        FeatureWindow::new(features.clone(), self.timestamps[start..].to_vec(), rows)
    }

    fn select(&self, features: &FeatureSet) -> Result<Vec<&[f64]>> {
        features
            .columns()
            .iter()
            .map(|&column| {
                self.column(column).ok_or_else(|| ForecastError::ColumnMismatch {
                    expected: features.to_string(),
                    actual: join_names(&self.column_names()),
                })
            })
            .collect()
    }

    /// Convert to a DataFrame with a timestamp column, an imputed flag and every feature
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let timestamps = Series::new(
            "timestamp",
            self.timestamps
                .iter()
                .map(|t| t.timestamp_millis())
                .collect::<Vec<i64>>(),
        )
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

        let mut series = vec![timestamps, Series::new("imputed", self.imputed.clone())];
        for (column, values) in &self.columns {
            series.push(Series::new(column.name(), values.as_slice()));
        }

        Ok(DataFrame::new(series)?)
    }

    /// Write the table as CSV with a header row
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path.as_ref())?;
        CsvWriter::new(&mut file).has_header(true).finish(&mut df)?;
        Ok(())
    }
}

fn join_names(columns: &[FeatureColumn]) -> String {
    columns
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ordered model inputs; always includes smoothed moisture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    columns: Vec<FeatureColumn>,
}

impl FeatureSet {
    /// Create a feature set; rejects empty sets, duplicates and sets without smoothed moisture
    pub fn new(columns: Vec<FeatureColumn>) -> Result<Self> {
        if !columns.contains(&FeatureColumn::Moisture) {
            return Err(ForecastError::ConfigError(format!(
                "Feature set must include '{}'",
                FeatureColumn::Moisture
            )));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                return Err(ForecastError::ConfigError(format!(
                    "Feature '{}' listed twice",
                    column
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Smoothed moisture, temperature, humidity, hour and the short rolling mean;
    /// covariates the table lacks are left out
    pub fn default_for(table: &FeatureTable) -> Self {
        let columns = [
            FeatureColumn::Moisture,
            FeatureColumn::Temperature,
            FeatureColumn::Humidity,
            FeatureColumn::Hour,
            FeatureColumn::RollingMeanShort,
        ]
        .into_iter()
        .filter(|&column| table.has_column(column))
        .collect();

        Self { columns }
    }

    /// Columns in model input order
    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false for a validated set
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column in the input vector
    pub fn position(&self, column: FeatureColumn) -> Option<usize> {
        self.columns.iter().position(|&c| c == column)
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_names(&self.columns))
    }
}

/// The most recent rows of a feature table, as fed to a predictor
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureWindow {
    features: FeatureSet,
    timestamps: Vec<DateTime<Utc>>,
    rows: Vec<Vec<f64>>,
}

impl FeatureWindow {
    /// Create a window; every row must match the feature set width
    pub fn new(features: FeatureSet, timestamps: Vec<DateTime<Utc>>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if rows.is_empty() {
            return Err(ForecastError::InsufficientData("Feature window is empty".to_string()));
        }
        if timestamps.len() != rows.len() {
            return Err(ForecastError::ValidationError(format!(
                "Window has {} timestamps for {} rows",
                timestamps.len(),
                rows.len()
            )));
        }
        if let Some(row) = rows.iter().find(|row| row.len() != features.len()) {
            return Err(ForecastError::ValidationError(format!(
                "Window row has {} values, feature set has {}",
                row.len(),
                features.len()
            )));
        }

        Ok(Self {
            features,
            timestamps,
            rows,
        })
    }

    /// Feature set of the rows
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Rows, oldest first
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Row timestamps, oldest first
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Always false for a constructed window
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Newest row
    pub fn last_row(&self) -> &[f64] {
        &self.rows[self.rows.len() - 1]
    }

    /// Timestamp of the newest row
    pub fn last_timestamp(&self) -> DateTime<Utc> {
        self.timestamps[self.timestamps.len() - 1]
    }

    /// The newest `length` rows as a new window
    pub fn tail(&self, length: usize) -> Result<FeatureWindow> {
        if length == 0 || length > self.len() {
            return Err(ForecastError::InsufficientData(format!(
                "Window of {} rows cannot provide {} rows",
                self.len(),
                length
            )));
        }
        let start = self.len() - length;
        FeatureWindow::new(
            self.features.clone(),
            self.timestamps[start..].to_vec(),
            self.rows[start..].to_vec(),
        )
    }

    /// Append a row and drop the oldest one
    pub fn roll(&mut self, timestamp: DateTime<Utc>, row: Vec<f64>) -> Result<()> {
        if row.len() != self.features.len() {
            return Err(ForecastError::ValidationError(format!(
                "Row has {} values, feature set has {}",
                row.len(),
                self.features.len()
            )));
        }
        self.rows.remove(0);
        self.timestamps.remove(0);
        self.rows.push(row);
        self.timestamps.push(timestamp);
        Ok(())
    }
}
