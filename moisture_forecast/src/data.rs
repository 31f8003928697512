//! Sensor observations: loading, validation and alignment to a sampling grid

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Naive timestamp layouts accepted besides RFC 3339; interpreted as UTC
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// A single sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Time of the reading
    pub timestamp: DateTime<Utc>,
    /// Soil moisture reading
    pub moisture: f64,
    /// Air temperature, when the sensor provides it
    pub temperature: Option<f64>,
    /// Relative humidity, when the sensor provides it
    pub humidity: Option<f64>,
}

impl Observation {
    /// Create a moisture-only observation
    pub fn new(timestamp: DateTime<Utc>, moisture: f64) -> Self {
        Self {
            timestamp,
            moisture,
            temperature: None,
            humidity: None,
        }
    }

    /// Attach temperature and humidity readings
    pub fn with_climate(mut self, temperature: f64, humidity: f64) -> Self {
        self.temperature = Some(temperature);
        self.humidity = Some(humidity);
        self
    }
}

/// Validated observations in ascending time order without duplicates
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSet {
    observations: Vec<Observation>,
}

/// Data loader for sensor telemetry tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load observations from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<ObservationSet> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        info!(path = %path.display(), rows = df.height(), "Loaded telemetry CSV");
        Self::from_dataframe(&df)
    }

    /// Build observations from an existing DataFrame.
    ///
    /// `timestamp` and `moisture` columns are required, `temperature` and
    /// `humidity` are optional. Column names are matched case-insensitively.
    pub fn from_dataframe(df: &DataFrame) -> Result<ObservationSet> {
        let time_column = Self::find_column(df, "timestamp").ok_or_else(|| {
            ForecastError::DataError("Missing required column 'timestamp'".to_string())
        })?;
        let moisture_column = Self::find_column(df, "moisture").ok_or_else(|| {
            ForecastError::DataError("Missing required column 'moisture'".to_string())
        })?;

        let timestamps = Self::timestamp_values(df.column(&time_column)?)?;
        let moisture = Self::numeric_values(df.column(&moisture_column)?)?;
        let temperature = match Self::find_column(df, "temperature") {
            Some(name) => Some(Self::numeric_values(df.column(&name)?)?),
            None => None,
        };
        let humidity = match Self::find_column(df, "humidity") {
            Some(name) => Some(Self::numeric_values(df.column(&name)?)?),
            None => None,
        };

        let mut observations = Vec::with_capacity(df.height());
        for (i, (timestamp, moisture)) in timestamps.into_iter().zip(moisture).enumerate() {
            let row = i + 1;
            let timestamp = timestamp.ok_or_else(|| {
                ForecastError::DataError(format!("Row {}: missing value in column 'timestamp'", row))
            })?;
            let moisture = moisture.ok_or_else(|| {
                ForecastError::DataError(format!("Row {}: missing value in column 'moisture'", row))
            })?;

            observations.push(Observation {
                timestamp,
                moisture,
                temperature: temperature.as_ref().and_then(|values| values[i]),
                humidity: humidity.as_ref().and_then(|values| values[i]),
            });
        }

        ObservationSet::new(observations)
    }

    /// Find a column by case-insensitive name
    fn find_column(df: &DataFrame, wanted: &str) -> Option<String> {
        df.get_column_names()
            .into_iter()
            .find(|name| name.trim().eq_ignore_ascii_case(wanted))
            .map(|name| name.to_string())
    }

    /// Read a numeric column as optional f64 values
    fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
        if !series.dtype().is_numeric() {
            return Err(ForecastError::DataError(format!(
                "Column '{}' must be numeric, found {}",
                series.name(),
                series.dtype()
            )));
        }

        let cast = series.cast(&DataType::Float64)?;
        let values = cast.f64()?.into_iter().collect();
        Ok(values)
    }

    /// Read a timestamp column from text or a temporal dtype
    fn timestamp_values(series: &Series) -> Result<Vec<Option<DateTime<Utc>>>> {
        match series.dtype() {
            DataType::Utf8 => series
                .utf8()?
                .into_iter()
                .enumerate()
                .map(|(i, value)| match value {
                    Some(text) => parse_timestamp(text).map(Some).ok_or_else(|| {
                        ForecastError::DataError(format!(
                            "Row {}: unparseable timestamp '{}' in column '{}'",
                            i + 1,
                            text,
                            series.name()
                        ))
                    }),
                    None => Ok(None),
                })
                .collect(),
            DataType::Datetime(unit, _) => {
                let nanos_per_unit = match unit {
                    TimeUnit::Nanoseconds => 1,
                    TimeUnit::Microseconds => 1_000,
                    TimeUnit::Milliseconds => 1_000_000,
                };
                series
                    .datetime()?
                    .into_iter()
                    .enumerate()
                    .map(|(i, value)| match value {
                        Some(raw) => from_epoch_nanos(raw as i128 * nanos_per_unit)
                            .map(Some)
                            .ok_or_else(|| {
                                ForecastError::DataError(format!(
                                    "Row {}: timestamp out of range in column '{}'",
                                    i + 1,
                                    series.name()
                                ))
                            }),
                        None => Ok(None),
                    })
                    .collect()
            }
            other => Err(ForecastError::DataError(format!(
                "Column '{}' has unsupported timestamp type {}",
                series.name(),
                other
            ))),
        }
    }
}

fn from_epoch_nanos(nanos: i128) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(nanos.div_euclid(1_000_000_000)).ok()?;
    let subsec = u32::try_from(nanos.rem_euclid(1_000_000_000)).ok()?;
    Utc.timestamp_opt(secs, subsec).single()
}

/// Parse a timestamp in RFC 3339 or one of the naive layouts (taken as UTC)
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl ObservationSet {
    /// Validate, sort and check observations for duplicates.
    ///
    /// Row numbers in error messages refer to the input order, starting at 1.
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        for (i, observation) in observations.iter().enumerate() {
            let row = i + 1;
            if !observation.moisture.is_finite() {
                return Err(ForecastError::DataError(format!(
                    "Row {}: moisture value {} is not finite",
                    row, observation.moisture
                )));
            }
            for (name, value) in [
                ("temperature", observation.temperature),
                ("humidity", observation.humidity),
            ] {
                if value.is_some_and(|v| !v.is_finite()) {
                    return Err(ForecastError::DataError(format!(
                        "Row {}: {} value is not finite",
                        row, name
                    )));
                }
            }
        }

        let mut indexed: Vec<(usize, Observation)> = observations.into_iter().enumerate().collect();
        indexed.sort_by_key(|(_, observation)| observation.timestamp);

        for pair in indexed.windows(2) {
            let (first_row, first) = &pair[0];
            let (second_row, second) = &pair[1];
            if first.timestamp == second.timestamp {
                return Err(ForecastError::DataError(format!(
                    "Duplicate timestamp {} at rows {} and {}",
                    first.timestamp,
                    first_row + 1,
                    second_row + 1
                )));
            }
        }

        Ok(Self {
            observations: indexed.into_iter().map(|(_, o)| o).collect(),
        })
    }

    /// Observations in ascending time order
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Check if there are no observations
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Timestamps of all observations
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.observations.iter().map(|o| o.timestamp).collect()
    }

    /// Raw moisture readings
    pub fn moisture(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.moisture).collect()
    }

    /// Detect the sampling interval as the median spacing between readings
    pub fn sampling_interval(&self) -> Result<Duration> {
        if self.observations.len() < 2 {
            return Err(ForecastError::InsufficientData(
                "At least two observations are needed to detect the sampling interval"
                    .to_string(),
            ));
        }

        let mut spacings: Vec<i64> = self
            .observations
            .windows(2)
            .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_milliseconds())
            .collect();
        spacings.sort_unstable();

        let median = spacings[(spacings.len() - 1) / 2];
        debug!(median_ms = median, "Detected sampling interval");
        Ok(Duration::milliseconds(median))
    }

    /// Place the observations on a regular grid of `interval`.
    ///
    /// Each reading goes to the nearest grid slot counted from the first
    /// reading. Slots without a reading become imputed rows with missing
    /// values; two readings in one slot are rejected.
    pub fn align(&self, interval: Duration) -> Result<AlignedObservations> {
        let step = interval.num_milliseconds();
        if step <= 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Sampling interval must be positive, got {} ms",
                step
            )));
        }
        let start = self
            .observations
            .first()
            .map(|o| o.timestamp)
            .ok_or_else(|| ForecastError::InsufficientData("No observations to align".to_string()))?;

        let mut slots: Vec<Option<usize>> = Vec::new();
        for (index, observation) in self.observations.iter().enumerate() {
            let offset = (observation.timestamp - start).num_milliseconds();
            let slot = (offset as f64 / step as f64).round() as usize;
            if slot >= slots.len() {
                slots.resize(slot + 1, None);
            }
            if let Some(previous) = slots[slot] {
                return Err(ForecastError::DataError(format!(
                    "Readings at {} and {} fall into the same sampling slot",
                    self.observations[previous].timestamp, observation.timestamp
                )));
            }
            slots[slot] = Some(index);
        }

        let has_temperature = self.observations.iter().any(|o| o.temperature.is_some());
        let has_humidity = self.observations.iter().any(|o| o.humidity.is_some());

        let mut aligned = AlignedObservations {
            interval,
            timestamps: Vec::with_capacity(slots.len()),
            moisture: Vec::with_capacity(slots.len()),
            temperature: has_temperature.then(Vec::new),
            humidity: has_humidity.then(Vec::new),
            imputed: Vec::with_capacity(slots.len()),
        };

        for (slot, entry) in slots.iter().enumerate() {
            let observation = entry.map(|index| &self.observations[index]);
            aligned.timestamps.push(match observation {
                Some(o) => o.timestamp,
                None => start + interval * slot as i32,
            });
            aligned.moisture.push(observation.map(|o| o.moisture));
            if let Some(column) = aligned.temperature.as_mut() {
                column.push(observation.and_then(|o| o.temperature));
            }
            if let Some(column) = aligned.humidity.as_mut() {
                column.push(observation.and_then(|o| o.humidity));
            }
            aligned.imputed.push(observation.is_none());
        }

        if aligned.imputed_count() > 0 {
            info!(
                gaps = aligned.imputed_count(),
                rows = aligned.len(),
                "Inserted rows for missing sampling slots"
            );
        }

        Ok(aligned)
    }
}

/// Observations on a regular sampling grid; missing slots hold `None`
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedObservations {
    interval: Duration,
    timestamps: Vec<DateTime<Utc>>,
    moisture: Vec<Option<f64>>,
    temperature: Option<Vec<Option<f64>>>,
    humidity: Option<Vec<Option<f64>>>,
    imputed: Vec<bool>,
}

impl AlignedObservations {
    /// Sampling interval of the grid
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of grid rows
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the grid is empty
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Row timestamps
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Moisture per row, `None` for imputed rows
    pub fn moisture(&self) -> &[Option<f64>] {
        &self.moisture
    }

    /// Temperature per row, if the sensor reports it
    pub fn temperature(&self) -> Option<&[Option<f64>]> {
        self.temperature.as_deref()
    }

    /// Humidity per row, if the sensor reports it
    pub fn humidity(&self) -> Option<&[Option<f64>]> {
        self.humidity.as_deref()
    }

    /// Which rows were inserted for missing slots
    pub fn imputed(&self) -> &[bool] {
        &self.imputed
    }

    /// Number of inserted rows
    pub fn imputed_count(&self) -> usize {
        self.imputed.iter().filter(|&&flag| flag).count()
    }

    /// Timestamp of the last row
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }
}
