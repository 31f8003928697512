//! Descriptive statistics and a data-quality report for aligned telemetry

use crate::data::AlignedObservations;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::fmt;

/// Summary statistics of one numeric column, ignoring missing values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; needs two values
    pub std_dev: Option<f64>,
    pub min: f64,
    pub lower_quartile: f64,
    pub median: f64,
    pub upper_quartile: f64,
    pub max: f64,
    pub range: f64,
    /// Sample variance; needs two values
    pub variance: Option<f64>,
    /// Adjusted Fisher-Pearson skewness; needs three values and non-zero spread
    pub skewness: Option<f64>,
    /// Excess kurtosis with small-sample correction; needs four values and non-zero spread
    pub kurtosis: Option<f64>,
}

impl ColumnSummary {
    /// Summarise the present values of a column; `None` when there are none
    pub fn from_values(name: &str, values: &[Option<f64>]) -> Option<Self> {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        if present.is_empty() {
            return None;
        }

        let n = present.len() as f64;
        let mean = present.iter().mean();
        let min = present.iter().copied().fold(f64::INFINITY, f64::min);
        let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut data = Data::new(present.clone());
        let lower_quartile = data.lower_quartile();
        let median = data.median();
        let upper_quartile = data.upper_quartile();

        let variance = (present.len() > 1).then(|| present.iter().variance());

        let central = |power: i32| present.iter().map(|v| (v - mean).powi(power)).sum::<f64>() / n;
        let m2 = central(2);
        let spread = m2 > 0.0;

        let skewness = (present.len() > 2 && spread).then(|| {
            let g1 = central(3) / m2.powf(1.5);
            (n * (n - 1.0)).sqrt() / (n - 2.0) * g1
        });
        let kurtosis = (present.len() > 3 && spread).then(|| {
            let g2 = central(4) / (m2 * m2) - 3.0;
            ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
        });

        Some(Self {
            name: name.to_string(),
            count: present.len(),
            mean,
            std_dev: variance.map(f64::sqrt),
            min,
            lower_quartile,
            median,
            upper_quartile,
            max,
            range: max - min,
            variance,
            skewness,
            kurtosis,
        })
    }
}

/// Overview of a telemetry series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub records: usize,
    pub imputed_slots: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval_seconds: i64,
    pub columns: Vec<ColumnSummary>,
    pub first_moisture: Option<f64>,
    pub last_moisture: Option<f64>,
    /// Mean difference between consecutive moisture readings
    pub mean_change_per_sample: Option<f64>,
    /// Largest decrease from the first to the last reading of a full window
    pub max_drop: Option<f64>,
    /// Span of the window used for `max_drop`
    pub drop_window_hours: f64,
}

/// Build the report; `drop_window` is the span over which the largest drop is measured
pub fn analyse(aligned: &AlignedObservations, drop_window: Duration) -> Result<AnalysisReport> {
    let (start, end) = match (aligned.timestamps().first(), aligned.last_timestamp()) {
        (Some(&start), Some(end)) => (start, end),
        _ => {
            return Err(ForecastError::InsufficientData(
                "Nothing to analyse in an empty series".to_string(),
            ))
        }
    };
    let window = crate::utils::samples_for_duration(drop_window, aligned.interval())?;

    let mut columns = Vec::new();
    columns.extend(ColumnSummary::from_values("moisture", aligned.moisture()));
    if let Some(values) = aligned.temperature() {
        columns.extend(ColumnSummary::from_values("temperature", values));
    }
    if let Some(values) = aligned.humidity() {
        columns.extend(ColumnSummary::from_values("humidity", values));
    }

    let moisture = aligned.moisture();
    let changes: Vec<f64> = moisture
        .windows(2)
        .filter_map(|pair| Some(pair[1]? - pair[0]?))
        .collect();
    let mean_change_per_sample =
        (!changes.is_empty()).then(|| changes.iter().sum::<f64>() / changes.len() as f64);

    let max_drop = if window < 2 {
        None
    } else {
        moisture
            .windows(window)
            .filter_map(|w| Some(w[0]? - w[window - 1]?))
            .fold(None, |best: Option<f64>, drop| Some(best.map_or(drop, |b| b.max(drop))))
    };

    Ok(AnalysisReport {
        records: aligned.len() - aligned.imputed_count(),
        imputed_slots: aligned.imputed_count(),
        start,
        end,
        interval_seconds: aligned.interval().num_seconds(),
        columns,
        first_moisture: moisture.iter().flatten().next().copied(),
        last_moisture: moisture.iter().flatten().last().copied(),
        mean_change_per_sample,
        max_drop,
        drop_window_hours: drop_window.num_seconds() as f64 / 3600.0,
    })
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Soil Telemetry Report")?;
        writeln!(f, "=====================")?;
        writeln!(f, "Records:        {}", self.records)?;
        writeln!(f, "Missing slots:  {}", self.imputed_slots)?;
        writeln!(f, "Time range:     {} to {}", self.start, self.end)?;
        writeln!(f, "Interval:       {} s", self.interval_seconds)?;
        writeln!(f)?;

        for column in &self.columns {
            writeln!(f, "{}:", column.name)?;
            writeln!(f, "  count     {}", column.count)?;
            writeln!(f, "  mean      {:.2}", column.mean)?;
            writeln!(f, "  std       {}", optional(column.std_dev))?;
            writeln!(f, "  min       {:.2}", column.min)?;
            writeln!(f, "  25%       {:.2}", column.lower_quartile)?;
            writeln!(f, "  50%       {:.2}", column.median)?;
            writeln!(f, "  75%       {:.2}", column.upper_quartile)?;
            writeln!(f, "  max       {:.2}", column.max)?;
            writeln!(f, "  range     {:.2}", column.range)?;
            writeln!(f, "  variance  {}", optional(column.variance))?;
            writeln!(f, "  skewness  {}", optional(column.skewness))?;
            writeln!(f, "  kurtosis  {}", optional(column.kurtosis))?;
        }

        writeln!(f)?;
        writeln!(f, "Moisture trend:")?;
        writeln!(f, "  first reading          {}", optional(self.first_moisture))?;
        writeln!(f, "  last reading           {}", optional(self.last_moisture))?;
        writeln!(f, "  mean change / sample   {}", optional(self.mean_change_per_sample))?;
        writeln!(
            f,
            "  max {}-hour drop        {}",
            self.drop_window_hours,
            optional(self.max_drop)
        )?;
        Ok(())
    }
}
