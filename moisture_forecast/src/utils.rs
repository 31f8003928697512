//! Utility functions for the moisture_forecast crate

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

/// Split a sequence chronologically; the last `ceil(len * test_fraction)` items form the test part
pub fn chronological_split<T: Clone>(items: &[T], test_fraction: f64) -> Result<(Vec<T>, Vec<T>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "Test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let test_size = (items.len() as f64 * test_fraction).ceil() as usize;
    if test_size == 0 || test_size >= items.len() {
        return Err(ForecastError::DegenerateSplit(format!(
            "Splitting {} items with test fraction {} leaves an empty side",
            items.len(),
            test_fraction
        )));
    }

    let train_size = items.len() - test_size;
    Ok((items[..train_size].to_vec(), items[train_size..].to_vec()))
}

/// Create `steps` timestamps spaced by `interval`, starting one interval after `last_timestamp`
pub fn future_timestamps(
    last_timestamp: DateTime<Utc>,
    steps: usize,
    interval: Duration,
) -> Result<Vec<DateTime<Utc>>> {
    if interval <= Duration::zero() {
        return Err(ForecastError::InvalidParameter(format!(
            "Interval must be positive, got {} seconds",
            interval.num_seconds()
        )));
    }

    let mut timestamps = Vec::with_capacity(steps);
    let mut current = last_timestamp;

    for _ in 0..steps {
        current += interval;
        timestamps.push(current);
    }

    Ok(timestamps)
}

/// Number of samples covering `span` at the given sampling interval.
///
/// Rounds to the nearest whole sample and never returns less than one.
pub fn samples_for_duration(span: Duration, interval: Duration) -> Result<usize> {
    let step = interval.num_milliseconds();
    if step <= 0 {
        return Err(ForecastError::InvalidParameter(format!(
            "Sampling interval must be positive, got {} ms",
            step
        )));
    }
    let span_ms = span.num_milliseconds();
    if span_ms <= 0 {
        return Err(ForecastError::InvalidParameter(format!(
            "Duration must be positive, got {} ms",
            span_ms
        )));
    }

    if span_ms % step != 0 {
        warn!(
            span_ms,
            interval_ms = step,
            "Duration is not a whole number of sampling intervals, rounding"
        );
    }

    Ok(((span_ms as f64 / step as f64).round() as usize).max(1))
}

/// Convert fractional hours into a chrono duration
pub fn hours(value: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ForecastError::InvalidParameter(format!(
            "Hours must be positive, got {}",
            value
        )));
    }
    Ok(Duration::milliseconds((value * 3_600_000.0).round() as i64))
}
