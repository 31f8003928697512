//! Supervised examples: feature rows paired with the smoothed moisture `horizon` steps later

use crate::denoise::SmoothedSeries;
use crate::error::{ForecastError, Result};
use crate::features::{FeatureSet, FeatureTable};
use crate::utils::chronological_split;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Feature rows with their future targets, in time order
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisedSet {
    features: FeatureSet,
    horizon: usize,
    rows: Vec<Vec<f64>>,
    targets: Vec<f64>,
    timestamps: Vec<DateTime<Utc>>,
    row_indices: Vec<usize>,
}

/// A run of consecutive feature rows and the target that follows it
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceWindow {
    /// Feature rows, oldest first
    pub rows: Vec<Vec<f64>>,
    /// Target of the example right after the window
    pub target: f64,
    /// Timestamp of the newest row in the window
    pub timestamp: DateTime<Utc>,
}

/// Pair each feature row `t` with `target[t + horizon_steps]`.
///
/// Rows whose target index is past the end, lands on an imputed row or has no
/// smoothed value are dropped.
pub fn make_examples(
    table: &FeatureTable,
    target: &SmoothedSeries,
    horizon_steps: usize,
    features: &FeatureSet,
) -> Result<SupervisedSet> {
    if horizon_steps == 0 {
        return Err(ForecastError::InvalidParameter(
            "Horizon must be at least one step".to_string(),
        ));
    }
    if table.len() != target.len() {
        return Err(ForecastError::ValidationError(format!(
            "Target series has {} rows, feature table has {}",
            target.len(),
            table.len()
        )));
    }

    let mut set = SupervisedSet {
        features: features.clone(),
        horizon: horizon_steps,
        rows: Vec::new(),
        targets: Vec::new(),
        timestamps: Vec::new(),
        row_indices: Vec::new(),
    };

    let values = target.values();
    let imputed = table.imputed();
    let mut dropped_gaps = 0;

    for t in 0..table.len().saturating_sub(horizon_steps) {
        let target_index = t + horizon_steps;
        let value = match values[target_index] {
            Some(v) if !imputed[target_index] => v,
            _ => {
                dropped_gaps += 1;
                continue;
            }
        };

        set.rows.push(table.row(t, features)?);
        set.targets.push(value);
        set.timestamps.push(table.timestamps()[t]);
        set.row_indices.push(t);
    }

    if set.is_empty() {
        return Err(ForecastError::InsufficientData(format!(
            "No examples for a horizon of {} steps over {} rows",
            horizon_steps,
            table.len()
        )));
    }

    debug!(
        examples = set.len(),
        dropped_gaps,
        horizon = horizon_steps,
        "Constructed supervised examples"
    );

    Ok(set)
}

impl SupervisedSet {
    /// Number of examples
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if there are no examples
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Feature set the rows follow
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Horizon in sample steps
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Feature rows
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Targets
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Timestamps of the feature rows
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Feature table row each example came from
    pub fn row_indices(&self) -> &[usize] {
        &self.row_indices
    }

    fn slice(&self, range: std::ops::Range<usize>) -> SupervisedSet {
        SupervisedSet {
            features: self.features.clone(),
            horizon: self.horizon,
            rows: self.rows[range.clone()].to_vec(),
            targets: self.targets[range.clone()].to_vec(),
            timestamps: self.timestamps[range.clone()].to_vec(),
            row_indices: self.row_indices[range].to_vec(),
        }
    }

    /// Split into train and test parts; the test part holds the last `ceil(n * f)` examples
    pub fn split_chronological(&self, test_fraction: f64) -> Result<(SupervisedSet, SupervisedSet)> {
        let positions: Vec<usize> = (0..self.len()).collect();
        let (train, test) = chronological_split(&positions, test_fraction)?;
        let boundary = train.len();
        debug_assert_eq!(boundary + test.len(), self.len());

        Ok((self.slice(0..boundary), self.slice(boundary..self.len())))
    }

    /// Sliding windows of `length` examples labelled with the next example's target.
    ///
    /// A window and its label must come from consecutive feature rows, so no
    /// window spans a dropped example.
    pub fn sequence_windows(&self, length: usize) -> Result<Vec<SequenceWindow>> {
        if length == 0 {
            return Err(ForecastError::InvalidParameter(
                "Sequence length must be at least one".to_string(),
            ));
        }

        let windows: Vec<SequenceWindow> = (0..self.len().saturating_sub(length))
            .filter(|&i| {
                self.row_indices[i..=i + length]
                    .windows(2)
                    .all(|pair| pair[1] == pair[0] + 1)
            })
            .map(|i| SequenceWindow {
                rows: self.rows[i..i + length].to_vec(),
                target: self.targets[i + length],
                timestamp: self.timestamps[i + length - 1],
            })
            .collect();

        if windows.is_empty() {
            return Err(ForecastError::InsufficientData(format!(
                "{} examples cannot form a sequence window of length {}",
                self.len(),
                length
            )));
        }

        Ok(windows)
    }
}
