//! Min-max scaling of features and targets

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Maps values from `[min, max]` onto `[0, 1]`.
///
/// A constant training column has a zero range; it scales to 0 and inverts
/// back to that constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    /// Fit the scaler on a sample
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot fit a scaler on an empty sample".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Cannot fit a scaler on non-finite values".to_string(),
            ));
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(Self { min, max })
    }

    /// Scale a value into the fitted range
    pub fn transform(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            0.0
        } else {
            (value - self.min) / range
        }
    }

    /// Map a scaled value back to original units
    pub fn inverse_transform(&self, value: f64) -> f64 {
        value * (self.max - self.min) + self.min
    }

    /// Smallest fitted value
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest fitted value
    pub fn max(&self) -> f64 {
        self.max
    }
}

/// One min-max scaler per column of a row-major matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScaler {
    columns: Vec<MinMaxScaler>,
}

impl ColumnScaler {
    /// Fit one scaler per column
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows
            .first()
            .map(|row| row.len())
            .ok_or_else(|| MathError::InsufficientData("No rows to fit".to_string()))?;

        if rows.iter().any(|row| row.len() != width) {
            return Err(MathError::InvalidInput(
                "All rows must have the same number of columns".to_string(),
            ));
        }

        let columns = (0..width)
            .map(|j| {
                let column: Vec<f64> = rows.iter().map(|row| row[j]).collect();
                MinMaxScaler::fit(&column)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { columns })
    }

    /// Number of columns the scaler was fitted on
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Scale one row
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.columns.len() {
            return Err(MathError::InvalidInput(format!(
                "Row has {} values, scaler expects {}",
                row.len(),
                self.columns.len()
            )));
        }

        Ok(self
            .columns
            .iter()
            .zip(row)
            .map(|(scaler, &v)| scaler.transform(v))
            .collect())
    }
}
