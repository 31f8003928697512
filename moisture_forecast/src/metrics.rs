//! Metrics for evaluating forecast performance

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Regression error metrics over a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Coefficient of determination; `None` when the targets are constant
    pub r2: Option<f64>,
    /// Number of compared values
    pub samples: usize,
}

/// Compare predictions with actual values
pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Result<EvaluationMetrics> {
    if y_true.is_empty() {
        return Err(ForecastError::ValidationError(
            "Cannot evaluate an empty sample".to_string(),
        ));
    }
    if y_true.len() != y_pred.len() {
        return Err(ForecastError::ValidationError(format!(
            "Actual values ({}) and predictions ({}) differ in length",
            y_true.len(),
            y_pred.len()
        )));
    }
    if let Some(index) = y_true.iter().chain(y_pred).position(|v| !v.is_finite()) {
        let (side, offset) = if index < y_true.len() {
            ("actual", index)
        } else {
            ("predicted", index - y_true.len())
        };
        return Err(ForecastError::ValidationError(format!(
            "Non-finite {} value at position {}",
            side, offset
        )));
    }

    let n = y_true.len() as f64;
    let mean = y_true.iter().sum::<f64>() / n;

    let (abs_sum, sq_sum) = y_true
        .iter()
        .zip(y_pred)
        .fold((0.0, 0.0), |(abs, sq), (&a, &p)| {
            let e = a - p;
            (abs + e.abs(), sq + e * e)
        });
    let total = y_true.iter().map(|&a| (a - mean).powi(2)).sum::<f64>();

    Ok(EvaluationMetrics {
        mae: abs_sum / n,
        rmse: (sq_sum / n).sqrt(),
        r2: if total > 0.0 { Some(1.0 - sq_sum / total) } else { None },
        samples: y_true.len(),
    })
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MAE {:.4}  RMSE {:.4}  R² ", self.mae, self.rmse)?;
        match self.r2 {
            Some(r2) => write!(f, "{:.4}", r2)?,
            None => write!(f, "undefined")?,
        }
        write!(f, "  (n = {})", self.samples)
    }
}

/// Train and test metrics of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub model: String,
    pub train: EvaluationMetrics,
    pub test: EvaluationMetrics,
}

impl ModelEvaluation {
    /// Evaluate predictions on both sides of a chronological split
    pub fn new(
        model: impl Into<String>,
        (train_true, train_pred): (&[f64], &[f64]),
        (test_true, test_pred): (&[f64], &[f64]),
    ) -> Result<Self> {
        Ok(Self {
            model: model.into(),
            train: evaluate(train_true, train_pred)?,
            test: evaluate(test_true, test_pred)?,
        })
    }
}

impl fmt::Display for ModelEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} Performance:", self.model)?;
        writeln!(f, "  Train: {}", self.train)?;
        writeln!(f, "  Test:  {}", self.test)?;
        Ok(())
    }
}
