//! Linear baseline over flat feature vectors

use crate::error::{ForecastError, Result};
use crate::features::{FeatureColumn, FeatureSet, FeatureWindow};
use crate::models::{check_features, prepare_window, Regressor, WindowPredictor};
use crate::supervised::SupervisedSet;
use serde::{Deserialize, Serialize};
use soil_math::regression::{least_squares, LinearFit};
use tracing::info;

/// Default ridge term on standardised features
pub const DEFAULT_RIDGE: f64 = 1e-6;

/// Least-squares linear regression with a small ridge term
#[derive(Debug, Clone)]
pub struct LinearRegressor {
    /// Name of the model
    name: String,
    /// Ridge term on standardised features
    ridge: f64,
}

/// Trained linear model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedLinearModel {
    /// Name of the model
    name: String,
    /// Feature set of the inputs
    features: FeatureSet,
    /// Coefficients in original units and the intercept
    fit: LinearFit,
}

impl LinearRegressor {
    /// Create a new linear regressor
    pub fn new(ridge: f64) -> Result<Self> {
        if !ridge.is_finite() || ridge < 0.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Ridge term must be non-negative, got {}",
                ridge
            )));
        }

        Ok(Self {
            name: "Linear Regression".to_string(),
            ridge,
        })
    }
}

impl Default for LinearRegressor {
    fn default() -> Self {
        Self {
            name: "Linear Regression".to_string(),
            ridge: DEFAULT_RIDGE,
        }
    }
}

impl Regressor for LinearRegressor {
    type Trained = TrainedLinearModel;

    fn train(&self, examples: &SupervisedSet) -> Result<Self::Trained> {
        if examples.is_empty() {
            return Err(ForecastError::InsufficientData(
                "No examples to fit the linear model".to_string(),
            ));
        }

        let fit = least_squares(examples.rows(), examples.targets(), self.ridge)?;

        info!(
            examples = examples.len(),
            features = %examples.features(),
            intercept = fit.intercept,
            "Fitted linear model"
        );

        Ok(TrainedLinearModel {
            name: self.name.clone(),
            features: examples.features().clone(),
            fit,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedLinearModel {
    /// Coefficient of each feature in original units
    pub fn coefficients(&self) -> Vec<(FeatureColumn, f64)> {
        self.features
            .columns()
            .iter()
            .copied()
            .zip(self.fit.coefficients.iter().copied())
            .collect()
    }

    /// Intercept term
    pub fn intercept(&self) -> f64 {
        self.fit.intercept
    }

    /// Predict a single feature row
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        Ok(self.fit.predict(row)?)
    }

    /// Predict every example of a supervised set
    pub fn predict(&self, examples: &SupervisedSet) -> Result<Vec<f64>> {
        check_features(&self.features, examples.features())?;
        examples.rows().iter().map(|row| self.predict_row(row)).collect()
    }

    /// Serialise the model to JSON bytes
    pub fn save(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Restore a model saved with [`TrainedLinearModel::save`]
    pub fn load(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl WindowPredictor for TrainedLinearModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn features(&self) -> &FeatureSet {
        &self.features
    }

    fn window_length(&self) -> usize {
        1
    }

    fn predict_window(&self, window: &FeatureWindow) -> Result<f64> {
        let window = prepare_window(self, window)?;
        self.predict_row(window.last_row())
    }
}
