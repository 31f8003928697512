//! Regression models for moisture forecasting

use crate::error::{ForecastError, Result};
use crate::features::{FeatureSet, FeatureWindow};
use crate::supervised::SupervisedSet;
use std::fmt::Debug;

pub mod early_stopping;
pub mod linear;
pub mod sequence;

/// A trained model that predicts the target from the newest rows of a feature window
pub trait WindowPredictor: Debug {
    /// Name of the model
    fn name(&self) -> &str;

    /// Feature set the model was trained on
    fn features(&self) -> &FeatureSet;

    /// Number of rows consumed per prediction
    fn window_length(&self) -> usize;

    /// Predict the target for the newest `window_length` rows of `window`
    fn predict_window(&self, window: &FeatureWindow) -> Result<f64>;
}

/// Model configuration that can be trained on supervised examples
pub trait Regressor: Debug + Clone {
    /// The type of trained model produced
    type Trained: WindowPredictor;

    /// Train the model
    fn train(&self, examples: &SupervisedSet) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Check a window against a predictor and cut it to the predictor's length
pub(crate) fn prepare_window<P: WindowPredictor + ?Sized>(
    predictor: &P,
    window: &FeatureWindow,
) -> Result<FeatureWindow> {
    if window.features() != predictor.features() {
        return Err(ForecastError::ColumnMismatch {
            expected: predictor.features().to_string(),
            actual: window.features().to_string(),
        });
    }
    if window.len() < predictor.window_length() {
        return Err(ForecastError::InsufficientData(format!(
            "{} needs {} rows, window has {}",
            predictor.name(),
            predictor.window_length(),
            window.len()
        )));
    }
    window.tail(predictor.window_length())
}

/// Check that a feature set matches the one a model was trained on
pub(crate) fn check_features(expected: &FeatureSet, actual: &FeatureSet) -> Result<()> {
    if expected != actual {
        return Err(ForecastError::ColumnMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}
