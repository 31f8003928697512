//! LSTM sequence regressor
//!
//! Windows of consecutive feature rows are min-max scaled, passed through two
//! stacked LSTM layers with dropout and a dense head, and trained with Adam on
//! the mean squared error. The last part of the training windows is held out
//! for validation and drives early stopping; the weights of the best
//! validation epoch are kept.

mod layers;
mod network;
mod optimizer;

pub use self::network::NetworkShape;
pub use self::optimizer::Adam;

use self::network::{Dropout, SequenceNetwork};
use crate::error::{ForecastError, Result};
use crate::features::{FeatureSet, FeatureWindow};
use crate::models::early_stopping::{EarlyStopping, StopDecision};
use crate::models::{check_features, prepare_window, Regressor, WindowPredictor};
use crate::supervised::{SequenceWindow, SupervisedSet};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use soil_math::scaling::{ColumnScaler, MinMaxScaler};
use std::fmt;
use tracing::{debug, info};

/// Hyperparameters of the sequence regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Rows per input window
    pub sequence_length: usize,
    /// Units of the first LSTM layer
    pub first_units: usize,
    /// Units of the second LSTM layer
    pub second_units: usize,
    /// Units of the dense ReLU layer
    pub dense_units: usize,
    /// Dropout rate after each LSTM layer
    pub dropout: f64,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    /// Epochs without validation improvement before stopping
    pub patience: usize,
    /// Share of training windows held out for validation
    pub validation_fraction: f64,
    /// Seed for weights, dropout and batch order
    pub seed: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            sequence_length: 24,
            first_units: 64,
            second_units: 32,
            dense_units: 16,
            dropout: 0.2,
            learning_rate: 1e-3,
            epochs: 50,
            batch_size: 16,
            patience: 10,
            validation_fraction: 0.1,
            seed: 42,
        }
    }
}

impl SequenceConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("sequence_length", self.sequence_length),
            ("first_units", self.first_units),
            ("second_units", self.second_units),
            ("dense_units", self.dense_units),
            ("epochs", self.epochs),
            ("batch_size", self.batch_size),
            ("patience", self.patience),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ForecastError::ConfigError(format!("{} must be positive", name)));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ForecastError::ConfigError(format!(
                "Dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ForecastError::ConfigError(format!(
                "Learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(ForecastError::ConfigError(format!(
                "Validation fraction must be in (0, 1), got {}",
                self.validation_fraction
            )));
        }
        Ok(())
    }
}

/// Loss and MAE of one epoch, on scaled targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// 1-based epoch number
    pub epoch: usize,
    pub loss: f64,
    pub mae: f64,
    pub val_loss: f64,
    pub val_mae: f64,
}

/// Per-epoch training record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
    /// Epoch whose weights were kept
    pub best_epoch: usize,
    /// Epoch at which early stopping ended training, if it did
    pub stopped_epoch: Option<usize>,
}

impl TrainingHistory {
    /// Validation loss of the kept weights
    pub fn best_val_loss(&self) -> Option<f64> {
        self.epochs
            .iter()
            .find(|record| record.epoch == self.best_epoch)
            .map(|record| record.val_loss)
    }
}

impl fmt::Display for TrainingHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Training History:")?;
        for record in &self.epochs {
            writeln!(
                f,
                "  Epoch {:>3}: loss {:.6}  mae {:.6}  val_loss {:.6}  val_mae {:.6}",
                record.epoch, record.loss, record.mae, record.val_loss, record.val_mae
            )?;
        }
        writeln!(f, "  Best epoch: {}", self.best_epoch)?;
        if let Some(stopped) = self.stopped_epoch {
            writeln!(f, "  Stopped early at epoch {}", stopped)?;
        }
        Ok(())
    }
}

/// LSTM regressor configuration
#[derive(Debug, Clone)]
pub struct SequenceRegressor {
    /// Name of the model
    name: String,
    config: SequenceConfig,
}

/// Trained LSTM with its input and target scalers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedSequenceModel {
    name: String,
    features: FeatureSet,
    sequence_length: usize,
    network: SequenceNetwork,
    input_scaler: ColumnScaler,
    target_scaler: MinMaxScaler,
    history: TrainingHistory,
}

struct ScaledWindow {
    rows: Vec<Vec<f64>>,
    target: f64,
}

impl SequenceRegressor {
    /// Create a regressor after validating the configuration
    pub fn new(config: SequenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: "LSTM".to_string(),
            config,
        })
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Train on sequence windows built with the given feature set.
    ///
    /// The last `validation_fraction` of the windows (at least one) is held
    /// out for validation and early stopping.
    pub fn fit(&self, windows: &[SequenceWindow], features: &FeatureSet) -> Result<TrainedSequenceModel> {
        let config = &self.config;
        if let Some(window) = windows.iter().find(|w| w.rows.len() != config.sequence_length) {
            return Err(ForecastError::ValidationError(format!(
                "Window has {} rows, sequence length is {}",
                window.rows.len(),
                config.sequence_length
            )));
        }
        if let Some(row) = windows.iter().flat_map(|w| &w.rows).find(|r| r.len() != features.len()) {
            return Err(ForecastError::ValidationError(format!(
                "Window row has {} values, feature set has {}",
                row.len(),
                features.len()
            )));
        }

        let validation_count = ((windows.len() as f64 * config.validation_fraction).ceil() as usize).max(1);
        if windows.len() <= validation_count {
            return Err(ForecastError::InsufficientData(format!(
                "{} windows cannot provide both training and validation windows",
                windows.len()
            )));
        }

        let all_rows: Vec<Vec<f64>> = windows.iter().flat_map(|w| w.rows.iter().cloned()).collect();
        let targets: Vec<f64> = windows.iter().map(|w| w.target).collect();
        let input_scaler = ColumnScaler::fit(&all_rows)?;
        let target_scaler = MinMaxScaler::fit(&targets)?;

        let scaled = windows
            .iter()
            .map(|w| -> Result<ScaledWindow> {
                Ok(ScaledWindow {
                    rows: w
                        .rows
                        .iter()
                        .map(|row| input_scaler.transform_row(row))
                        .collect::<std::result::Result<Vec<_>, _>>()?,
                    target: target_scaler.transform(w.target),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let (train, validation) = scaled.split_at(scaled.len() - validation_count);

        let mut rng = StdRng::seed_from_u64(config.seed);
        let shape = NetworkShape {
            inputs: features.len(),
            first_units: config.first_units,
            second_units: config.second_units,
            dense_units: config.dense_units,
        };
        let mut network = SequenceNetwork::new(shape, &mut rng);
        let mut optimizer = Adam::new(config.learning_rate);
        let mut stopping = EarlyStopping::new(config.patience);
        let mut history = TrainingHistory::default();
        let mut order: Vec<usize> = (0..train.len()).collect();

        info!(
            train = train.len(),
            validation = validation.len(),
            features = %features,
            "Training sequence model"
        );

        for epoch in 1..=config.epochs {
            order.shuffle(&mut rng);
            let mut squared = 0.0;
            let mut absolute = 0.0;

            for batch in order.chunks(config.batch_size) {
                let mut grads = network.zero_gradients();
                for &index in batch {
                    let window = &train[index];
                    let dropout = Dropout {
                        rate: config.dropout,
                        rng: &mut rng,
                    };
                    let (prediction, cache) = network.forward(&window.rows, Some(dropout));
                    let error = prediction - window.target;
                    squared += error * error;
                    absolute += error.abs();
                    network.backward(&cache, 2.0 * error / batch.len() as f64, &mut grads);
                }
                optimizer.update(network.parameters_mut(), grads.tensors());
            }

            let loss = squared / train.len() as f64;
            let mae = absolute / train.len() as f64;
            let (val_loss, val_mae) = Self::score(&network, validation);

            if !(loss.is_finite() && val_loss.is_finite()) {
                return Err(ForecastError::TrainingError(format!(
                    "Loss became non-finite at epoch {}",
                    epoch
                )));
            }

            debug!(epoch, loss, mae, val_loss, val_mae, "Epoch finished");
            history.epochs.push(EpochRecord {
                epoch,
                loss,
                mae,
                val_loss,
                val_mae,
            });

            if stopping.observe(epoch, val_loss, &network) == StopDecision::Stop {
                history.stopped_epoch = Some(epoch);
                break;
            }
        }

        history.best_epoch = stopping.best_epoch().unwrap_or(history.epochs.len());
        let network = stopping.into_best().unwrap_or(network);

        info!(
            epochs = history.epochs.len(),
            best_epoch = history.best_epoch,
            stopped_early = history.stopped_epoch.is_some(),
            "Sequence model trained"
        );

        Ok(TrainedSequenceModel {
            name: self.name.clone(),
            features: features.clone(),
            sequence_length: config.sequence_length,
            network,
            input_scaler,
            target_scaler,
            history,
        })
    }

    /// Mean squared and absolute error without dropout
    fn score(network: &SequenceNetwork, windows: &[ScaledWindow]) -> (f64, f64) {
        let (squared, absolute) = windows.iter().fold((0.0, 0.0), |(sq, abs), window| {
            let error = network.predict(&window.rows) - window.target;
            (sq + error * error, abs + error.abs())
        });
        let n = windows.len() as f64;
        (squared / n, absolute / n)
    }
}

impl Default for SequenceRegressor {
    fn default() -> Self {
        Self {
            name: "LSTM".to_string(),
            config: SequenceConfig::default(),
        }
    }
}

impl Regressor for SequenceRegressor {
    type Trained = TrainedSequenceModel;

    fn train(&self, examples: &SupervisedSet) -> Result<Self::Trained> {
        let windows = examples.sequence_windows(self.config.sequence_length)?;
        self.fit(&windows, examples.features())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedSequenceModel {
    /// Record of the training run
    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    /// Predict from `sequence_length` feature rows in original units
    pub fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<f64> {
        if rows.len() != self.sequence_length {
            return Err(ForecastError::ValidationError(format!(
                "Expected {} rows, got {}",
                self.sequence_length,
                rows.len()
            )));
        }

        let scaled = rows
            .iter()
            .map(|row| self.input_scaler.transform_row(row))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let prediction = self.target_scaler.inverse_transform(self.network.predict(&scaled));

        if !prediction.is_finite() {
            return Err(ForecastError::ValidationError(
                "Sequence model produced a non-finite prediction".to_string(),
            ));
        }
        Ok(prediction)
    }

    /// Predict every window
    pub fn predict(&self, windows: &[SequenceWindow], features: &FeatureSet) -> Result<Vec<f64>> {
        check_features(&self.features, features)?;
        windows.iter().map(|w| self.predict_rows(&w.rows)).collect()
    }

    /// Serialise the model to JSON bytes
    pub fn save(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Restore a model saved with [`TrainedSequenceModel::save`]
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let model: Self = serde_json::from_slice(bytes)?;
        if model.network.input_size() != model.features.len() {
            return Err(ForecastError::ValidationError(format!(
                "Stored network expects {} inputs but lists {} features",
                model.network.input_size(),
                model.features.len()
            )));
        }
        Ok(model)
    }
}

impl WindowPredictor for TrainedSequenceModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn features(&self) -> &FeatureSet {
        &self.features
    }

    fn window_length(&self) -> usize {
        self.sequence_length
    }

    fn predict_window(&self, window: &FeatureWindow) -> Result<f64> {
        let window = prepare_window(self, window)?;
        self.predict_rows(window.rows())
    }
}
