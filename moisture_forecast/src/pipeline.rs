//! End-to-end pipeline: align, smooth, derive features, train, evaluate and forecast

use crate::config::PipelineConfig;
use crate::data::{AlignedObservations, ObservationSet};
use crate::denoise::{smooth, SmoothedSeries};
use crate::error::{ForecastError, Result};
use crate::features::{build_features, FeatureSet, FeatureTable};
use crate::forecast::{forecast, Forecast};
use crate::metrics::ModelEvaluation;
use crate::models::linear::{LinearRegressor, TrainedLinearModel};
use crate::models::sequence::{SequenceRegressor, TrainedSequenceModel, TrainingHistory};
use crate::models::{Regressor, WindowPredictor};
use crate::supervised::{make_examples, SupervisedSet};
use crate::utils::chronological_split;
use chrono::Duration;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Everything derived from the observations before training
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub interval: Duration,
    pub horizon_steps: usize,
    pub forecast_steps: usize,
    pub aligned: AlignedObservations,
    pub smoothed: SmoothedSeries,
    pub table: FeatureTable,
    pub feature_set: FeatureSet,
    pub examples: SupervisedSet,
}

/// Trained models, their metrics and the forecasts of one run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub prepared: PreparedData,
    pub linear: TrainedLinearModel,
    pub linear_evaluation: ModelEvaluation,
    pub sequence: TrainedSequenceModel,
    pub sequence_evaluation: ModelEvaluation,
    /// Forecast of the sequence model; its decision is the run's decision
    pub forecast: Forecast,
    /// Forecast of the linear baseline, for comparison
    pub baseline_forecast: Forecast,
}

#[derive(Serialize)]
struct MetricsReport<'a> {
    models: [&'a ModelEvaluation; 2],
    history: &'a TrainingHistory,
    horizon_steps: usize,
    interval_seconds: i64,
    smoothing_degraded: bool,
}

/// Pipeline driven by a validated configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline after validating the configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Align, smooth and derive features and examples
    pub fn prepare(&self, observations: &ObservationSet) -> Result<PreparedData> {
        let config = &self.config;
        let interval = config.resolve_interval(observations.sampling_interval()?)?;
        let aligned = observations.align(interval)?;
        let horizon_steps = config.horizon_steps(interval)?;
        let forecast_steps = config.forecast_steps(interval)?;

        let required = config
            .smoothing
            .window()
            .max(horizon_steps)
            .max(config.sequence.sequence_length);
        if aligned.len() <= required {
            return Err(ForecastError::InsufficientData(format!(
                "{} samples are not enough for smoothing window {}, horizon {} and sequence length {}; need more than {}",
                aligned.len(),
                config.smoothing.window(),
                horizon_steps,
                config.sequence.sequence_length,
                required
            )));
        }

        let smoothed = smooth(&aligned, config.smoothing)?;
        let table = build_features(&aligned, &smoothed, &config.features)?;
        let feature_set = config.resolve_feature_set(&table)?;
        let examples = make_examples(&table, &smoothed, horizon_steps, &feature_set)?;

        info!(
            rows = aligned.len(),
            imputed = aligned.imputed_count(),
            interval_s = interval.num_seconds(),
            horizon_steps,
            examples = examples.len(),
            features = %feature_set,
            "Prepared data"
        );

        Ok(PreparedData {
            interval,
            horizon_steps,
            forecast_steps,
            aligned,
            smoothed,
            table,
            feature_set,
            examples,
        })
    }

    /// Run the whole pipeline on a set of observations
    pub fn run(&self, observations: &ObservationSet) -> Result<PipelineRun> {
        let config = &self.config;
        let prepared = self.prepare(observations)?;
        let examples = &prepared.examples;

        let (train, test) = examples.split_chronological(config.test_fraction)?;
        let linear = LinearRegressor::new(config.ridge)?.train(&train)?;
        let linear_train = linear.predict(&train)?;
        let linear_test = linear.predict(&test)?;
        let linear_evaluation = ModelEvaluation::new(
            linear.name(),
            (train.targets(), linear_train.as_slice()),
            (test.targets(), linear_test.as_slice()),
        )?;
        info!("{}", linear_evaluation);

        let features = &prepared.feature_set;
        let windows = examples.sequence_windows(config.sequence.sequence_length)?;
        let (train_windows, test_windows) = chronological_split(&windows, config.test_fraction)?;
        let sequence = SequenceRegressor::new(config.sequence.clone())?.fit(&train_windows, features)?;
        let train_targets: Vec<f64> = train_windows.iter().map(|w| w.target).collect();
        let test_targets: Vec<f64> = test_windows.iter().map(|w| w.target).collect();
        let sequence_train = sequence.predict(&train_windows, features)?;
        let sequence_test = sequence.predict(&test_windows, features)?;
        let sequence_evaluation = ModelEvaluation::new(
            sequence.name(),
            (train_targets.as_slice(), sequence_train.as_slice()),
            (test_targets.as_slice(), sequence_test.as_slice()),
        )?;
        info!("{}", sequence_evaluation);

        let window = prepared
            .table
            .window(features, config.sequence.sequence_length)?;
        let baseline_forecast = forecast(
            &linear,
            &window,
            prepared.forecast_steps,
            prepared.interval,
            config.watering_threshold,
        )?;
        let sequence_forecast = forecast(
            &sequence,
            &window,
            prepared.forecast_steps,
            prepared.interval,
            config.watering_threshold,
        )?;

        Ok(PipelineRun {
            prepared,
            linear,
            linear_evaluation,
            sequence,
            sequence_evaluation,
            forecast: sequence_forecast,
            baseline_forecast,
        })
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}

impl PipelineRun {
    /// Write features, forecast, metrics, decision and models into `dir`
    pub fn write_artifacts<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        self.prepared.table.write_csv(dir.join("features.csv"))?;
        self.forecast.write_csv(dir.join("forecast.csv"))?;
        self.baseline_forecast.write_csv(dir.join("baseline_forecast.csv"))?;

        let report = MetricsReport {
            models: [&self.linear_evaluation, &self.sequence_evaluation],
            history: self.sequence.history(),
            horizon_steps: self.prepared.horizon_steps,
            interval_seconds: self.prepared.interval.num_seconds(),
            smoothing_degraded: self.prepared.smoothed.is_degraded(),
        };
        write_json(&dir.join("metrics.json"), &report)?;
        write_json(&dir.join("decision.json"), &self.forecast.decision)?;

        fs::write(dir.join("sequence_model.json"), self.sequence.save()?)?;
        fs::write(dir.join("linear_model.json"), self.linear.save()?)?;

        info!(dir = %dir.display(), "Wrote artifacts");
        Ok(())
    }
}
