//! Synthetic drying-soil telemetry for demos and tests

use crate::data::{Observation, ObservationSet};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;
use tracing::info;

/// Parameters of the simulated sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub start: DateTime<Utc>,
    pub samples: usize,
    pub interval_minutes: i64,
    /// Moisture at the first sample before noise
    pub moisture_start: f64,
    /// Moisture at the last sample before noise
    pub moisture_end: f64,
    pub moisture_noise: f64,
    pub temperature_noise: f64,
    pub humidity_noise: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().unwrap_or_default(),
            samples: 96,
            interval_minutes: 30,
            moisture_start: 80.0,
            moisture_end: 20.0,
            moisture_noise: 5.0,
            temperature_noise: 1.0,
            humidity_noise: 3.0,
            seed: 42,
        }
    }
}

fn linspace(from: f64, to: f64, count: usize, index: usize) -> f64 {
    if count < 2 {
        from
    } else {
        from + (to - from) * index as f64 / (count - 1) as f64
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn normal(std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(0.0, std_dev)
        .map_err(|e| ForecastError::InvalidParameter(format!("Noise level {}: {}", std_dev, e)))
}

/// Generate a drying series: a linear moisture decline with Gaussian noise
/// clipped to [0, 100], temperature `20 + 3 sin` over two cycles and humidity
/// `50 + 10 sin` over one cycle, each with noise. Values have two decimals.
pub fn simulate(config: &SimulationConfig) -> Result<ObservationSet> {
    if config.samples == 0 || config.interval_minutes <= 0 {
        return Err(ForecastError::InvalidParameter(
            "Simulation needs a positive sample count and interval".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let moisture_noise = normal(config.moisture_noise)?;
    let temperature_noise = normal(config.temperature_noise)?;
    let humidity_noise = normal(config.humidity_noise)?;
    let interval = Duration::minutes(config.interval_minutes);
    let n = config.samples;

    let observations = (0..n)
        .map(|i| {
            let timestamp = config.start + interval * i as i32;
            let base = linspace(config.moisture_start, config.moisture_end, n, i);
            let moisture = (base + moisture_noise.sample(&mut rng)).clamp(0.0, 100.0);
            let temperature =
                20.0 + 3.0 * linspace(0.0, 4.0 * PI, n, i).sin() + temperature_noise.sample(&mut rng);
            let humidity =
                50.0 + 10.0 * linspace(0.0, 2.0 * PI, n, i).sin() + humidity_noise.sample(&mut rng);

            Observation::new(timestamp, round2(moisture)).with_climate(round2(temperature), round2(humidity))
        })
        .collect();

    info!(samples = n, seed = config.seed, "Simulated sensor telemetry");
    ObservationSet::new(observations)
}

#[derive(Serialize)]
struct CsvRow {
    timestamp: String,
    moisture: f64,
    temperature: Option<f64>,
    humidity: Option<f64>,
}

/// Write observations as `timestamp,moisture,temperature,humidity` CSV
pub fn write_observations_csv<P: AsRef<Path>>(observations: &ObservationSet, path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for observation in observations.observations() {
        writer.serialize(CsvRow {
            timestamp: observation.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            moisture: observation.moisture,
            temperature: observation.temperature,
            humidity: observation.humidity,
        })?;
    }
    writer.flush()?;
    Ok(())
}
