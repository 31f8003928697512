use approx::assert_abs_diff_eq;
use chrono::{Duration, TimeZone, Utc};
use moisture_forecast::analysis::{analyse, ColumnSummary};
use moisture_forecast::data::{DataLoader, Observation, ObservationSet};
use moisture_forecast::simulate::{simulate, write_observations_csv, SimulationConfig};

#[test]
fn test_column_summary_moments() {
    let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0, 5.0].iter().map(|&v| Some(v)).collect();
    let summary = ColumnSummary::from_values("moisture", &values).unwrap();

    assert_eq!(summary.count, 5);
    assert_abs_diff_eq!(summary.mean, 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(summary.variance.unwrap(), 2.5, epsilon = 1e-12);
    assert_abs_diff_eq!(summary.std_dev.unwrap(), 2.5f64.sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(summary.skewness.unwrap(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(summary.kurtosis.unwrap(), -1.2, epsilon = 1e-12);
    assert_eq!(summary.median, 3.0);
    assert_eq!(summary.range, 4.0);
}

#[test]
fn test_column_summary_skips_missing() {
    let summary = ColumnSummary::from_values("humidity", &[Some(10.0), None, Some(20.0)]).unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.skewness, None);
    assert_eq!(summary.kurtosis, None);

    assert!(ColumnSummary::from_values("humidity", &[None, None]).is_none());
}

#[test]
fn test_constant_column_has_no_shape_statistics() {
    let summary = ColumnSummary::from_values("moisture", &[Some(50.0); 6]).unwrap();
    assert_eq!(summary.variance, Some(0.0));
    assert_eq!(summary.skewness, None);
    assert_eq!(summary.kurtosis, None);
}

#[test]
fn test_report_on_simulated_data() {
    let observations = simulate(&SimulationConfig::default()).unwrap();
    let aligned = observations.align(Duration::minutes(30)).unwrap();

    let report = analyse(&aligned, Duration::hours(6)).unwrap();

    assert_eq!(report.records, 96);
    assert_eq!(report.imputed_slots, 0);
    assert_eq!(report.interval_seconds, 1800);
    assert_eq!(report.columns.len(), 3);
    for column in &report.columns {
        assert!(column.min <= column.lower_quartile);
        assert!(column.lower_quartile <= column.median);
        assert!(column.median <= column.upper_quartile);
        assert!(column.upper_quartile <= column.max);
    }
    assert!(report.mean_change_per_sample.unwrap() < 0.0);
    assert!(report.max_drop.unwrap() > 0.0);

    let text = report.to_string();
    assert!(text.contains("Soil Telemetry Report"));
    assert!(text.contains("temperature:"));
}

#[test]
fn test_max_drop_over_window() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let values = [60.0, 58.0, 50.0, 49.0, 52.0, 51.0];
    let observations = values
        .iter()
        .enumerate()
        .map(|(i, &v)| Observation::new(start + Duration::hours(i as i64), v))
        .collect();
    let aligned = ObservationSet::new(observations)
        .unwrap()
        .align(Duration::hours(1))
        .unwrap();

    // Three-sample windows: 60 -> 50 is the largest drop
    let report = analyse(&aligned, Duration::hours(3)).unwrap();
    assert_eq!(report.max_drop, Some(10.0));
    assert_eq!(report.first_moisture, Some(60.0));
    assert_eq!(report.last_moisture, Some(51.0));
}

#[test]
fn test_simulation_is_reproducible() {
    let config = SimulationConfig::default();
    let first = simulate(&config).unwrap();
    let second = simulate(&config).unwrap();
    assert_eq!(first.observations(), second.observations());

    let other = simulate(&SimulationConfig { seed: 1, ..config }).unwrap();
    assert_ne!(first.moisture(), other.moisture());

    assert_eq!(first.len(), 96);
    assert_eq!(first.sampling_interval().unwrap(), Duration::minutes(30));
    for value in first.moisture() {
        assert!((0.0..=100.0).contains(&value));
        assert_abs_diff_eq!(value * 100.0, (value * 100.0).round(), epsilon = 1e-6);
    }
}

#[test]
fn test_simulated_csv_loads_back() {
    let observations = simulate(&SimulationConfig {
        samples: 12,
        ..SimulationConfig::default()
    })
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("simulated.csv");
    write_observations_csv(&observations, &path).unwrap();

    let loaded = DataLoader::from_csv(&path).unwrap();
    assert_eq!(loaded.len(), 12);
    assert_eq!(loaded.timestamps(), observations.timestamps());
    assert_eq!(loaded.moisture(), observations.moisture());
}
