use approx::assert_abs_diff_eq;
use chrono::{Duration, TimeZone, Utc};
use moisture_forecast::data::{AlignedObservations, Observation, ObservationSet};
use moisture_forecast::denoise::{smooth, smooth_values, SmoothingMethod};
use moisture_forecast::error::ForecastError;
use rstest::rstest;

fn aligned(values: &[Option<f64>]) -> AlignedObservations {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let observations = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| Observation::new(start + Duration::minutes(30 * i as i64), v)))
        .collect();
    ObservationSet::new(observations)
        .unwrap()
        .align(Duration::minutes(30))
        .unwrap()
}

fn noisy() -> Vec<Option<f64>> {
    [62.0, 60.5, 64.0, 58.0, 59.5, 57.0, 61.0, 55.5, 54.0, 56.5, 52.0, 51.5]
        .iter()
        .map(|&v| Some(v))
        .collect()
}

#[rstest]
#[case(3)]
#[case(4)]
#[case(5)]
#[case(7)]
fn test_median_filter_stays_within_range(#[case] window: usize) {
    let data = aligned(&noisy());
    let smoothed = smooth(&data, SmoothingMethod::Median { window }).unwrap();

    assert_eq!(smoothed.len(), data.len());
    assert_eq!(smoothed.timestamps(), data.timestamps());
    for value in smoothed.values() {
        let value = value.unwrap();
        assert!((51.5..=64.0).contains(&value));
    }
}

#[test]
fn test_moving_average_uses_partial_windows_at_edges() {
    let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0, 5.0].iter().map(|&v| Some(v)).collect();
    let (smoothed, applied) = smooth_values(&values, SmoothingMethod::MovingAverage { window: 3 }).unwrap();

    assert_eq!(applied, SmoothingMethod::MovingAverage { window: 3 });
    let expected = [1.5, 2.0, 3.0, 4.0, 4.5];
    for (got, want) in smoothed.iter().zip(expected) {
        assert_abs_diff_eq!(got.unwrap(), want, epsilon = 1e-12);
    }
}

#[test]
fn test_savitzky_golay_preserves_quadratic() {
    let values: Vec<Option<f64>> = (0..15)
        .map(|i| {
            let x = i as f64;
            Some(70.0 - 0.8 * x + 0.05 * x * x)
        })
        .collect();
    let data = aligned(&values);

    let smoothed = smooth(&data, SmoothingMethod::SavitzkyGolay { window: 5, order: 2 }).unwrap();

    assert!(!smoothed.is_degraded());
    for (got, want) in smoothed.values().iter().zip(&values) {
        assert_abs_diff_eq!(got.unwrap(), want.unwrap(), epsilon = 1e-9);
    }
}

#[test]
fn test_savitzky_golay_falls_back_on_gaps() {
    let mut values = noisy();
    values[4] = None;
    let data = aligned(&values);
    assert_eq!(data.imputed_count(), 1);

    let smoothed = smooth(&data, SmoothingMethod::default()).unwrap();

    assert!(smoothed.is_degraded());
    assert_eq!(smoothed.requested_method(), SmoothingMethod::SavitzkyGolay { window: 5, order: 2 });
    assert_eq!(smoothed.applied_method(), SmoothingMethod::MovingAverage { window: 5 });
    assert!(smoothed.values().iter().all(|v| v.is_some()));
}

#[test]
fn test_savitzky_golay_falls_back_on_short_series() {
    let data = aligned(&[Some(50.0), Some(49.0), Some(48.5)]);
    let smoothed = smooth(&data, SmoothingMethod::SavitzkyGolay { window: 7, order: 3 }).unwrap();

    assert!(smoothed.is_degraded());
    assert_eq!(smoothed.len(), 3);
}

#[rstest]
#[case(SmoothingMethod::MovingAverage { window: 2 })]
#[case(SmoothingMethod::Median { window: 1 })]
#[case(SmoothingMethod::SavitzkyGolay { window: 6, order: 2 })]
#[case(SmoothingMethod::SavitzkyGolay { window: 3, order: 3 })]
fn test_invalid_parameters_rejected(#[case] method: SmoothingMethod) {
    let data = aligned(&noisy());
    match smooth(&data, method) {
        Err(ForecastError::ConfigError(_)) => assert!(true),
        other => panic!("Expected ConfigError, got {:?}", other),
    }
}

#[test]
fn test_method_display() {
    assert_eq!(
        SmoothingMethod::default().to_string(),
        "Savitzky-Golay (window 5, order 2)"
    );
    assert_eq!(
        SmoothingMethod::Median { window: 5 }.to_string(),
        "median filter (window 5)"
    );
}
