use chrono::{Duration, TimeZone, Utc};
use moisture_forecast::data::{Observation, ObservationSet};
use moisture_forecast::denoise::{smooth, SmoothedSeries, SmoothingMethod};
use moisture_forecast::error::ForecastError;
use moisture_forecast::features::{build_features, FeatureColumn, FeatureConfig, FeatureSet, FeatureTable};
use moisture_forecast::supervised::make_examples;
use rstest::rstest;

/// Feature table and smoothed target for readings in the given 30-minute slots
fn prepared(slots: &[i64]) -> (FeatureTable, SmoothedSeries) {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let observations = slots
        .iter()
        .map(|&slot| Observation::new(start + Duration::minutes(30 * slot), 90.0 - slot as f64 * 1.5))
        .collect();
    let aligned = ObservationSet::new(observations)
        .unwrap()
        .align(Duration::minutes(30))
        .unwrap();
    let smoothed = smooth(&aligned, SmoothingMethod::MovingAverage { window: 3 }).unwrap();
    let table = build_features(&aligned, &smoothed, &FeatureConfig::default()).unwrap();
    (table, smoothed)
}

fn moisture_only() -> FeatureSet {
    FeatureSet::new(vec![FeatureColumn::Moisture, FeatureColumn::Hour]).unwrap()
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(5)]
fn test_example_count_is_rows_minus_horizon(#[case] horizon: usize) {
    let slots: Vec<i64> = (0..20).collect();
    let (table, smoothed) = prepared(&slots);

    let examples = make_examples(&table, &smoothed, horizon, &moisture_only()).unwrap();

    assert_eq!(examples.len(), 20 - horizon);
    assert_eq!(examples.horizon(), horizon);
    for (i, &target) in examples.targets().iter().enumerate() {
        assert_eq!(Some(target), smoothed.values()[i + horizon]);
    }
    assert_eq!(examples.timestamps()[0], table.timestamps()[0]);
}

#[test]
fn test_examples_with_imputed_targets_are_dropped() {
    let slots: Vec<i64> = (0..21).filter(|&s| s != 10).collect();
    let (table, smoothed) = prepared(&slots);
    assert_eq!(table.len(), 21);

    let examples = make_examples(&table, &smoothed, 1, &moisture_only()).unwrap();

    assert_eq!(examples.len(), 19);
    assert!(!examples.row_indices().contains(&9));
    assert!(examples.row_indices().contains(&10));
}

#[test]
fn test_horizon_validation() {
    let slots: Vec<i64> = (0..6).collect();
    let (table, smoothed) = prepared(&slots);

    assert!(matches!(
        make_examples(&table, &smoothed, 0, &moisture_only()),
        Err(ForecastError::InvalidParameter(_))
    ));
    assert!(matches!(
        make_examples(&table, &smoothed, 6, &moisture_only()),
        Err(ForecastError::InsufficientData(_))
    ));
}

#[test]
fn test_chronological_split_keeps_order() {
    let slots: Vec<i64> = (0..30).collect();
    let (table, smoothed) = prepared(&slots);
    let examples = make_examples(&table, &smoothed, 2, &moisture_only()).unwrap();

    let (train, test) = examples.split_chronological(0.2).unwrap();

    // ceil(28 * 0.2) = 6
    assert_eq!(test.len(), 6);
    assert_eq!(train.len() + test.len(), examples.len());
    assert!(train.timestamps().last().unwrap() < test.timestamps().first().unwrap());
    assert_eq!(&examples.targets()[22..], test.targets());
}

#[test]
fn test_degenerate_split() {
    let slots: Vec<i64> = (0..4).collect();
    let (table, smoothed) = prepared(&slots);
    let examples = make_examples(&table, &smoothed, 2, &moisture_only()).unwrap();
    assert_eq!(examples.len(), 2);

    match examples.split_chronological(0.9) {
        Err(ForecastError::DegenerateSplit(_)) => assert!(true),
        other => panic!("Expected DegenerateSplit, got {:?}", other),
    }
}

#[test]
fn test_sequence_windows_over_contiguous_rows() {
    let slots: Vec<i64> = (0..20).collect();
    let (table, smoothed) = prepared(&slots);
    let examples = make_examples(&table, &smoothed, 1, &moisture_only()).unwrap();

    let windows = examples.sequence_windows(4).unwrap();

    assert_eq!(windows.len(), examples.len() - 4);
    let first = &windows[0];
    assert_eq!(first.rows, examples.rows()[0..4].to_vec());
    assert_eq!(first.target, examples.targets()[4]);
    assert_eq!(first.timestamp, examples.timestamps()[3]);
}

#[test]
fn test_sequence_windows_do_not_span_gaps() {
    let slots: Vec<i64> = (0..21).filter(|&s| s != 10).collect();
    let (table, smoothed) = prepared(&slots);
    let examples = make_examples(&table, &smoothed, 1, &moisture_only()).unwrap();

    let windows = examples.sequence_windows(3).unwrap();

    // Runs of 9 and 10 consecutive examples give 6 and 7 windows
    assert_eq!(windows.len(), 13);
}

#[test]
fn test_sequence_windows_need_enough_examples() {
    let slots: Vec<i64> = (0..6).collect();
    let (table, smoothed) = prepared(&slots);
    let examples = make_examples(&table, &smoothed, 1, &moisture_only()).unwrap();

    assert!(matches!(
        examples.sequence_windows(5),
        Err(ForecastError::InsufficientData(_))
    ));
    assert!(examples.sequence_windows(0).is_err());
}
