use chrono::{Duration, TimeZone, Utc};
use moisture_forecast::data::{parse_timestamp, DataLoader, Observation, ObservationSet};
use moisture_forecast::error::ForecastError;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::io::Write;
use tempfile::NamedTempFile;

fn at(minutes: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn csv_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

#[test]
fn test_data_loader_from_csv() {
    let file = csv_file(&[
        "timestamp,moisture,temperature,humidity",
        "2024-01-01 01:00:00,70.5,20.1,55.0",
        "2024-01-01 00:00:00,72.0,19.8,54.2",
        "2024-01-01 00:30:00,71.2,19.9,54.8",
    ]);

    let data = DataLoader::from_csv(file.path()).unwrap();

    assert_eq!(data.len(), 3);
    assert_eq!(data.timestamps(), vec![at(0), at(30), at(60)]);
    assert_eq!(data.moisture(), vec![72.0, 71.2, 70.5]);
    assert_eq!(data.observations()[0].temperature, Some(19.8));
    assert_eq!(data.observations()[2].humidity, Some(55.0));
}

#[test]
fn test_column_names_are_case_insensitive() {
    let file = csv_file(&[
        "Timestamp,MOISTURE",
        "2024-01-01T00:00:00Z,60",
        "2024-01-01T00:30:00Z,59",
    ]);

    let data = DataLoader::from_csv(file.path()).unwrap();
    assert_eq!(data.moisture(), vec![60.0, 59.0]);
    assert!(data.observations().iter().all(|o| o.temperature.is_none()));
}

#[test]
fn test_missing_moisture_column() {
    let file = csv_file(&["timestamp,temperature", "2024-01-01 00:00:00,20.0"]);

    match DataLoader::from_csv(file.path()) {
        Err(ForecastError::DataError(message)) => assert!(message.contains("moisture")),
        other => panic!("Expected DataError, got {:?}", other),
    }
}

#[test]
fn test_unparseable_timestamp_names_row() {
    let file = csv_file(&[
        "timestamp,moisture",
        "2024-01-01 00:00:00,60",
        "yesterday,59",
    ]);

    match DataLoader::from_csv(file.path()) {
        Err(ForecastError::DataError(message)) => {
            assert!(message.contains("Row 2"));
            assert!(message.contains("yesterday"));
        }
        other => panic!("Expected DataError, got {:?}", other),
    }
}

#[test]
fn test_missing_moisture_value_names_row() {
    let file = csv_file(&[
        "timestamp,moisture",
        "2024-01-01 00:00:00,60",
        "2024-01-01 00:30:00,",
        "2024-01-01 01:00:00,58",
    ]);

    match DataLoader::from_csv(file.path()) {
        Err(ForecastError::DataError(message)) => {
            assert!(message.contains("Row 2"));
            assert!(message.contains("moisture"));
        }
        other => panic!("Expected DataError, got {:?}", other),
    }
}

#[test]
fn test_duplicate_timestamps_rejected() {
    let file = csv_file(&[
        "timestamp,moisture",
        "2024-01-01 00:00:00,60",
        "2024-01-01 00:30:00,59",
        "2024-01-01 00:00:00,61",
    ]);

    match DataLoader::from_csv(file.path()) {
        Err(ForecastError::DataError(message)) => {
            assert!(message.contains("Duplicate timestamp"));
            assert!(message.contains("rows 1 and 3"));
        }
        other => panic!("Expected DataError, got {:?}", other),
    }
}

#[test]
fn test_nonexistent_file() {
    let result = DataLoader::from_csv("nonexistent_file.csv");
    assert!(result.is_err());
}

#[test]
fn test_from_dataframe() {
    let df = df!(
        "timestamp" => &["2024-01-01 00:00:00", "2024-01-01 00:30:00"],
        "moisture" => &[55.0, 54.5],
        "humidity" => &[40.0, 41.0]
    )
    .unwrap();

    let data = DataLoader::from_dataframe(&df).unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data.observations()[1].humidity, Some(41.0));
    assert_eq!(data.observations()[1].temperature, None);
}

#[test]
fn test_non_finite_moisture_rejected() {
    let observations = vec![Observation::new(at(0), 50.0), Observation::new(at(30), f64::NAN)];
    assert!(matches!(
        ObservationSet::new(observations),
        Err(ForecastError::DataError(_))
    ));
}

#[rstest]
#[case("2024-03-05T06:30:00Z")]
#[case("2024-03-05T07:30:00+01:00")]
#[case("2024-03-05 06:30:00")]
#[case("2024-03-05T06:30:00")]
#[case("2024-03-05 06:30")]
fn test_parse_timestamp_formats(#[case] text: &str) {
    let expected = Utc.with_ymd_and_hms(2024, 3, 5, 6, 30, 0).unwrap();
    assert_eq!(parse_timestamp(text), Some(expected));
}

#[test]
fn test_parse_timestamp_date_only_and_garbage() {
    assert_eq!(
        parse_timestamp("2024-03-05"),
        Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap())
    );
    assert_eq!(parse_timestamp("not a time"), None);
}

#[test]
fn test_sampling_interval_is_median_spacing() {
    let observations = [0, 30, 60, 90, 100, 130]
        .iter()
        .map(|&m| Observation::new(at(m), 50.0))
        .collect();
    let set = ObservationSet::new(observations).unwrap();

    assert_eq!(set.sampling_interval().unwrap(), Duration::minutes(30));
}

#[test]
fn test_sampling_interval_needs_two_observations() {
    let set = ObservationSet::new(vec![Observation::new(at(0), 50.0)]).unwrap();
    assert!(matches!(
        set.sampling_interval(),
        Err(ForecastError::InsufficientData(_))
    ));
}

#[test]
fn test_align_inserts_missing_slots() {
    let set = ObservationSet::new(vec![
        Observation::new(at(0), 50.0),
        Observation::new(at(30), 49.0),
        Observation::new(at(90), 47.0),
    ])
    .unwrap();

    let aligned = set.align(Duration::minutes(30)).unwrap();

    assert_eq!(aligned.len(), 4);
    assert_eq!(aligned.imputed(), &[false, false, true, false]);
    assert_eq!(aligned.moisture(), &[Some(50.0), Some(49.0), None, Some(47.0)]);
    assert_eq!(aligned.timestamps()[2], at(60));
    assert_eq!(aligned.imputed_count(), 1);
    assert!(aligned.temperature().is_none());
}

#[test]
fn test_align_keeps_jittered_timestamps() {
    let set = ObservationSet::new(vec![
        Observation::new(at(0), 50.0),
        Observation::new(at(31), 49.0),
        Observation::new(at(59), 48.0),
    ])
    .unwrap();

    let aligned = set.align(Duration::minutes(30)).unwrap();
    assert_eq!(aligned.len(), 3);
    assert_eq!(aligned.timestamps(), &[at(0), at(31), at(59)]);
    assert_eq!(aligned.imputed_count(), 0);
}

#[test]
fn test_align_rejects_two_readings_in_one_slot() {
    let set = ObservationSet::new(vec![
        Observation::new(at(0), 50.0),
        Observation::new(at(25), 49.0),
        Observation::new(at(35), 48.0),
    ])
    .unwrap();

    assert!(matches!(
        set.align(Duration::minutes(30)),
        Err(ForecastError::DataError(_))
    ));
}

#[test]
fn test_align_carries_covariates() {
    let set = ObservationSet::new(vec![
        Observation::new(at(0), 50.0).with_climate(20.0, 60.0),
        Observation::new(at(60), 49.0).with_climate(21.0, 58.0),
    ])
    .unwrap();

    let aligned = set.align(Duration::minutes(30)).unwrap();
    assert_eq!(aligned.temperature().unwrap(), &[Some(20.0), None, Some(21.0)]);
    assert_eq!(aligned.humidity().unwrap(), &[Some(60.0), None, Some(58.0)]);
}
