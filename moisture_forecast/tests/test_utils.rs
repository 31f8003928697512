use chrono::{Duration, TimeZone, Utc};
use moisture_forecast::error::ForecastError;
use moisture_forecast::utils::{chronological_split, future_timestamps, hours, samples_for_duration};
use rstest::rstest;

#[rstest]
#[case(10, 0.2, 8, 2)]
#[case(10, 0.25, 7, 3)]
#[case(7, 0.1, 6, 1)]
fn test_chronological_split_sizes(
    #[case] len: usize,
    #[case] fraction: f64,
    #[case] train_len: usize,
    #[case] test_len: usize,
) {
    let items: Vec<usize> = (0..len).collect();
    let (train, test) = chronological_split(&items, fraction).unwrap();

    assert_eq!(train.len(), train_len);
    assert_eq!(test.len(), test_len);
    assert_eq!(train.last().unwrap() + 1, test[0]);
}

#[test]
fn test_chronological_split_errors() {
    let items = vec![1, 2, 3];

    assert!(matches!(
        chronological_split(&items, 0.0),
        Err(ForecastError::InvalidParameter(_))
    ));
    assert!(matches!(
        chronological_split(&items, 1.0),
        Err(ForecastError::InvalidParameter(_))
    ));
    assert!(matches!(
        chronological_split(&items[..1], 0.5),
        Err(ForecastError::DegenerateSplit(_))
    ));
    assert!(matches!(
        chronological_split::<i32>(&[], 0.5),
        Err(ForecastError::DegenerateSplit(_))
    ));
}

#[test]
fn test_future_timestamps() {
    let last = Utc.with_ymd_and_hms(2024, 2, 28, 23, 30, 0).unwrap();
    let timestamps = future_timestamps(last, 3, Duration::minutes(30)).unwrap();

    assert_eq!(
        timestamps,
        vec![
            Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 0, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 1, 0, 0).unwrap(),
        ]
    );
    assert!(future_timestamps(last, 3, Duration::zero()).is_err());
}

#[test]
fn test_samples_for_duration() {
    assert_eq!(samples_for_duration(Duration::hours(12), Duration::minutes(30)).unwrap(), 24);
    assert_eq!(samples_for_duration(Duration::minutes(50), Duration::minutes(30)).unwrap(), 2);
    assert_eq!(samples_for_duration(Duration::minutes(5), Duration::minutes(30)).unwrap(), 1);
    assert!(samples_for_duration(Duration::hours(1), Duration::zero()).is_err());
}

#[test]
fn test_hours() {
    assert_eq!(hours(1.5).unwrap(), Duration::minutes(90));
    assert!(hours(0.0).is_err());
    assert!(hours(f64::NAN).is_err());
}
