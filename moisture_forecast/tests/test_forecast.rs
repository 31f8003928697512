use chrono::{DateTime, Duration, TimeZone, Utc};
use moisture_forecast::error::{ForecastError, Result};
use moisture_forecast::features::{FeatureColumn, FeatureSet, FeatureWindow};
use moisture_forecast::forecast::{decide, forecast, ForecastPoint, WateringDecision};
use moisture_forecast::models::WindowPredictor;
use pretty_assertions::assert_eq;

/// Predicts one unit below the newest smoothed moisture
#[derive(Debug)]
struct Decrement {
    features: FeatureSet,
}

impl WindowPredictor for Decrement {
    fn name(&self) -> &str {
        "decrement"
    }

    fn features(&self) -> &FeatureSet {
        &self.features
    }

    fn window_length(&self) -> usize {
        2
    }

    fn predict_window(&self, window: &FeatureWindow) -> Result<f64> {
        assert_eq!(window.len(), 2);
        Ok(window.last_row()[0] - 1.0)
    }
}

/// Predicts the hour column of the newest row
#[derive(Debug)]
struct EchoHour {
    features: FeatureSet,
}

impl WindowPredictor for EchoHour {
    fn name(&self) -> &str {
        "echo hour"
    }

    fn features(&self) -> &FeatureSet {
        &self.features
    }

    fn window_length(&self) -> usize {
        1
    }

    fn predict_window(&self, window: &FeatureWindow) -> Result<f64> {
        Ok(window.last_row()[1])
    }
}

fn features() -> FeatureSet {
    FeatureSet::new(vec![FeatureColumn::Moisture, FeatureColumn::Hour]).unwrap()
}

fn time(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 12, hour, minute, 0).unwrap()
}

/// Three rows at 09:00, 09:30 and 10:00 with moisture 50, 49, 48
fn window() -> FeatureWindow {
    FeatureWindow::new(
        features(),
        vec![time(9, 0), time(9, 30), time(10, 0)],
        vec![vec![50.0, 9.0], vec![49.0, 9.0], vec![48.0, 10.0]],
    )
    .unwrap()
}

#[test]
fn test_predictions_feed_back_into_window() {
    let model = Decrement { features: features() };
    let result = forecast(&model, &window(), 4, Duration::minutes(30), 30.0).unwrap();

    assert_eq!(result.values(), vec![47.0, 46.0, 45.0, 44.0]);
    assert_eq!(result.model, "decrement");
}

#[test]
fn test_calendar_columns_follow_forecast_time() {
    let model = EchoHour { features: features() };
    let result = forecast(&model, &window(), 3, Duration::minutes(30), 0.0).unwrap();

    // The first step sees the last observed row, later steps the synthetic ones
    assert_eq!(result.values(), vec![10.0, 10.0, 11.0]);
}

#[test]
fn test_forecast_timestamps() {
    let model = Decrement { features: features() };
    let result = forecast(&model, &window(), 3, Duration::minutes(30), 30.0).unwrap();

    assert_eq!(result.timestamps(), vec![time(10, 30), time(11, 0), time(11, 30)]);
}

#[test]
fn test_forecast_is_deterministic() {
    let model = Decrement { features: features() };
    let first = forecast(&model, &window(), 12, Duration::minutes(30), 40.0).unwrap();
    let second = forecast(&model, &window(), 12, Duration::minutes(30), 40.0).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_forecast_triggers_watering() {
    let model = Decrement { features: features() };
    let result = forecast(&model, &window(), 4, Duration::minutes(30), 45.5).unwrap();

    assert_eq!(
        result.decision,
        WateringDecision {
            needs_watering: true,
            trigger_time: Some(time(12, 0)),
            minimum_value: 44.0,
            threshold: 45.5,
        }
    );
    assert!(result.decision.to_string().starts_with("Watering needed"));
}

#[test]
fn test_forecast_validation() {
    let model = Decrement { features: features() };

    assert!(matches!(
        forecast(&model, &window(), 0, Duration::minutes(30), 30.0),
        Err(ForecastError::InvalidParameter(_))
    ));
    assert!(matches!(
        forecast(&model, &window(), 3, Duration::minutes(30), f64::NAN),
        Err(ForecastError::InvalidParameter(_))
    ));

    let short = window().tail(1).unwrap();
    assert!(matches!(
        forecast(&model, &short, 3, Duration::minutes(30), 30.0),
        Err(ForecastError::InsufficientData(_))
    ));

    let other = Decrement {
        features: FeatureSet::new(vec![FeatureColumn::Moisture, FeatureColumn::DayOfWeek]).unwrap(),
    };
    match forecast(&other, &window(), 3, Duration::minutes(30), 30.0) {
        Err(ForecastError::ColumnMismatch { expected, actual }) => {
            assert_eq!(expected, "moisture_smooth, day_of_week");
            assert_eq!(actual, "moisture_smooth, hour");
        }
        other => panic!("Expected ColumnMismatch, got {:?}", other),
    }
}

fn points(values: &[f64]) -> Vec<ForecastPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| ForecastPoint {
            timestamp: time(0, 0) + Duration::hours(i as i64),
            predicted_moisture: v,
        })
        .collect()
}

#[test]
fn test_decision_on_constant_forecast() {
    let constant = points(&[50.0; 6]);

    let above = decide(&constant, 40.0).unwrap();
    assert!(!above.needs_watering);
    assert_eq!(above.trigger_time, None);
    assert_eq!(above.minimum_value, 50.0);

    let below = decide(&constant, 60.0).unwrap();
    assert!(below.needs_watering);
    assert_eq!(below.trigger_time, Some(time(0, 0)));
}

#[test]
fn test_decision_uses_first_minimum() {
    let decision = decide(&points(&[35.0, 28.0, 31.0, 28.0, 33.0]), 30.0).unwrap();

    assert!(decision.needs_watering);
    assert_eq!(decision.minimum_value, 28.0);
    assert_eq!(decision.trigger_time, Some(time(1, 0)));
}

#[test]
fn test_decision_at_threshold_is_not_triggered() {
    let decision = decide(&points(&[32.0, 30.0]), 30.0).unwrap();
    assert!(!decision.needs_watering);
    assert!(decision.to_string().contains("not below threshold 30.00"));
}

#[test]
fn test_decision_needs_points() {
    assert!(matches!(
        decide(&[], 30.0),
        Err(ForecastError::InsufficientData(_))
    ));
}

#[test]
fn test_forecast_csv() {
    let model = Decrement { features: features() };
    let result = forecast(&model, &window(), 5, Duration::minutes(30), 30.0).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forecast.csv");
    result.write_csv(&path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "timestamp,predicted_moisture");
    assert!(lines[1].ends_with(",47.0"));
}
