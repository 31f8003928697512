use approx::assert_abs_diff_eq;
use moisture_forecast::error::ForecastError;
use moisture_forecast::metrics::{evaluate, ModelEvaluation};

#[test]
fn test_perfect_predictions() {
    let actual = vec![40.0, 42.5, 45.0, 41.0];
    let metrics = evaluate(&actual, &actual).unwrap();

    assert_eq!(metrics.mae, 0.0);
    assert_eq!(metrics.rmse, 0.0);
    assert_eq!(metrics.r2, Some(1.0));
    assert_eq!(metrics.samples, 4);
}

#[test]
fn test_known_errors() {
    let actual = vec![1.0, 2.0, 3.0];
    let predicted = vec![1.0, 2.0, 4.0];

    let metrics = evaluate(&actual, &predicted).unwrap();

    assert_abs_diff_eq!(metrics.mae, 1.0 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(metrics.rmse, (1.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(metrics.r2.unwrap(), 0.5, epsilon = 1e-12);
}

#[test]
fn test_r2_can_be_negative() {
    let actual = vec![1.0, 2.0, 3.0];
    let predicted = vec![3.0, 2.0, 1.0];

    let metrics = evaluate(&actual, &predicted).unwrap();
    assert_abs_diff_eq!(metrics.r2.unwrap(), -3.0, epsilon = 1e-12);
}

#[test]
fn test_r2_undefined_for_constant_targets() {
    let metrics = evaluate(&[50.0, 50.0, 50.0], &[49.0, 50.0, 51.0]).unwrap();

    assert_eq!(metrics.r2, None);
    assert!(metrics.to_string().contains("undefined"));
    assert_abs_diff_eq!(metrics.mae, 2.0 / 3.0, epsilon = 1e-12);
}

#[test]
fn test_invalid_inputs() {
    match evaluate(&[], &[]) {
        Err(ForecastError::ValidationError(message)) => assert!(message.contains("empty")),
        other => panic!("Expected ValidationError, got {:?}", other),
    }
    assert!(evaluate(&[1.0, 2.0], &[1.0]).is_err());

    match evaluate(&[1.0, 2.0], &[1.0, f64::NAN]) {
        Err(ForecastError::ValidationError(message)) => {
            assert!(message.contains("predicted"));
            assert!(message.contains("position 1"));
        }
        other => panic!("Expected ValidationError, got {:?}", other),
    }
}

#[test]
fn test_model_evaluation_display() {
    let evaluation = ModelEvaluation::new(
        "Linear Regression",
        (&[1.0, 2.0, 3.0][..], &[1.0, 2.0, 3.0][..]),
        (&[4.0, 5.0][..], &[4.5, 5.5][..]),
    )
    .unwrap();

    let text = evaluation.to_string();
    assert!(text.starts_with("Linear Regression Performance:"));
    assert!(text.contains("Train: MAE 0.0000"));
    assert!(text.contains("Test:  MAE 0.5000"));
    assert_eq!(evaluation.test.samples, 2);
}
