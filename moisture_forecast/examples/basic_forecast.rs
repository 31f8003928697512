use moisture_forecast::data::ObservationSet;
use moisture_forecast::denoise::{smooth, SmoothingMethod};
use moisture_forecast::features::{build_features, FeatureConfig, FeatureSet};
use moisture_forecast::forecast::{forecast, DEFAULT_THRESHOLD};
use moisture_forecast::metrics::evaluate;
use moisture_forecast::models::linear::LinearRegressor;
use moisture_forecast::models::Regressor;
use moisture_forecast::simulate::{simulate, SimulationConfig};
use moisture_forecast::supervised::make_examples;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Moisture Forecast: Basic Forecasting Example");
    println!("============================================\n");

    // Two days of a drying pot, sampled every 30 minutes
    let observations: ObservationSet = simulate(&SimulationConfig::default())?;
    let interval = observations.sampling_interval()?;
    let aligned = observations.align(interval)?;
    println!(
        "Sample data created: {} readings every {} minutes\n",
        aligned.len(),
        interval.num_minutes()
    );

    // Compare the smoothing methods on the same readings
    println!("Smoothing...");
    for method in [
        SmoothingMethod::MovingAverage { window: 5 },
        SmoothingMethod::Median { window: 5 },
        SmoothingMethod::SavitzkyGolay { window: 5, order: 2 },
    ] {
        let smoothed = smooth(&aligned, method)?;
        let last = smoothed.values().iter().flatten().last().copied().unwrap_or(f64::NAN);
        println!("  {:<36} last value {:.2}", method.to_string(), last);
    }

    // Features and examples six hours ahead
    let smoothed = smooth(&aligned, SmoothingMethod::default())?;
    let table = build_features(&aligned, &smoothed, &FeatureConfig::default())?;
    let features = FeatureSet::default_for(&table);
    let examples = make_examples(&table, &smoothed, 12, &features)?;
    println!("\n{} examples with features: {}", examples.len(), features);

    // Linear baseline with a chronological hold-out
    let (train, test) = examples.split_chronological(0.2)?;
    let model = LinearRegressor::default().train(&train)?;
    let metrics = evaluate(test.targets(), &model.predict(&test)?)?;
    println!("\nLinear Regression on the hold-out: {}", metrics);
    for (column, coefficient) in model.coefficients() {
        println!("  {:<22} {:>10.4}", column.name(), coefficient);
    }

    // Twelve hours ahead
    let window = table.window(&features, 1)?;
    let result = forecast(&model, &window, 24, interval, DEFAULT_THRESHOLD)?;
    println!("\n{}", result);

    Ok(())
}
