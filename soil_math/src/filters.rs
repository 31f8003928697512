//! Rolling filters for noisy sensor series
//!
//! Contains implementations of the smoothing filters used on moisture data:
//! - Centred moving average (partial windows at the edges)
//! - Centred rolling median
//! - Trailing rolling mean
//! - Savitzky-Golay polynomial smoothing
//!
//! The rolling filters accept missing samples (`None`) and skip them, so a
//! window only averages the values it actually holds. A window without any
//! value yields `None`.

use crate::regression::{polyfit, polyval, solve_linear_system};
use crate::{MathError, Result};

fn check_window(window: usize) -> Result<()> {
    if window == 0 {
        return Err(MathError::InvalidInput(
            "Window size must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Inclusive bounds of a centred window around `index`.
///
/// For even windows the extra sample sits on the past side.
fn centred_bounds(index: usize, len: usize, window: usize) -> (usize, usize) {
    let lo = index.saturating_sub(window / 2);
    let hi = (index + (window - 1) / 2).min(len - 1);
    (lo, hi)
}

fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

/// Centred rolling mean with partial windows at the boundaries
pub fn centred_rolling_mean(values: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>> {
    check_window(window)?;

    let smoothed = (0..values.len())
        .map(|i| {
            let (lo, hi) = centred_bounds(i, values.len(), window);
            let samples = present(&values[lo..=hi]);
            if samples.is_empty() {
                None
            } else {
                Some(samples.iter().sum::<f64>() / samples.len() as f64)
            }
        })
        .collect();

    Ok(smoothed)
}

/// Centred rolling median with partial windows at the boundaries
pub fn centred_rolling_median(
    values: &[Option<f64>],
    window: usize,
) -> Result<Vec<Option<f64>>> {
    check_window(window)?;

    let smoothed = (0..values.len())
        .map(|i| {
            let (lo, hi) = centred_bounds(i, values.len(), window);
            median(&present(&values[lo..=hi]))
        })
        .collect();

    Ok(smoothed)
}

/// Trailing rolling mean over the last `window` samples (minimum one value)
pub fn trailing_rolling_mean(values: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>> {
    check_window(window)?;

    let smoothed = (0..values.len())
        .map(|i| {
            let lo = (i + 1).saturating_sub(window);
            let samples = present(&values[lo..=i]);
            if samples.is_empty() {
                None
            } else {
                Some(samples.iter().sum::<f64>() / samples.len() as f64)
            }
        })
        .collect();

    Ok(smoothed)
}

/// Median of a sample; even counts average the two middle values
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Convolution weights of a Savitzky-Golay smoothing window.
///
/// The weights evaluate, at the window centre, the least-squares polynomial of
/// degree `order` fitted over `window` samples.
pub fn savitzky_golay_weights(window: usize, order: usize) -> Result<Vec<f64>> {
    if window % 2 == 0 {
        return Err(MathError::InvalidInput(format!(
            "Savitzky-Golay window must be odd, got {}",
            window
        )));
    }
    if window <= order {
        return Err(MathError::InvalidInput(format!(
            "Savitzky-Golay window ({}) must exceed the polynomial order ({})",
            window, order
        )));
    }

    let half = (window / 2) as f64;
    let xs: Vec<f64> = (0..window).map(|j| j as f64 - half).collect();
    let terms = order + 1;

    // Normal matrix A^T A of the Vandermonde design
    let mut normal = vec![vec![0.0; terms]; terms];
    for (r, row) in normal.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = xs.iter().map(|x| x.powi((r + c) as i32)).sum();
        }
    }

    let mut unit = vec![0.0; terms];
    unit[0] = 1.0;
    let solved = solve_linear_system(normal, unit)?;

    Ok(xs.iter().map(|&x| polyval(&solved, x)).collect())
}

/// Savitzky-Golay smoothing.
///
/// Interior points use the convolution weights; the first and last
/// `window / 2` points are evaluated on polynomials fitted to the first and
/// last `window` samples. Fails on short series or non-finite values.
pub fn savitzky_golay(values: &[f64], window: usize, order: usize) -> Result<Vec<f64>> {
    let weights = savitzky_golay_weights(window, order)?;

    if values.len() < window {
        return Err(MathError::InsufficientData(format!(
            "Savitzky-Golay needs at least {} samples, have {}",
            window,
            values.len()
        )));
    }
    if let Some(position) = values.iter().position(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(format!(
            "Non-finite value at index {}",
            position
        )));
    }

    let n = values.len();
    let half = window / 2;
    let mut smoothed = vec![0.0; n];

    for i in half..n - half {
        smoothed[i] = weights
            .iter()
            .zip(&values[i - half..=i + half])
            .map(|(w, v)| w * v)
            .sum();
    }

    let xs: Vec<f64> = (0..window).map(|j| j as f64 - half as f64).collect();

    let head = polyfit(&xs, &values[..window], order)?;
    for (i, value) in smoothed.iter_mut().enumerate().take(half) {
        *value = polyval(&head, i as f64 - half as f64);
    }

    let tail_start = n - window;
    let tail = polyfit(&xs, &values[tail_start..], order)?;
    for (i, value) in smoothed.iter_mut().enumerate().skip(n - half) {
        *value = polyval(&tail, (i - tail_start) as f64 - half as f64);
    }

    Ok(smoothed)
}
