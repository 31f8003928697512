//! Gap filling for series with missing samples
//!
//! Missing samples are represented as `None`. The fill policy used by the
//! feature pipeline is backward fill followed by forward fill, so a gap takes
//! the next real value when one exists and the previous one otherwise.

use crate::{MathError, Result};

/// Replace each missing value with the next present value
pub fn backward_fill(values: &mut [Option<f64>]) {
    let mut next: Option<f64> = None;
    for value in values.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => *value = next,
        }
    }
}

/// Replace each missing value with the previous present value
pub fn forward_fill(values: &mut [Option<f64>]) {
    let mut previous: Option<f64> = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => previous = Some(*v),
            None => *value = previous,
        }
    }
}

/// Backward fill, then forward fill, and unwrap the result.
///
/// Fails only when the series holds no value at all.
pub fn fill_gaps(values: &[Option<f64>]) -> Result<Vec<f64>> {
    let mut filled = values.to_vec();
    backward_fill(&mut filled);
    forward_fill(&mut filled);

    filled
        .into_iter()
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| {
            MathError::InsufficientData("Cannot fill a series without any values".to_string())
        })
}
