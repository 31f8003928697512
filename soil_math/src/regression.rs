//! Least-squares fitting
//!
//! Contains the linear algebra behind the smoothing and baseline models:
//! - Dense linear system solver (Gaussian elimination with partial pivoting)
//! - Polynomial fitting and evaluation
//! - Multivariate least squares on standardised columns

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Pivots below this magnitude are treated as a singular system
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Columns with a spread below this are treated as constant
const CONSTANT_COLUMN_TOLERANCE: f64 = 1e-12;

/// Solve `matrix * x = rhs` for a square system
pub fn solve_linear_system(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Result<Vec<f64>> {
    let n = rhs.len();
    if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(format!(
            "Expected a {}x{} system matrix",
            n, n
        )));
    }

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| matrix[a][col].abs().total_cmp(&matrix[b][col].abs()))
            .unwrap_or(col);

        if matrix[pivot_row][col].abs() < PIVOT_TOLERANCE {
            return Err(MathError::CalculationError(format!(
                "Singular system: no usable pivot in column {}",
                col
            )));
        }

        matrix.swap(col, pivot_row);
        rhs.swap(col, pivot_row);

        for row in col + 1..n {
            let factor = matrix[row][col] / matrix[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (rhs[row] - tail) / matrix[row][row];
    }

    Ok(solution)
}

/// Fit a polynomial of degree `order`; coefficients are in ascending powers
pub fn polyfit(xs: &[f64], ys: &[f64], order: usize) -> Result<Vec<f64>> {
    if xs.len() != ys.len() {
        return Err(MathError::InvalidInput(format!(
            "x has {} values but y has {}",
            xs.len(),
            ys.len()
        )));
    }
    if xs.len() <= order {
        return Err(MathError::InsufficientData(format!(
            "A degree {} polynomial needs more than {} points",
            order,
            xs.len()
        )));
    }

    let terms = order + 1;
    let mut normal = vec![vec![0.0; terms]; terms];
    let mut rhs = vec![0.0; terms];

    for (&x, &y) in xs.iter().zip(ys) {
        for r in 0..terms {
            let xr = x.powi(r as i32);
            rhs[r] += xr * y;
            for c in 0..terms {
                normal[r][c] += xr * x.powi(c as i32);
            }
        }
    }

    solve_linear_system(normal, rhs)
}

/// Evaluate a polynomial given in ascending powers (Horner's scheme)
pub fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Result of a multivariate least-squares fit, in original units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    /// One coefficient per input column
    pub coefficients: Vec<f64>,
    /// Intercept term
    pub intercept: f64,
}

impl LinearFit {
    /// Predict a single row
    pub fn predict(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.coefficients.len() {
            return Err(MathError::InvalidInput(format!(
                "Row has {} values, model expects {}",
                row.len(),
                self.coefficients.len()
            )));
        }

        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(c, x)| c * x)
                .sum::<f64>())
    }
}

/// Ordinary least squares with an optional ridge term.
///
/// Columns are standardised before solving the normal equations, so `ridge`
/// is relative to unit-variance features. Constant columns receive a zero
/// coefficient. With `ridge == 0.0` collinear columns make the system
/// singular and the fit fails.
pub fn least_squares(rows: &[Vec<f64>], targets: &[f64], ridge: f64) -> Result<LinearFit> {
    if rows.is_empty() {
        return Err(MathError::InsufficientData(
            "Least squares needs at least one row".to_string(),
        ));
    }
    if rows.len() != targets.len() {
        return Err(MathError::InvalidInput(format!(
            "{} rows but {} targets",
            rows.len(),
            targets.len()
        )));
    }
    if !ridge.is_finite() || ridge < 0.0 {
        return Err(MathError::InvalidInput(format!(
            "Ridge term must be a non-negative number, got {}",
            ridge
        )));
    }

    let width = rows[0].len();
    if let Some(index) = rows.iter().position(|row| row.len() != width) {
        return Err(MathError::InvalidInput(format!(
            "Row {} has {} values, expected {}",
            index,
            rows[index].len(),
            width
        )));
    }
    if rows.iter().flatten().chain(targets).any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "Least squares input contains non-finite values".to_string(),
        ));
    }

    let n = rows.len() as f64;
    let target_mean = targets.iter().sum::<f64>() / n;

    let means: Vec<f64> = (0..width)
        .map(|j| rows.iter().map(|row| row[j]).sum::<f64>() / n)
        .collect();
    let spreads: Vec<f64> = (0..width)
        .map(|j| {
            let variance = rows.iter().map(|row| (row[j] - means[j]).powi(2)).sum::<f64>() / n;
            variance.sqrt()
        })
        .collect();

    let active: Vec<usize> = (0..width)
        .filter(|&j| spreads[j] > CONSTANT_COLUMN_TOLERANCE)
        .collect();

    let mut coefficients = vec![0.0; width];

    if !active.is_empty() {
        let k = active.len();
        let mut gram = vec![vec![0.0; k]; k];
        let mut moment = vec![0.0; k];

        for (row, &target) in rows.iter().zip(targets) {
            let z: Vec<f64> = active
                .iter()
                .map(|&j| (row[j] - means[j]) / spreads[j])
                .collect();
            let centred = target - target_mean;
            for a in 0..k {
                moment[a] += z[a] * centred;
                for b in 0..k {
                    gram[a][b] += z[a] * z[b];
                }
            }
        }

        for a in 0..k {
            moment[a] /= n;
            for b in 0..k {
                gram[a][b] /= n;
            }
            gram[a][a] += ridge;
        }

        let standardised = solve_linear_system(gram, moment)?;
        for (&j, beta) in active.iter().zip(standardised) {
            coefficients[j] = beta / spreads[j];
        }
    }

    let intercept = target_mean
        - coefficients
            .iter()
            .zip(&means)
            .map(|(c, m)| c * m)
            .sum::<f64>();

    Ok(LinearFit {
        coefficients,
        intercept,
    })
}
