//! Goodness-of-fit metrics for one pixel's in-sample reconstruction.
//!
//! | Metric | Space |
//! |--------|-------|
//! | R² | training target (normalized unless configured otherwise) |
//! | RMSE | original radiance units |

use crate::error::{ForecastError, Result};

/// Rounding slack, in ulps of the largest target value, below which a
/// deviation counts as zero.
const ROUNDING_ULPS: f64 = 16.0;

/// Calculates Mean Squared Error between actual and predicted values.
///
/// # Formula
/// MSE = (1/n) * Σ(actual_i - predicted_i)²
pub fn mse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    validate_inputs(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Calculates Root Mean Squared Error between actual and predicted values.
///
/// RMSE is the square root of MSE, returning error in the original units.
///
/// # Formula
/// RMSE = √MSE
///
/// # Example
/// ```
/// use ntl_fcst_core::metrics::rmse;
/// let actual = vec![1.0, 2.0, 3.0];
/// let predicted = vec![1.0, 2.0, 5.0];
/// let error = rmse(&actual, &predicted).unwrap();
/// assert!((error - (4.0f64 / 3.0).sqrt()).abs() < 1e-12);
/// ```
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    Ok(mse(actual, predicted)?.sqrt())
}

/// R-squared (coefficient of determination) of a fit.
///
/// A target without variance has no explained fraction; it scores 1.0 when
/// the fit reproduces it exactly and 0.0 otherwise, so flat pixels stay
/// finite. "Without variance" means within rounding of the target's own
/// magnitude, so low-amplitude series are still scored normally.
pub fn r2(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    validate_inputs(actual, predicted)?;

    let mean: f64 = actual.iter().sum::<f64>() / actual.len() as f64;

    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    // Squared rounding error of a mean over values of this magnitude
    let scale = actual.iter().fold(0.0_f64, |m, a| m.max(a.abs()));
    let tol = actual.len() as f64 * (ROUNDING_ULPS * f64::EPSILON * scale).powi(2);
    if ss_tot <= tol {
        return Ok(if ss_res <= tol { 1.0 } else { 0.0 });
    }

    Ok(1.0 - ss_res / ss_tot)
}

/// Validates that input arrays are suitable for metric calculation.
fn validate_inputs(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(ForecastError::InvalidInput(format!(
            "Actual and predicted arrays must have the same length: {} vs {}",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }
    Ok(())
}
