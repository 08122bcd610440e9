//! Per-pixel regression: fit, reconstruct, forecast and score.
//!
//! All four model families are linear in their expanded features. Features
//! and target are centered on the observed years before fitting, so the
//! intercept equals the target mean and is never penalized:
//!
//! - Linear / Polynomial: ordinary least squares
//! - Ridge: minimizes ‖y − Xw‖² + α‖w‖²
//! - Lasso: minimizes (1/2n)‖y − Xw‖² + α‖w‖₁
//!
//! A solver error leaves the pixel without a trend (all coefficients zero).

use anofox_regression::prelude::*;
use anofox_regression::solvers::path::{fit_path, PathOptions};

use crate::error::{ForecastError, Result};
use crate::features::{ExpandedFeatures, FeatureMatrix};
use crate::metrics;
use crate::normalize::Scaler;
use crate::options::{ForecastOptions, ModelType, R2Space};

/// Fitted linear model over centered features.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    /// Prediction at the feature means
    pub intercept: f64,
    /// One coefficient per feature column
    pub coefficients: Vec<f64>,
    /// Column means of the observed features
    pub feature_means: Vec<f64>,
}

impl LinearFit {
    /// Predict one value per row of `features`.
    pub fn predict(&self, features: &FeatureMatrix) -> Vec<f64> {
        (0..features.n_rows())
            .map(|i| {
                self.coefficients
                    .iter()
                    .zip(self.feature_means.iter())
                    .enumerate()
                    .fold(self.intercept, |acc, (j, (w, m))| {
                        acc + w * (features.column(j)[i] - m)
                    })
            })
            .collect()
    }
}

/// Outcome of one pixel's fit. Values are in original units and not yet floored.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelFit {
    /// One prediction per future year
    pub forecast: Vec<f64>,
    /// In-sample reconstruction
    pub fitted: Vec<f64>,
    pub r2: f64,
    pub rmse: f64,
    /// The normalizer hit a zero range or zero variance
    pub degenerate: bool,
}

impl PixelFit {
    /// Whether every metric and prediction is finite.
    pub fn is_finite(&self) -> bool {
        self.r2.is_finite() && self.rmse.is_finite() && self.forecast.iter().all(|v| v.is_finite())
    }
}

/// Centered copy of the feature columns, restricted to the first `usable` columns.
struct Centered {
    columns: Vec<Vec<f64>>,
    means: Vec<f64>,
    y: Vec<f64>,
    y_mean: f64,
}

fn center(features: &FeatureMatrix, y: &[f64]) -> Centered {
    let n = y.len();
    // Centering removes one degree of freedom; extra columns would be aliased.
    let usable = features.n_features().min(n.saturating_sub(1));

    let mut columns = Vec::with_capacity(usable);
    let mut means = Vec::with_capacity(usable);
    for j in 0..usable {
        let col = features.column(j);
        let mean = col.iter().sum::<f64>() / n as f64;
        columns.push(col.iter().map(|v| v - mean).collect());
        means.push(mean);
    }

    let y_mean = y.iter().sum::<f64>() / n as f64;
    Centered {
        columns,
        means,
        y: y.iter().map(|v| v - y_mean).collect(),
        y_mean,
    }
}

/// Fit the model family on (features, y).
///
/// # Errors
/// - [`ForecastError::InsufficientData`] when `y` is empty
/// - [`ForecastError::InvalidInput`] when row counts disagree
pub fn fit_model(
    model: ModelType,
    features: &FeatureMatrix,
    y: &[f64],
    options: &ForecastOptions,
) -> Result<LinearFit> {
    if y.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }
    if features.n_rows() != y.len() {
        return Err(ForecastError::InvalidInput(format!(
            "Feature rows ({}) do not match observations ({})",
            features.n_rows(),
            y.len()
        )));
    }

    let centered = center(features, y);
    let usable = centered.columns.len();

    let mut coefficients = match model {
        ModelType::Linear | ModelType::Polynomial => least_squares(&centered.columns, &centered.y),
        ModelType::Ridge => ridge(&centered.columns, &centered.y, options.ridge_alpha),
        ModelType::Lasso => lasso(
            &centered.columns,
            &centered.y,
            options.lasso_alpha,
            options.lasso_max_iter,
            options.lasso_tol,
        ),
    };

    // Aliased columns contribute nothing.
    coefficients.resize(features.n_features(), 0.0);
    let mut feature_means = centered.means;
    feature_means.extend(
        (usable..features.n_features())
            .map(|j| features.column(j).iter().sum::<f64>() / y.len() as f64),
    );

    Ok(LinearFit {
        intercept: centered.y_mean,
        coefficients,
        feature_means,
    })
}

/// Ordinary least squares on centered columns. Aliased columns get zero.
fn least_squares(columns: &[Vec<f64>], y: &[f64]) -> Vec<f64> {
    let k = columns.len();
    if k == 0 {
        return vec![];
    }
    let (x_mat, y_col) = design(columns, y);

    match OlsRegressor::builder()
        .with_intercept(false)
        .compute_inference(false)
        .build()
        .fit(&x_mat, &y_col)
    {
        Ok(fitted) => finite_or_zero(fitted.coefficients()),
        // Fallback: no trend
        Err(_) => vec![0.0; k],
    }
}

/// Ridge on centered columns: minimizes ‖y − Xw‖² + α‖w‖².
fn ridge(columns: &[Vec<f64>], y: &[f64], alpha: f64) -> Vec<f64> {
    let k = columns.len();
    if k == 0 {
        return vec![];
    }
    let (x_mat, y_col) = design(columns, y);

    match RidgeRegressor::builder()
        .with_intercept(false)
        .lambda(alpha)
        .compute_inference(false)
        .build()
        .fit(&x_mat, &y_col)
    {
        Ok(fitted) => finite_or_zero(fitted.coefficients()),
        Err(_) => vec![0.0; k],
    }
}

/// Lasso on centered columns: minimizes (1/2n)‖y − Xw‖² + α‖w‖₁.
///
/// Solved as a one-point elastic-net path with pure L1 mixing, which is
/// cyclic coordinate descent on exactly this objective.
fn lasso(columns: &[Vec<f64>], y: &[f64], alpha: f64, max_iter: usize, tol: f64) -> Vec<f64> {
    let k = columns.len();
    if k == 0 {
        return vec![];
    }
    let (x_mat, y_col) = design(columns, y);
    let path_options = PathOptions {
        tol,
        max_iter,
        ..PathOptions::elastic_net(1.0).with_intercept(false)
    };

    match fit_path(&x_mat, &y_col, &[alpha], &path_options) {
        Ok(path) => finite_or_zero(&path.coefficients_at(0)),
        Err(_) => vec![0.0; k],
    }
}

/// Design matrix (n × k) and target column for the solvers.
fn design(columns: &[Vec<f64>], y: &[f64]) -> (faer::Mat<f64>, faer::Col<f64>) {
    let x_mat = faer::Mat::from_fn(y.len(), columns.len(), |i, j| columns[j][i]);
    let y_col = faer::Col::from_fn(y.len(), |i| y[i]);
    (x_mat, y_col)
}

fn finite_or_zero(coefficients: &faer::Col<f64>) -> Vec<f64> {
    (0..coefficients.nrows())
        .map(|j| {
            let c = coefficients[j];
            if c.is_finite() {
                c
            } else {
                0.0
            }
        })
        .collect()
}

/// Fit one pixel: normalize, fit, reconstruct, forecast and score.
///
/// R² is measured in the space selected by `options.r2_space`; RMSE is always
/// measured between the inverse-normalized reconstruction and `series`.
pub fn fit_pixel(
    series: &[f64],
    features: &ExpandedFeatures,
    options: &ForecastOptions,
) -> Result<PixelFit> {
    let scaler = Scaler::fit(options.normalization, series);
    let y_norm = scaler.transform(series);

    let model = fit_model(options.model, &features.observed, &y_norm, options)?;

    let fitted_norm = model.predict(&features.observed);
    let fitted = scaler.inverse_transform(&fitted_norm);
    let forecast = scaler.inverse_transform(&model.predict(&features.future));

    let r2 = match options.r2_space {
        R2Space::Normalized => metrics::r2(&y_norm, &fitted_norm)?,
        R2Space::Original => metrics::r2(series, &fitted)?,
    };
    let rmse = metrics::rmse(series, &fitted)?;

    Ok(PixelFit {
        forecast,
        fitted,
        r2,
        rmse,
        degenerate: scaler.is_degenerate(),
    })
}
