//! Pixel loop: fit every valid pixel and collect forecast and metric grids.
//!
//! Each pixel is visited exactly once in row-major order and writes only its
//! own cells. Invalid pixels keep a prediction of 0 and NaN metrics. The
//! loop polls [`Feedback::is_cancelled`] between pixels (between blocks in
//! parallel mode) and returns the partially filled grids when asked to stop.

use crate::error::{ForecastError, Result};
use crate::features::ExpandedFeatures;
use crate::feedback::Feedback;
use crate::grid::Grid;
use crate::options::ForecastOptions;
use crate::regression::{fit_pixel, PixelFit};
use crate::series::{TimeSeriesVolume, ValidityMask, MIN_SERIES};

#[cfg(feature = "native")]
use rayon::prelude::*;

/// Pixels fitted per parallel block between cancellation checks.
#[cfg(feature = "native")]
const PARALLEL_BLOCK: usize = 4096;

/// Prediction left in cells that were never fitted.
pub const NEUTRAL_PREDICTION: f64 = 0.0;

/// Grids produced by [`fit_and_forecast`].
#[derive(Debug, Clone)]
pub struct ForecastOutputs {
    /// Forecast years, in the order of `predictions`
    pub future_years: Vec<i32>,
    /// One prediction grid per future year, floored at 0
    pub predictions: Vec<Grid>,
    /// Per-pixel R² (NaN where undefined)
    pub r2: Grid,
    /// Per-pixel RMSE in original units (NaN where undefined)
    pub rmse: Grid,
    /// Pixels visited before completion or cancellation
    pub n_visited: usize,
    /// Pixels with finite metrics written
    pub n_fitted: usize,
    /// Pixels whose fit hit a degenerate normalization or produced non-finite values
    pub n_degenerate: usize,
    /// The loop stopped early on request
    pub cancelled: bool,
}

impl ForecastOutputs {
    fn empty(rows: usize, cols: usize, future_years: &[i32]) -> Self {
        Self {
            future_years: future_years.to_vec(),
            predictions: future_years
                .iter()
                .map(|_| Grid::filled(rows, cols, NEUTRAL_PREDICTION))
                .collect(),
            r2: Grid::filled(rows, cols, f64::NAN),
            rmse: Grid::filled(rows, cols, f64::NAN),
            n_visited: 0,
            n_fitted: 0,
            n_degenerate: 0,
            cancelled: false,
        }
    }

    /// `(rows, cols)` of every output grid.
    pub fn shape(&self) -> (usize, usize) {
        self.r2.shape()
    }

    /// Prediction grid for `year`.
    pub fn prediction_for(&self, year: i32) -> Option<&Grid> {
        self.future_years
            .iter()
            .position(|&y| y == year)
            .map(|i| &self.predictions[i])
    }

    /// Write one pixel's outcome into its cells.
    fn record(&mut self, idx: usize, outcome: Result<PixelFit>) {
        match outcome {
            Ok(fit) if fit.is_finite() => {
                if fit.degenerate {
                    self.n_degenerate += 1;
                    tracing::debug!(pixel = idx, "degenerate normalization");
                }
                for (grid, value) in self.predictions.iter_mut().zip(fit.forecast.iter()) {
                    grid.as_mut_slice()[idx] = *value;
                }
                self.r2.as_mut_slice()[idx] = fit.r2;
                self.rmse.as_mut_slice()[idx] = fit.rmse;
                self.n_fitted += 1;
            }
            Ok(_) => {
                self.n_degenerate += 1;
                tracing::debug!(pixel = idx, "fit produced non-finite values");
            }
            Err(e) => {
                self.n_degenerate += 1;
                tracing::debug!(pixel = idx, error = %e, "pixel fit failed");
            }
        }
    }

    /// Clamp every prediction to be non-negative.
    fn apply_floor(&mut self) {
        for grid in &mut self.predictions {
            for v in grid.as_mut_slice() {
                *v = v.max(0.0);
            }
        }
    }
}

fn validate(
    volume: &TimeSeriesVolume,
    validity: &ValidityMask,
    observed_years: &[i32],
    future_years: &[i32],
    options: &ForecastOptions,
) -> Result<()> {
    options.validate()?;

    if volume.n_times() < MIN_SERIES {
        return Err(ForecastError::InsufficientData {
            needed: MIN_SERIES,
            got: volume.n_times(),
        });
    }

    if validity.shape() != volume.shape() {
        let (rows, cols) = validity.shape();
        return Err(ForecastError::ShapeMismatch {
            what: "validity mask".to_string(),
            expected_rows: volume.rows(),
            expected_cols: volume.cols(),
            rows,
            cols,
        });
    }

    if observed_years.len() != volume.n_times() {
        return Err(ForecastError::InvalidInput(format!(
            "Got {} observed years for {} input grids",
            observed_years.len(),
            volume.n_times()
        )));
    }

    if future_years.is_empty() {
        return Err(ForecastError::NoFutureYears);
    }

    Ok(())
}

/// Fit every valid pixel of `volume` and forecast `future_years`.
///
/// # Errors
/// Configuration errors only; they are raised before any pixel is visited.
/// Per-pixel failures become NaN metrics and cancellation returns `Ok` with
/// [`ForecastOutputs::cancelled`] set.
pub fn fit_and_forecast(
    volume: &TimeSeriesVolume,
    validity: &ValidityMask,
    observed_years: &[i32],
    future_years: &[i32],
    options: &ForecastOptions,
    feedback: &dyn Feedback,
) -> Result<ForecastOutputs> {
    validate(volume, validity, observed_years, future_years, options)?;

    let (rows, cols) = volume.shape();
    let n_pixels = volume.n_pixels();
    let features = ExpandedFeatures::new(options.model, observed_years, future_years);
    let mut outputs = ForecastOutputs::empty(rows, cols, future_years);

    tracing::info!(
        model = %options.model,
        normalization = %options.normalization,
        rows,
        cols,
        n_times = volume.n_times(),
        n_valid = validity.count_valid(),
        n_future = future_years.len(),
        "starting pixel-wise regression"
    );
    feedback.log(&format!(
        "Starting regression (model={}, norm={})...",
        options.model, options.normalization
    ));

    if options.parallel {
        run_parallel(volume, validity, &features, options, feedback, &mut outputs);
    } else {
        run_sequential(volume, validity, &features, options, feedback, &mut outputs);
    }

    outputs.apply_floor();

    if outputs.cancelled {
        tracing::warn!(
            visited = outputs.n_visited,
            total = n_pixels,
            "pixel loop cancelled"
        );
    } else {
        feedback.report_percent(100);
    }
    tracing::info!(
        fitted = outputs.n_fitted,
        degenerate = outputs.n_degenerate,
        visited = outputs.n_visited,
        "pixel-wise regression finished"
    );

    Ok(outputs)
}

fn progress_step(n_pixels: usize) -> usize {
    (n_pixels / 100).max(1)
}

fn percent(idx: usize, n_pixels: usize) -> u8 {
    (idx * 100 / n_pixels.max(1)).min(100) as u8
}

fn run_sequential(
    volume: &TimeSeriesVolume,
    validity: &ValidityMask,
    features: &ExpandedFeatures,
    options: &ForecastOptions,
    feedback: &dyn Feedback,
    outputs: &mut ForecastOutputs,
) {
    let n_pixels = volume.n_pixels();
    let step = progress_step(n_pixels);
    let mut series = Vec::with_capacity(volume.n_times());

    for idx in 0..n_pixels {
        if feedback.is_cancelled() {
            outputs.cancelled = true;
            break;
        }
        outputs.n_visited += 1;

        if validity.is_valid(idx) {
            volume.pixel_series_into(idx, &mut series);
            outputs.record(idx, fit_pixel(&series, features, options));
        }

        if idx % step == 0 {
            feedback.report_percent(percent(idx, n_pixels));
        }
    }
}

#[cfg(feature = "native")]
fn run_parallel(
    volume: &TimeSeriesVolume,
    validity: &ValidityMask,
    features: &ExpandedFeatures,
    options: &ForecastOptions,
    feedback: &dyn Feedback,
    outputs: &mut ForecastOutputs,
) {
    let n_pixels = volume.n_pixels();

    for start in (0..n_pixels).step_by(PARALLEL_BLOCK) {
        if feedback.is_cancelled() {
            outputs.cancelled = true;
            break;
        }
        let end = (start + PARALLEL_BLOCK).min(n_pixels);

        let block: Vec<(usize, Result<PixelFit>)> = (start..end)
            .into_par_iter()
            .filter(|&idx| validity.is_valid(idx))
            .map(|idx| (idx, fit_pixel(&volume.pixel_series(idx), features, options)))
            .collect();

        for (idx, outcome) in block {
            outputs.record(idx, outcome);
        }
        outputs.n_visited = end;
        feedback.report_percent(percent(end, n_pixels));
    }
}

#[cfg(not(feature = "native"))]
fn run_parallel(
    volume: &TimeSeriesVolume,
    validity: &ValidityMask,
    features: &ExpandedFeatures,
    options: &ForecastOptions,
    feedback: &dyn Feedback,
    outputs: &mut ForecastOutputs,
) {
    tracing::debug!("parallel execution unavailable without the `native` feature");
    run_sequential(volume, validity, features, options, feedback, outputs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::NoopFeedback;
    use crate::options::{ModelType, NormalizationType};
    use crate::series::assemble;
    use approx::assert_relative_eq;
    use std::cell::{Cell, RefCell};

    /// Cancels after a fixed number of `is_cancelled` polls.
    struct CancelAfter {
        remaining: Cell<usize>,
        percents: RefCell<Vec<u8>>,
        logs: RefCell<Vec<String>>,
    }

    impl CancelAfter {
        fn new(polls: usize) -> Self {
            Self {
                remaining: Cell::new(polls),
                percents: RefCell::new(vec![]),
                logs: RefCell::new(vec![]),
            }
        }
    }

    impl Feedback for CancelAfter {
        fn report_percent(&self, percent: u8) {
            self.percents.borrow_mut().push(percent);
        }

        fn is_cancelled(&self) -> bool {
            let left = self.remaining.get();
            if left == 0 {
                return true;
            }
            self.remaining.set(left - 1);
            false
        }

        fn log(&self, message: &str) {
            self.logs.borrow_mut().push(message.to_string());
        }
    }

    fn trend_stack(rows: usize, cols: usize, n_times: usize) -> Vec<Grid> {
        (0..n_times)
            .map(|t| {
                let data = (0..rows * cols)
                    .map(|idx| 1.0 + idx as f64 * 0.1 + t as f64 * (idx % 3) as f64)
                    .collect();
                Grid::from_vec(rows, cols, data).unwrap()
            })
            .collect()
    }

    fn opts(model: ModelType, normalization: NormalizationType) -> ForecastOptions {
        ForecastOptions {
            model,
            normalization,
            ..Default::default()
        }
    }

    #[test]
    fn test_two_year_linear_extrapolation() {
        let grids = vec![Grid::filled(2, 2, 1.0), Grid::filled(2, 2, 2.0)];
        let (volume, mask) = assemble(grids, None).unwrap();
        let out = fit_and_forecast(
            &volume,
            &mask,
            &[2013, 2014],
            &[2015],
            &opts(ModelType::Linear, NormalizationType::None),
            &NoopFeedback,
        )
        .unwrap();

        assert_eq!(out.n_fitted, 4);
        assert!(!out.cancelled);
        for idx in 0..4 {
            assert_relative_eq!(out.predictions[0].as_slice()[idx], 3.0, epsilon = 1e-9);
            assert_relative_eq!(out.r2.as_slice()[idx], 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_nodata_pixel_left_undefined() {
        let grids = vec![
            Grid::from_rows(&[vec![1.0, -1.0], vec![1.0, 1.0]]).unwrap(),
            Grid::from_rows(&[vec![2.0, 5.0], vec![2.0, 2.0]]).unwrap(),
        ];
        let (volume, mask) = assemble(grids, Some(-1.0)).unwrap();
        let out = fit_and_forecast(
            &volume,
            &mask,
            &[2013, 2014],
            &[2015, 2016],
            &opts(ModelType::Linear, NormalizationType::None),
            &NoopFeedback,
        )
        .unwrap();

        assert_eq!(out.n_fitted, 3);
        assert!(out.r2.as_slice()[1].is_nan());
        assert!(out.rmse.as_slice()[1].is_nan());
        for grid in &out.predictions {
            assert_eq!(grid.as_slice()[1], NEUTRAL_PREDICTION);
        }
        assert_relative_eq!(
            out.prediction_for(2016).unwrap().as_slice()[0],
            4.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_predictions_floored_at_zero() {
        let grids = vec![
            Grid::filled(1, 3, 10.0),
            Grid::filled(1, 3, 5.0),
            Grid::filled(1, 3, 1.0),
        ];
        let (volume, mask) = assemble(grids, None).unwrap();
        for model in ModelType::ALL {
            for normalization in NormalizationType::ALL {
                let out = fit_and_forecast(
                    &volume,
                    &mask,
                    &[2013, 2014, 2015],
                    &[2030, 2040],
                    &opts(model, normalization),
                    &NoopFeedback,
                )
                .unwrap();
                for grid in &out.predictions {
                    assert!(grid.as_slice().iter().all(|&v| v >= 0.0));
                }
            }
        }
    }

    #[test]
    fn test_cancellation_leaves_unvisited_pixels_undefined() {
        let (volume, mask) = assemble(trend_stack(4, 5, 4), None).unwrap();
        let feedback = CancelAfter::new(7);
        let out = fit_and_forecast(
            &volume,
            &mask,
            &[2013, 2014, 2015, 2016],
            &[2020],
            &opts(ModelType::Linear, NormalizationType::None),
            &feedback,
        )
        .unwrap();

        assert!(out.cancelled);
        assert_eq!(out.n_visited, 7);
        assert!(out.n_fitted <= out.n_visited);
        for (idx, r2) in out.r2.as_slice().iter().enumerate() {
            assert_eq!(r2.is_nan(), idx >= 7, "pixel {}", idx);
        }
        assert!(out.predictions[0].as_slice()[7..].iter().all(|&v| v == 0.0));
        assert!(!feedback.percents.borrow().contains(&100));
    }

    #[test]
    fn test_cancel_before_start() {
        let (volume, mask) = assemble(trend_stack(2, 2, 3), None).unwrap();
        let out = fit_and_forecast(
            &volume,
            &mask,
            &[2013, 2014, 2015],
            &[2020],
            &ForecastOptions::default(),
            &CancelAfter::new(0),
        )
        .unwrap();
        assert!(out.cancelled);
        assert_eq!(out.n_visited, 0);
        assert_eq!(out.n_fitted, 0);
    }

    #[test]
    fn test_progress_and_log() {
        let (volume, mask) = assemble(trend_stack(10, 20, 3), None).unwrap();
        let feedback = CancelAfter::new(usize::MAX);
        fit_and_forecast(
            &volume,
            &mask,
            &[2013, 2014, 2015],
            &[2020],
            &opts(ModelType::Ridge, NormalizationType::MinMax),
            &feedback,
        )
        .unwrap();

        let percents = feedback.percents.borrow();
        // 200 pixels, one report every 2 pixels, plus the final 100
        assert_eq!(percents.len(), 101);
        assert_eq!(*percents.last().unwrap(), 100);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(
            feedback.logs.borrow()[0],
            "Starting regression (model=Ridge, norm=MinMax)..."
        );
    }

    #[test]
    fn test_configuration_errors_before_work() {
        let (volume, mask) = assemble(trend_stack(2, 2, 3), None).unwrap();
        let feedback = CancelAfter::new(usize::MAX);

        let err = fit_and_forecast(
            &volume,
            &mask,
            &[2013, 2014, 2015],
            &[],
            &ForecastOptions::default(),
            &feedback,
        )
        .unwrap_err();
        assert!(matches!(err, ForecastError::NoFutureYears));

        let err = fit_and_forecast(
            &volume,
            &mask,
            &[2013, 2014],
            &[2020],
            &ForecastOptions::default(),
            &feedback,
        )
        .unwrap_err();
        assert!(err.is_configuration());

        let wrong_mask = ValidityMask::all_valid(3, 2);
        let err = fit_and_forecast(
            &volume,
            &wrong_mask,
            &[2013, 2014, 2015],
            &[2020],
            &ForecastOptions::default(),
            &feedback,
        )
        .unwrap_err();
        assert!(matches!(err, ForecastError::ShapeMismatch { .. }));

        assert!(feedback.logs.borrow().is_empty());
        assert!(feedback.percents.borrow().is_empty());
    }

    #[test]
    fn test_constant_pixels_counted_degenerate() {
        let grids = vec![Grid::filled(1, 2, 3.0), Grid::filled(1, 2, 3.0)];
        let (volume, mask) = assemble(grids, None).unwrap();
        let out = fit_and_forecast(
            &volume,
            &mask,
            &[2013, 2014],
            &[2020],
            &opts(ModelType::Linear, NormalizationType::ZScore),
            &NoopFeedback,
        )
        .unwrap();
        assert_eq!(out.n_degenerate, 2);
        assert_eq!(out.n_fitted, 2);
        assert_relative_eq!(out.predictions[0].as_slice()[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (volume, mask) = assemble(trend_stack(30, 40, 5), None).unwrap();
        let years = [2013, 2014, 2015, 2016, 2017];
        let sequential = fit_and_forecast(
            &volume,
            &mask,
            &years,
            &[2025, 2030],
            &opts(ModelType::Polynomial, NormalizationType::ZScore),
            &NoopFeedback,
        )
        .unwrap();
        let parallel = fit_and_forecast(
            &volume,
            &mask,
            &years,
            &[2025, 2030],
            &ForecastOptions {
                parallel: true,
                ..opts(ModelType::Polynomial, NormalizationType::ZScore)
            },
            &NoopFeedback,
        )
        .unwrap();

        assert_eq!(sequential.n_fitted, parallel.n_fitted);
        assert_eq!(parallel.n_visited, 1200);
        for (a, b) in sequential.predictions.iter().zip(parallel.predictions.iter()) {
            assert_eq!(a.as_slice(), b.as_slice());
        }
    }

    #[cfg(feature = "native")]
    #[test]
    fn test_parallel_cancellation_between_blocks() {
        // 4900 pixels: one full block, then a poll that cancels
        let (volume, mask) = assemble(trend_stack(70, 70, 4), None).unwrap();
        let feedback = CancelAfter::new(1);
        let out = fit_and_forecast(
            &volume,
            &mask,
            &[2013, 2014, 2015, 2016],
            &[2020],
            &ForecastOptions {
                parallel: true,
                ..opts(ModelType::Linear, NormalizationType::None)
            },
            &feedback,
        )
        .unwrap();

        assert!(out.cancelled);
        assert_eq!(out.n_visited, PARALLEL_BLOCK);
        assert_eq!(out.n_fitted, PARALLEL_BLOCK);
        for (idx, r2) in out.r2.as_slice().iter().enumerate() {
            assert_eq!(r2.is_nan(), idx >= PARALLEL_BLOCK, "pixel {}", idx);
        }
        assert!(out.predictions[0].as_slice()[PARALLEL_BLOCK..]
            .iter()
            .all(|&v| v == NEUTRAL_PREDICTION));
        let percents = feedback.percents.borrow();
        assert_eq!(*percents.last().unwrap(), percent(PARALLEL_BLOCK, 4900));
        assert!(!percents.contains(&100));
    }
}
