//! Corpus-wide statistics over the per-pixel metric grids.

use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::statistics::Statistics;

use crate::aggregate::ForecastOutputs;
use crate::error::{ForecastError, Result};
use crate::grid::Grid;
use crate::options::SummaryOptions;
use crate::series::{TimeSeriesVolume, ValidityMask};

/// Mean, min and max over the defined cells of a metric grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Number of defined cells
    pub count: usize,
}

impl MetricStats {
    /// Statistics over the non-NaN cells of `grid`.
    ///
    /// # Errors
    /// [`ForecastError::EmptyResult`] when no cell is defined.
    pub fn from_grid(grid: &Grid, name: &str) -> Result<Self> {
        let defined: Vec<f64> = grid.as_slice().iter().copied().filter(|v| !v.is_nan()).collect();
        if defined.is_empty() {
            return Err(ForecastError::EmptyResult(format!(
                "no pixel has a defined {}",
                name
            )));
        }
        Ok(Self {
            mean: Statistics::mean(&defined),
            min: Statistics::min(&defined),
            max: Statistics::max(&defined),
            count: defined.len(),
        })
    }
}

/// Random actual-vs-predicted pairs for a scatter plot.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterSample {
    /// Year of the predicted values
    pub future_year: i32,
    /// `(actual at the last observed year, predicted at future_year)`
    pub points: Vec<(f64, f64)>,
}

/// Summary of one forecasting run.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSummary {
    pub r2: MetricStats,
    pub rmse: MetricStats,
    /// Percentage of defined R² values at or above the robust threshold
    pub robust_pct: f64,
    pub robust_threshold: f64,
    pub scatter: ScatterSample,
}

impl ForecastSummary {
    /// Human-readable report lines.
    pub fn report_lines(&self) -> Vec<String> {
        vec![
            format!(
                "R² - mean:{:.3},min:{:.3},max:{:.3}",
                self.r2.mean, self.r2.min, self.r2.max
            ),
            format!(
                "RMSE - mean:{:.3},min:{:.3},max:{:.3}",
                self.rmse.mean, self.rmse.min, self.rmse.max
            ),
            format!(
                "Robust(R²>={}):{:.1}%",
                self.robust_threshold, self.robust_pct
            ),
        ]
    }
}

fn check_shape(what: &str, expected: (usize, usize), got: (usize, usize)) -> Result<()> {
    if expected != got {
        return Err(ForecastError::ShapeMismatch {
            what: what.to_string(),
            expected_rows: expected.0,
            expected_cols: expected.1,
            rows: got.0,
            cols: got.1,
        });
    }
    Ok(())
}

/// Summarize the metric grids of a run and sample pairs for plotting.
///
/// # Errors
/// - [`ForecastError::EmptyResult`] when no pixel was fitted
/// - [`ForecastError::ShapeMismatch`] when the inputs disagree in shape
pub fn summarize(
    outputs: &ForecastOutputs,
    validity: &ValidityMask,
    volume: &TimeSeriesVolume,
    options: &SummaryOptions,
) -> Result<ForecastSummary> {
    let shape = outputs.shape();
    check_shape("validity mask", shape, validity.shape())?;
    check_shape("input volume", shape, volume.shape())?;

    let r2 = MetricStats::from_grid(&outputs.r2, "R²")?;
    let rmse = MetricStats::from_grid(&outputs.rmse, "RMSE")?;

    let robust = outputs
        .r2
        .as_slice()
        .iter()
        .filter(|v| !v.is_nan() && **v >= options.robust_threshold)
        .count();
    let robust_pct = 100.0 * robust as f64 / r2.count as f64;

    let scatter = sample_scatter(outputs, validity, volume, options)?;

    tracing::info!(
        r2_mean = r2.mean,
        rmse_mean = rmse.mean,
        robust_pct,
        n_samples = scatter.points.len(),
        "summary computed"
    );

    Ok(ForecastSummary {
        r2,
        rmse,
        robust_pct,
        robust_threshold: options.robust_threshold,
        scatter,
    })
}

/// Uniform sample without replacement over the valid pixels.
fn sample_scatter(
    outputs: &ForecastOutputs,
    validity: &ValidityMask,
    volume: &TimeSeriesVolume,
    options: &SummaryOptions,
) -> Result<ScatterSample> {
    let (Some(&future_year), Some(predicted)) =
        (outputs.future_years.first(), outputs.predictions.first())
    else {
        return Err(ForecastError::EmptyResult(
            "no prediction grid to sample".to_string(),
        ));
    };
    let actual = volume
        .last_layer()
        .ok_or_else(|| ForecastError::EmptyResult("no observed layer to sample".to_string()))?;

    let valid = validity.valid_indices();
    let amount = options.sample_cap.min(valid.len());

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let points = rand::seq::index::sample(&mut rng, valid.len(), amount)
        .into_iter()
        .map(|i| {
            let idx = valid[i];
            (actual.as_slice()[idx], predicted.as_slice()[idx])
        })
        .collect();

    Ok(ScatterSample {
        future_year,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::fit_and_forecast;
    use crate::feedback::NoopFeedback;
    use crate::options::ForecastOptions;
    use crate::series::assemble;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn run(grids: Vec<Grid>, nodata: Option<f64>) -> (ForecastOutputs, ValidityMask, TimeSeriesVolume) {
        let n = grids.len();
        let (volume, mask) = assemble(grids, nodata).unwrap();
        let years: Vec<i32> = (0..n).map(|i| 2013 + i as i32).collect();
        let out = fit_and_forecast(
            &volume,
            &mask,
            &years,
            &[2030],
            &ForecastOptions::default(),
            &NoopFeedback,
        )
        .unwrap();
        (out, mask, volume)
    }

    fn seeded(seed: u64) -> SummaryOptions {
        SummaryOptions {
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn test_metric_stats_skip_undefined() {
        let grid = Grid::from_vec(1, 4, vec![0.5, f64::NAN, 1.0, 0.0]).unwrap();
        let stats = MetricStats::from_grid(&grid, "R²").unwrap();
        assert_eq!(stats.count, 3);
        assert_relative_eq!(stats.mean, 0.5);
        assert_relative_eq!(stats.min, 0.0);
        assert_relative_eq!(stats.max, 1.0);
    }

    #[test]
    fn test_empty_metric_grid_is_error() {
        let grid = Grid::filled(2, 2, f64::NAN);
        assert!(matches!(
            MetricStats::from_grid(&grid, "RMSE"),
            Err(ForecastError::EmptyResult(_))
        ));
    }

    #[test]
    fn test_summarize_all_masked_is_empty_result() {
        let grids = vec![Grid::filled(2, 2, -9999.0), Grid::filled(2, 2, 1.0)];
        let (out, mask, volume) = run(grids, Some(-9999.0));
        assert_eq!(out.n_fitted, 0);
        let err = summarize(&out, &mask, &volume, &seeded(1)).unwrap_err();
        assert!(matches!(err, ForecastError::EmptyResult(_)));
    }

    #[test]
    fn test_robust_percentage() {
        let grids = vec![
            Grid::from_rows(&[vec![1.0, 1.0, 5.0, 0.0]]).unwrap(),
            Grid::from_rows(&[vec![2.0, 3.0, 1.0, 0.0]]).unwrap(),
            Grid::from_rows(&[vec![3.0, 1.0, 5.0, 0.0]]).unwrap(),
        ];
        let (out, mask, volume) = run(grids, None);
        let summary = summarize(&out, &mask, &volume, &seeded(7)).unwrap();
        // Perfect trend and flat pixel are robust; zig-zags have R² = 0
        assert_eq!(summary.r2.count, 4);
        assert_relative_eq!(summary.robust_pct, 50.0);
        assert_eq!(summary.report_lines()[2], "Robust(R²>=0.7):50.0%");
    }

    #[test]
    fn test_scatter_pairs_valid_pixels_only() {
        let grids = vec![
            Grid::from_rows(&[vec![1.0, -1.0], vec![2.0, 3.0]]).unwrap(),
            Grid::from_rows(&[vec![2.0, 4.0], vec![2.0, 4.0]]).unwrap(),
        ];
        let (out, mask, volume) = run(grids, Some(-1.0));
        let summary = summarize(&out, &mask, &volume, &seeded(3)).unwrap();

        assert_eq!(summary.scatter.future_year, 2030);
        assert_eq!(summary.scatter.points.len(), 3);
        let actuals: HashSet<u64> = summary
            .scatter
            .points
            .iter()
            .map(|(a, _)| a.to_bits())
            .collect();
        let expected: HashSet<u64> = [2.0f64, 2.0, 4.0].iter().map(|v| v.to_bits()).collect();
        assert_eq!(actuals, expected);
        for (actual, predicted) in &summary.scatter.points {
            if *actual == 4.0 {
                assert_relative_eq!(*predicted, 20.0, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_scatter_sample_capped_and_distinct() {
        let grids = vec![
            Grid::from_vec(10, 10, (0..100).map(|i| i as f64).collect()).unwrap(),
            Grid::from_vec(10, 10, (0..100).map(|i| 2.0 * i as f64).collect()).unwrap(),
        ];
        let (out, mask, volume) = run(grids, None);
        let options = SummaryOptions {
            sample_cap: 25,
            seed: Some(42),
            ..Default::default()
        };
        let summary = summarize(&out, &mask, &volume, &options).unwrap();
        assert_eq!(summary.scatter.points.len(), 25);
        let distinct: HashSet<u64> = summary
            .scatter
            .points
            .iter()
            .map(|(a, _)| a.to_bits())
            .collect();
        assert_eq!(distinct.len(), 25);

        let again = summarize(&out, &mask, &volume, &options).unwrap();
        assert_eq!(summary.scatter, again.scatter);
    }

    #[test]
    fn test_report_lines_format() {
        let summary = ForecastSummary {
            r2: MetricStats {
                mean: 0.8,
                min: 0.1,
                max: 1.0,
                count: 3,
            },
            rmse: MetricStats {
                mean: 1.25,
                min: 0.0,
                max: 2.5,
                count: 3,
            },
            robust_pct: 66.666,
            robust_threshold: 0.7,
            scatter: ScatterSample {
                future_year: 2028,
                points: vec![],
            },
        };
        let lines = summary.report_lines();
        assert_eq!(lines[0], "R² - mean:0.800,min:0.100,max:1.000");
        assert_eq!(lines[1], "RMSE - mean:1.250,min:0.000,max:2.500");
        assert_eq!(lines[2], "Robust(R²>=0.7):66.7%");
    }

    #[test]
    fn test_shape_mismatch() {
        let grids = vec![Grid::filled(2, 2, 1.0), Grid::filled(2, 2, 2.0)];
        let (out, _, volume) = run(grids, None);
        let wrong = ValidityMask::all_valid(1, 4);
        assert!(matches!(
            summarize(&out, &wrong, &volume, &seeded(0)),
            Err(ForecastError::ShapeMismatch { .. })
        ));
    }
}
