//! End-to-end run: read rasters, fit, summarize, plot and write forecasts.
//!
//! Raster I/O and plotting stay outside the engine. Hosts plug them in
//! through [`RasterSource`], [`RasterWriter`] and [`ScatterSink`]; the spatial
//! profile returned by the source is handed back to the writer untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::aggregate::{fit_and_forecast, ForecastOutputs};
use crate::error::{ForecastError, Result};
use crate::feedback::Feedback;
use crate::grid::Grid;
use crate::options::{
    observed_years, parse_future_years, ForecastOptions, SummaryOptions, DEFAULT_START_YEAR,
};
use crate::series::{assemble, MIN_SERIES};
use crate::summary::{summarize, ForecastSummary};

/// File name of the scatter plot inside the output folder.
pub const SCATTER_FILE_NAME: &str = "scatter_actual_vs_predicted.png";

/// Output file name for the forecast of `year`.
pub fn prediction_file_name(year: i32) -> String {
    format!("NTL_Pred_{}.tif", year)
}

/// Yearly grids read by a [`RasterSource`], oldest first.
#[derive(Debug, Clone)]
pub struct RasterStack<P> {
    pub grids: Vec<Grid>,
    /// NoData sentinel of the first raster
    pub nodata: Option<f64>,
    /// Opaque spatial profile passed through to the writer
    pub profile: P,
}

/// Source of the yearly input rasters.
pub trait RasterSource {
    type Profile;

    fn read(&self) -> Result<RasterStack<Self::Profile>>;
}

/// Destination for single-band forecast rasters.
pub trait RasterWriter<P> {
    fn write(&mut self, grid: &Grid, profile: &P, path: &Path) -> Result<()>;
}

/// Axis labels and title of the scatter plot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotLabels {
    pub x_label: String,
    pub y_label: String,
    pub title: String,
}

impl PlotLabels {
    /// Labels for actual radiance against the forecast of `future_year`.
    pub fn actual_vs_predicted(future_year: i32) -> Self {
        Self {
            x_label: "Actual NTL".to_string(),
            y_label: format!("Predicted NTL ({})", future_year),
            title: "Actual vs Predicted NTL".to_string(),
        }
    }
}

/// Reporting sink for the actual-vs-predicted sample.
pub trait ScatterSink {
    fn plot(&mut self, points: &[(f64, f64)], labels: &PlotLabels, path: &Path) -> Result<()>;
}

/// Settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Years to forecast, in output order
    pub future_years: Vec<i32>,
    /// Year of the first input raster
    pub start_year: i32,
    pub forecast: ForecastOptions,
    pub summary: SummaryOptions,
    /// Folder receiving the forecast rasters and the scatter plot
    pub output_dir: PathBuf,
}

impl PipelineConfig {
    /// Configuration from a comma-separated future-year string.
    ///
    /// # Errors
    /// [`ForecastError::NoFutureYears`] when the string holds no year.
    pub fn new(future_years: &str, output_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            future_years: parse_future_years(future_years)?,
            start_year: DEFAULT_START_YEAR,
            forecast: ForecastOptions::default(),
            summary: SummaryOptions::default(),
            output_dir: output_dir.into(),
        })
    }
}

/// What a pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Forecast raster path per future year
    pub outputs: BTreeMap<i32, PathBuf>,
    pub scatter_path: PathBuf,
    pub summary: ForecastSummary,
    pub forecast: ForecastOutputs,
}

/// Run the whole forecast for the rasters of `source`.
///
/// # Errors
/// Configuration errors abort before any pixel is fitted; an empty result
/// aborts before anything is written.
pub fn run_pipeline<S, W, K>(
    source: &S,
    writer: &mut W,
    plotter: &mut K,
    config: &PipelineConfig,
    feedback: &dyn Feedback,
) -> Result<PipelineReport>
where
    S: RasterSource,
    W: RasterWriter<S::Profile>,
    K: ScatterSink,
{
    if config.future_years.is_empty() {
        return Err(ForecastError::NoFutureYears);
    }

    let stack = source.read()?;
    if stack.grids.len() < MIN_SERIES {
        return Err(ForecastError::InsufficientData {
            needed: MIN_SERIES,
            got: stack.grids.len(),
        });
    }

    let years = observed_years(config.start_year, stack.grids.len());
    let (volume, validity) = assemble(stack.grids, stack.nodata)?;

    let forecast = fit_and_forecast(
        &volume,
        &validity,
        &years,
        &config.future_years,
        &config.forecast,
        feedback,
    )?;

    std::fs::create_dir_all(&config.output_dir)?;

    let summary = summarize(&forecast, &validity, &volume, &config.summary)?;
    for line in summary.report_lines() {
        feedback.log(&line);
    }

    let scatter_path = config.output_dir.join(SCATTER_FILE_NAME);
    plotter.plot(
        &summary.scatter.points,
        &PlotLabels::actual_vs_predicted(summary.scatter.future_year),
        &scatter_path,
    )?;
    feedback.log(&format!("Scatter plot saved: {}", scatter_path.display()));

    let mut outputs = BTreeMap::new();
    for (year, grid) in forecast.future_years.iter().zip(forecast.predictions.iter()) {
        let path = config.output_dir.join(prediction_file_name(*year));
        writer.write(grid, &stack.profile, &path)?;
        tracing::debug!(year, path = %path.display(), "forecast raster written");
        outputs.insert(*year, path);
    }

    feedback.log("Processing complete.");

    Ok(PipelineReport {
        outputs,
        scatter_path,
        summary,
        forecast,
    })
}
