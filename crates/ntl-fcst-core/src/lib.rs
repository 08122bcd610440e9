//! Core library for per-pixel nighttime-light forecasting.
//!
//! This crate fits one small regression per raster cell over a stack of
//! yearly radiance grids and extrapolates every cell to the requested
//! future years.

pub mod aggregate;
pub mod error;
pub mod features;
pub mod feedback;
pub mod grid;
pub mod metrics;
pub mod normalize;
pub mod options;
pub mod pipeline;
pub mod regression;
pub mod series;
pub mod summary;

// Re-exports for convenience
pub use aggregate::{fit_and_forecast, ForecastOutputs, NEUTRAL_PREDICTION};
pub use error::{ForecastError, Result};
pub use features::{ExpandedFeatures, FeatureBasis, FeatureMatrix};
pub use feedback::{CancellationToken, Feedback, NoopFeedback, TracingFeedback};
pub use grid::Grid;
pub use metrics::{mse, r2, rmse};
pub use normalize::{fit_transform, Scaler};
pub use options::{
    list_models, list_normalizations, observed_years, parse_future_years, ForecastOptions,
    ModelType, NormalizationType, R2Space, SummaryOptions, DEFAULT_FUTURE_YEARS,
    DEFAULT_START_YEAR,
};
pub use pipeline::{
    prediction_file_name, run_pipeline, PipelineConfig, PipelineReport, PlotLabels, RasterSource,
    RasterStack, RasterWriter, ScatterSink, SCATTER_FILE_NAME,
};
pub use regression::{fit_model, fit_pixel, LinearFit, PixelFit};
pub use series::{assemble, TimeSeriesVolume, ValidityMask, MIN_SERIES};
pub use summary::{summarize, ForecastSummary, MetricStats, ScatterSample};
