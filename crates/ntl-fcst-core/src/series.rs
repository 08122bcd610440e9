//! Stacking of yearly grids into a time-ordered volume.
//!
//! [`assemble`] turns N equal-shaped grids into a [`TimeSeriesVolume`] and
//! derives the [`ValidityMask`] from the NoData sentinel.

use crate::error::{ForecastError, Result};
use crate::grid::Grid;

/// Minimum number of yearly grids needed to fit a trend.
pub const MIN_SERIES: usize = 2;

/// Time-ordered stack of equal-shaped grids, indexed `[time, row, col]`.
#[derive(Debug, Clone)]
pub struct TimeSeriesVolume {
    rows: usize,
    cols: usize,
    layers: Vec<Grid>,
}

impl TimeSeriesVolume {
    /// Number of time steps.
    pub fn n_times(&self) -> usize {
        self.layers.len()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)` of every layer.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of pixels in one layer.
    pub fn n_pixels(&self) -> usize {
        self.rows * self.cols
    }

    /// Layer for time step `t`.
    pub fn layer(&self, t: usize) -> Option<&Grid> {
        self.layers.get(t)
    }

    /// Last observed layer.
    pub fn last_layer(&self) -> Option<&Grid> {
        self.layers.last()
    }

    /// Copy the temporal series of the pixel at row-major index `idx` into `buf`.
    pub fn pixel_series_into(&self, idx: usize, buf: &mut Vec<f64>) {
        buf.clear();
        buf.extend(self.layers.iter().map(|layer| layer.as_slice()[idx]));
    }

    /// Temporal series of the pixel at row-major index `idx`.
    pub fn pixel_series(&self, idx: usize) -> Vec<f64> {
        let mut buf = Vec::with_capacity(self.layers.len());
        self.pixel_series_into(idx, &mut buf);
        buf
    }
}

/// Per-pixel validity: `true` where no time step holds the NoData sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityMask {
    rows: usize,
    cols: usize,
    mask: Vec<bool>,
}

impl ValidityMask {
    /// Mask with every pixel valid.
    pub fn all_valid(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            mask: vec![true; rows * cols],
        }
    }

    /// Build a mask from a row-major buffer.
    pub fn from_vec(rows: usize, cols: usize, mask: Vec<bool>) -> Result<Self> {
        if mask.len() != rows * cols {
            return Err(ForecastError::InvalidInput(format!(
                "Mask buffer has {} values, expected {}x{} = {}",
                mask.len(),
                rows,
                cols,
                rows * cols
            )));
        }
        Ok(Self { rows, cols, mask })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.mask.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    /// Whether the pixel at row-major index `idx` is valid.
    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        self.mask.get(idx).copied().unwrap_or(false)
    }

    /// Number of valid pixels.
    pub fn count_valid(&self) -> usize {
        self.mask.iter().filter(|&&v| v).count()
    }

    /// Row-major indices of the valid pixels.
    pub fn valid_indices(&self) -> Vec<usize> {
        self.mask
            .iter()
            .enumerate()
            .filter(|(_, &v)| v)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.mask
    }
}

/// Whether `value` matches the NoData sentinel. A NaN sentinel matches NaN cells.
#[inline]
pub fn is_nodata(value: f64, nodata: f64) -> bool {
    if nodata.is_nan() {
        value.is_nan()
    } else {
        value == nodata
    }
}

/// Stack `grids` into a volume and derive the validity mask.
///
/// # Errors
/// - [`ForecastError::InsufficientData`] when fewer than two grids are supplied
/// - [`ForecastError::ShapeMismatch`] when a grid differs in shape from the first
/// - [`ForecastError::InvalidInput`] when the grids are empty
pub fn assemble(grids: Vec<Grid>, nodata: Option<f64>) -> Result<(TimeSeriesVolume, ValidityMask)> {
    if grids.len() < MIN_SERIES {
        return Err(ForecastError::InsufficientData {
            needed: MIN_SERIES,
            got: grids.len(),
        });
    }

    let (rows, cols) = grids[0].shape();
    if rows == 0 || cols == 0 {
        return Err(ForecastError::InvalidInput(
            "Input grids must not be empty".to_string(),
        ));
    }

    for (i, grid) in grids.iter().enumerate().skip(1) {
        if grid.shape() != (rows, cols) {
            return Err(ForecastError::ShapeMismatch {
                what: format!("input grid {}", i),
                expected_rows: rows,
                expected_cols: cols,
                rows: grid.rows(),
                cols: grid.cols(),
            });
        }
    }

    let mask = match nodata {
        Some(sentinel) => {
            let mut mask = vec![true; rows * cols];
            for grid in &grids {
                for (valid, &v) in mask.iter_mut().zip(grid.as_slice()) {
                    if is_nodata(v, sentinel) {
                        *valid = false;
                    }
                }
            }
            mask
        }
        None => vec![true; rows * cols],
    };

    Ok((
        TimeSeriesVolume {
            rows,
            cols,
            layers: grids,
        },
        ValidityMask { rows, cols, mask },
    ))
}
