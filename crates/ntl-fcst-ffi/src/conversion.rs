//! Parameter conversion utilities for FFI functions.
//!
//! Turns raw host buffers into the core crate's grid and result types.

use core::ffi::c_char;
use std::ffi::CStr;

use ntl_fcst_core::{ForecastError, ForecastOutputs, Grid, Result};

use crate::types::{FitResult, RasterStackInput};

/// Convert a C string pointer to a Rust `&str`.
///
/// # Safety
/// The pointer must be null or point to a valid null-terminated string.
pub unsafe fn c_str_to_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(ForecastError::NullPointer(what.to_string()));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| ForecastError::InvalidInput(format!("{} is not valid UTF-8", what)))
}

/// Convert a sentinel flag pair to `Option<f64>`.
#[inline]
pub fn to_option_nodata(value: f64, has_value: bool) -> Option<f64> {
    has_value.then_some(value)
}

/// Split a layer-major raster stack into one grid per year.
///
/// # Safety
/// `input.values` must point to `n_times * rows * cols` doubles.
pub unsafe fn grids_from_stack(input: &RasterStackInput) -> Result<Vec<Grid>> {
    if input.values.is_null() {
        return Err(ForecastError::NullPointer("raster values".to_string()));
    }
    let layer = input
        .rows
        .checked_mul(input.cols)
        .ok_or_else(|| ForecastError::InvalidInput("raster size overflows".to_string()))?;
    let total = layer
        .checked_mul(input.n_times)
        .ok_or_else(|| ForecastError::InvalidInput("raster size overflows".to_string()))?;
    if total == 0 {
        return Err(ForecastError::InvalidInput(format!(
            "Empty raster stack ({} x {} x {})",
            input.n_times, input.rows, input.cols
        )));
    }

    let values = std::slice::from_raw_parts(input.values, total);
    values
        .chunks_exact(layer)
        .map(|chunk| Grid::from_vec(input.rows, input.cols, chunk.to_vec()))
        .collect()
}

/// Rebuild core forecast outputs from a result filled by `ntl_fit_and_forecast`.
///
/// # Safety
/// Every pointer in `result` must be valid for the sizes it records.
pub unsafe fn outputs_from_fit_result(result: &FitResult) -> Result<ForecastOutputs> {
    let cells = result.rows * result.cols;
    if cells == 0 || result.r2.is_null() || result.rmse.is_null() {
        return Err(ForecastError::InvalidInput(
            "fit result holds no grids".to_string(),
        ));
    }
    if result.n_future > 0 && (result.future_years.is_null() || result.predictions.is_null()) {
        return Err(ForecastError::NullPointer("fit result predictions".to_string()));
    }

    let grid = |ptr: *const f64| -> Result<Grid> {
        Grid::from_vec(
            result.rows,
            result.cols,
            std::slice::from_raw_parts(ptr, cells).to_vec(),
        )
    };

    let future_years = if result.n_future == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(result.future_years, result.n_future).to_vec()
    };
    let predictions = (0..result.n_future)
        .map(|k| grid(result.predictions.add(k * cells)))
        .collect::<Result<Vec<_>>>()?;

    Ok(ForecastOutputs {
        future_years,
        predictions,
        r2: grid(result.r2)?,
        rmse: grid(result.rmse)?,
        n_visited: result.n_visited,
        n_fitted: result.n_fitted,
        n_degenerate: result.n_degenerate,
        cancelled: result.cancelled,
    })
}
