//! FFI boundary layer for the ntl-forecast engine.
//!
//! This crate provides C-compatible functions that can be called from a
//! host GIS application.

pub mod allocation;
pub mod conversion;
pub mod error_handling;
pub mod types;

use libc::{c_char, c_double, c_int, size_t};

use ntl_fcst_core::NoopFeedback;

use crate::allocation::{alloc_c_string, alloc_copy, alloc_string_array, free_ptr};
use crate::conversion::{c_str_to_str, grids_from_stack, outputs_from_fit_result, to_option_nodata};
use crate::error_handling::{check_null_pointers, ffi_try};

pub use types::*;

/// Assemble the host raster stack into a volume and validity mask.
unsafe fn assemble_input(
    input: &RasterStackInput,
) -> ntl_fcst_core::Result<(ntl_fcst_core::TimeSeriesVolume, ntl_fcst_core::ValidityMask)> {
    let grids = grids_from_stack(input)?;
    ntl_fcst_core::assemble(grids, to_option_nodata(input.nodata, input.has_nodata))
}

/// Free whatever a partially filled [`FitResult`] already owns.
unsafe fn release_fit_result(r: &mut FitResult) {
    free_fields!(r, future_years, predictions, r2, rmse);
}

// ============================================================================
// Forecast Functions
// ============================================================================

/// Fit every valid pixel and forecast the given future years.
///
/// `observed_years` must hold `input.n_times` years. When it is null the
/// years run contiguously from `start_year`. `callbacks` may be null, and so
/// may `future_years` when `n_future` is 0.
///
/// # Safety
/// All non-null pointers must be valid. Arrays must have the specified lengths.
#[no_mangle]
pub unsafe extern "C" fn ntl_fit_and_forecast(
    input: *const RasterStackInput,
    observed_years: *const c_int,
    start_year: c_int,
    future_years: *const c_int,
    n_future: size_t,
    options: *const FitOptions,
    callbacks: *const FeedbackCallbacks,
    out_result: *mut FitResult,
    out_error: *mut NtlError,
) -> bool {
    let ptrs = [
        input as *const core::ffi::c_void,
        options as *const core::ffi::c_void,
        out_result as *const core::ffi::c_void,
    ];
    crate::error_handling::init_error(out_error);
    if check_null_pointers(out_error, &ptrs) {
        return false;
    }
    // (NULL, 0) is an empty year list, reported by the core as a configuration error
    if n_future > 0
        && check_null_pointers(out_error, &[future_years as *const core::ffi::c_void])
    {
        return false;
    }

    let outcome = ffi_try(out_error, || {
        let input = &*input;
        let core_opts = ntl_fcst_core::ForecastOptions::try_from(&*options)?;
        let (volume, validity) = assemble_input(input)?;

        let years = if observed_years.is_null() {
            ntl_fcst_core::observed_years(start_year, volume.n_times())
        } else {
            std::slice::from_raw_parts(observed_years, volume.n_times()).to_vec()
        };
        let future = if n_future == 0 {
            Vec::new()
        } else {
            std::slice::from_raw_parts(future_years, n_future).to_vec()
        };

        match callbacks.as_ref() {
            Some(cb) => ntl_fcst_core::fit_and_forecast(
                &volume, &validity, &years, &future, &core_opts, cb,
            ),
            None => ntl_fcst_core::fit_and_forecast(
                &volume,
                &validity,
                &years,
                &future,
                &core_opts,
                &NoopFeedback,
            ),
        }
    });

    let Some(outputs) = outcome else {
        return false;
    };

    let (rows, cols) = outputs.shape();
    let r = &mut *out_result;
    *r = FitResult {
        rows,
        cols,
        n_future: outputs.future_years.len(),
        n_visited: outputs.n_visited,
        n_fitted: outputs.n_fitted,
        n_degenerate: outputs.n_degenerate,
        cancelled: outputs.cancelled,
        ..Default::default()
    };

    let predictions: Vec<f64> = outputs
        .predictions
        .iter()
        .flat_map(|g| g.as_slice().iter().copied())
        .collect();

    let copied = ffi_try(out_error, || {
        r.future_years = alloc_copy(&outputs.future_years)?;
        r.predictions = alloc_copy(&predictions)?;
        r.r2 = alloc_copy(outputs.r2.as_slice())?;
        r.rmse = alloc_copy(outputs.rmse.as_slice())?;
        Ok(())
    });
    if copied.is_none() {
        release_fit_result(r);
        return false;
    }
    true
}

/// Summarize a fit: R² and RMSE statistics, robust share and a scatter sample.
///
/// `input` must be the raster stack the fit was computed from.
///
/// # Safety
/// All pointer arguments must be valid and non-null.
#[no_mangle]
pub unsafe extern "C" fn ntl_summarize(
    input: *const RasterStackInput,
    fit: *const FitResult,
    options: *const SummaryOptions,
    out_result: *mut SummaryResult,
    out_error: *mut NtlError,
) -> bool {
    let ptrs = [
        input as *const core::ffi::c_void,
        fit as *const core::ffi::c_void,
        options as *const core::ffi::c_void,
        out_result as *const core::ffi::c_void,
    ];
    crate::error_handling::init_error(out_error);
    if check_null_pointers(out_error, &ptrs) {
        return false;
    }

    let outcome = ffi_try(out_error, || {
        let (volume, validity) = assemble_input(&*input)?;
        let outputs = outputs_from_fit_result(&*fit)?;
        let summary = ntl_fcst_core::summarize(
            &outputs,
            &validity,
            &volume,
            &ntl_fcst_core::SummaryOptions::from(&*options),
        )?;

        let (actual, predicted): (Vec<f64>, Vec<f64>) =
            summary.scatter.points.iter().copied().unzip();
        let scatter_actual = alloc_copy(&actual)?;
        let scatter_predicted = match alloc_copy(&predicted) {
            Ok(p) => p,
            Err(e) => {
                free_ptr(scatter_actual as *mut core::ffi::c_void);
                return Err(e);
            }
        };

        Ok(SummaryResult {
            r2_mean: summary.r2.mean,
            r2_min: summary.r2.min,
            r2_max: summary.r2.max,
            rmse_mean: summary.rmse.mean,
            rmse_min: summary.rmse.min,
            rmse_max: summary.rmse.max,
            n_defined: summary.r2.count,
            robust_pct: summary.robust_pct,
            robust_threshold: summary.robust_threshold,
            scatter_year: summary.scatter.future_year,
            scatter_actual,
            scatter_predicted,
            n_scatter: actual.len(),
        })
    });

    match outcome {
        Some(result) => {
            *out_result = result;
            true
        }
        None => false,
    }
}

/// Export a summary as a JSON object string.
///
/// The string must be released with `ntl_free_string`.
///
/// # Safety
/// All pointer arguments must be valid and non-null.
#[cfg(feature = "json")]
#[no_mangle]
pub unsafe extern "C" fn ntl_summary_to_json(
    summary: *const SummaryResult,
    out_json: *mut *mut c_char,
    out_error: *mut NtlError,
) -> bool {
    use ntl_fcst_core::ForecastError;

    let ptrs = [
        summary as *const core::ffi::c_void,
        out_json as *const core::ffi::c_void,
    ];
    crate::error_handling::init_error(out_error);
    if check_null_pointers(out_error, &ptrs) {
        return false;
    }

    let outcome = ffi_try(out_error, || {
        let s = &*summary;
        let value = serde_json::json!({
            "r2": { "mean": s.r2_mean, "min": s.r2_min, "max": s.r2_max },
            "rmse": { "mean": s.rmse_mean, "min": s.rmse_min, "max": s.rmse_max },
            "n_defined": s.n_defined,
            "robust_threshold": s.robust_threshold,
            "robust_pct": s.robust_pct,
            "scatter": { "future_year": s.scatter_year, "n_points": s.n_scatter },
        });
        let text = serde_json::to_string(&value)
            .map_err(|e| ForecastError::InternalError(e.to_string()))?;
        let ptr = alloc_c_string(&text);
        if ptr.is_null() {
            return Err(ForecastError::AllocationError(
                "Memory allocation failed".to_string(),
            ));
        }
        Ok(ptr)
    });

    match outcome {
        Some(ptr) => {
            *out_json = ptr;
            true
        }
        None => false,
    }
}

// ============================================================================
// Configuration Functions
// ============================================================================

/// Parse a comma-separated list of future years.
///
/// # Safety
/// All pointer arguments must be valid and non-null.
#[no_mangle]
pub unsafe extern "C" fn ntl_parse_future_years(
    input: *const c_char,
    out_years: *mut *mut c_int,
    out_count: *mut size_t,
    out_error: *mut NtlError,
) -> bool {
    let ptrs = [
        input as *const core::ffi::c_void,
        out_years as *const core::ffi::c_void,
        out_count as *const core::ffi::c_void,
    ];
    crate::error_handling::init_error(out_error);
    if check_null_pointers(out_error, &ptrs) {
        return false;
    }

    let outcome = ffi_try(out_error, || {
        let years = ntl_fcst_core::parse_future_years(c_str_to_str(input, "future years")?)?;
        Ok((alloc_copy(&years)?, years.len()))
    });

    match outcome {
        Some((ptr, n)) => {
            *out_years = ptr;
            *out_count = n;
            true
        }
        None => false,
    }
}

unsafe fn list_names(
    names: Vec<String>,
    out_names: *mut *mut *mut c_char,
    out_count: *mut size_t,
) -> bool {
    if out_names.is_null() || out_count.is_null() {
        return false;
    }
    if !alloc_string_array(&names, out_names) {
        *out_count = 0;
        return false;
    }
    *out_count = names.len();
    true
}

/// List the model names, in menu-index order.
///
/// The array must be released with `ntl_free_string_array`.
///
/// # Safety
/// All pointer arguments must be valid and non-null.
#[no_mangle]
pub unsafe extern "C" fn ntl_list_models(
    out_names: *mut *mut *mut c_char,
    out_count: *mut size_t,
) -> bool {
    list_names(ntl_fcst_core::list_models(), out_names, out_count)
}

/// List the normalization names, in menu-index order.
///
/// # Safety
/// All pointer arguments must be valid and non-null.
#[no_mangle]
pub unsafe extern "C" fn ntl_list_normalizations(
    out_names: *mut *mut *mut c_char,
    out_count: *mut size_t,
) -> bool {
    list_names(ntl_fcst_core::list_normalizations(), out_names, out_count)
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a FitResult.
///
/// # Safety
/// The result pointer must be valid or null.
#[no_mangle]
pub unsafe extern "C" fn ntl_free_fit_result(result: *mut FitResult) {
    if result.is_null() {
        return;
    }
    release_fit_result(&mut *result);
}

/// Free a SummaryResult.
///
/// # Safety
/// The result pointer must be valid or null.
#[no_mangle]
pub unsafe extern "C" fn ntl_free_summary_result(result: *mut SummaryResult) {
    if result.is_null() {
        return;
    }
    let r = &mut *result;
    free_fields!(r, scatter_actual, scatter_predicted);
}

/// Free a year array returned by `ntl_parse_future_years`.
///
/// # Safety
/// The pointer must be valid or null.
#[no_mangle]
pub unsafe extern "C" fn ntl_free_years(years: *mut c_int) {
    free_ptr(years as *mut core::ffi::c_void);
}

/// Free a string returned by this library.
///
/// # Safety
/// The pointer must be valid or null.
#[no_mangle]
pub unsafe extern "C" fn ntl_free_string(s: *mut c_char) {
    free_ptr(s as *mut core::ffi::c_void);
}

/// Free a string array returned by `ntl_list_models` or `ntl_list_normalizations`.
///
/// # Safety
/// The pointer must be valid or null and `count` must match the listing.
#[no_mangle]
pub unsafe extern "C" fn ntl_free_string_array(names: *mut *mut c_char, count: size_t) {
    if names.is_null() {
        return;
    }
    for i in 0..count {
        free_ptr(*names.add(i) as *mut core::ffi::c_void);
    }
    free_ptr(names as *mut core::ffi::c_void);
}

/// Free a double array.
///
/// # Safety
/// The pointer must be valid or null.
#[no_mangle]
pub unsafe extern "C" fn ntl_free_double_array(values: *mut c_double) {
    free_ptr(values as *mut core::ffi::c_void);
}

// ============================================================================
// Version
// ============================================================================

#[no_mangle]
pub extern "C" fn ntl_fcst_version() -> *const libc::c_char {
    static VERSION: &[u8] = b"0.1.0\0";
    VERSION.as_ptr() as *const libc::c_char
}
