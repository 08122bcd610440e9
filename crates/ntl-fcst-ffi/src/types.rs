//! C-compatible type definitions for FFI boundary.
//!
//! These types are designed to be used across the Rust/C++ boundary. Every
//! heap pointer inside a result struct is allocated with `malloc` and must be
//! released with the matching `ntl_free_*` function.

use core::ffi::c_void;
use libc::{c_char, c_double, c_int, size_t};
use std::ffi::CString;

use ntl_fcst_core::{
    Feedback, ForecastError, ForecastOptions, ModelType, NormalizationType, R2Space,
};

/// Error codes for FFI boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    NullPointer = 1,
    InvalidInput = 2,
    ComputationError = 3,
    AllocationError = 4,
    InvalidModel = 5,
    InsufficientData = 6,
    ShapeMismatch = 7,
    NoFutureYears = 8,
    InvalidParameter = 9,
    EmptyResult = 10,
    IoError = 11,
    InternalError = 12,
    PanicCaught = 13,
}

impl From<&ForecastError> for ErrorCode {
    fn from(err: &ForecastError) -> Self {
        match err.to_code() {
            1 => ErrorCode::NullPointer,
            2 => ErrorCode::InvalidInput,
            3 => ErrorCode::ComputationError,
            4 => ErrorCode::AllocationError,
            5 => ErrorCode::InvalidModel,
            6 => ErrorCode::InsufficientData,
            7 => ErrorCode::ShapeMismatch,
            8 => ErrorCode::NoFutureYears,
            9 => ErrorCode::InvalidParameter,
            10 => ErrorCode::EmptyResult,
            11 => ErrorCode::IoError,
            _ => ErrorCode::InternalError,
        }
    }
}

/// Error structure with message buffer for FFI.
#[repr(C)]
pub struct NtlError {
    pub code: ErrorCode,
    pub message: [c_char; 256],
}

impl NtlError {
    /// Create a success error (no error).
    pub fn success() -> Self {
        Self {
            code: ErrorCode::Success,
            message: [0; 256],
        }
    }

    /// Set an error with code and message.
    pub fn set_error(&mut self, code: ErrorCode, msg: &str) {
        self.code = code;
        let bytes = msg.as_bytes();
        let len = bytes.len().min(255);
        for (i, &b) in bytes[..len].iter().enumerate() {
            self.message[i] = b as c_char;
        }
        self.message[len] = 0; // Null terminator
    }
}

impl Default for NtlError {
    fn default() -> Self {
        Self::success()
    }
}

/// Raster stack passed in by the host.
///
/// `values` holds `n_times * rows * cols` doubles, one row-major grid per
/// observed year, oldest first.
#[repr(C)]
pub struct RasterStackInput {
    pub values: *const c_double,
    pub n_times: size_t,
    pub rows: size_t,
    pub cols: size_t,
    /// NoData sentinel, only honored when `has_nodata` is set
    pub nodata: c_double,
    pub has_nodata: bool,
}

/// Regression options.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    /// Index into `ntl_list_models` (0 = Linear)
    pub model: c_int,
    /// Index into `ntl_list_normalizations` (0 = None)
    pub normalization: c_int,
    pub ridge_alpha: c_double,
    pub lasso_alpha: c_double,
    pub lasso_max_iter: c_int,
    pub lasso_tol: c_double,
    /// Report R² against the de-normalized fit
    pub r2_original_space: bool,
    /// Fit pixels on a thread pool
    pub parallel: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        let core = ForecastOptions::default();
        Self {
            model: 0,
            normalization: 0,
            ridge_alpha: core.ridge_alpha,
            lasso_alpha: core.lasso_alpha,
            lasso_max_iter: core.lasso_max_iter as c_int,
            lasso_tol: core.lasso_tol,
            r2_original_space: false,
            parallel: core.parallel,
        }
    }
}

impl TryFrom<&FitOptions> for ForecastOptions {
    type Error = ForecastError;

    fn try_from(opts: &FitOptions) -> Result<Self, ForecastError> {
        if opts.lasso_max_iter <= 0 {
            return Err(ForecastError::InvalidParameter {
                param: "lasso_max_iter".to_string(),
                value: opts.lasso_max_iter.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(ForecastOptions {
            model: ModelType::from_index(opts.model)?,
            normalization: NormalizationType::from_index(opts.normalization)?,
            ridge_alpha: opts.ridge_alpha,
            lasso_alpha: opts.lasso_alpha,
            lasso_max_iter: opts.lasso_max_iter as usize,
            lasso_tol: opts.lasso_tol,
            r2_space: if opts.r2_original_space {
                R2Space::Original
            } else {
                R2Space::Normalized
            },
            parallel: opts.parallel,
        })
    }
}

/// Summary options.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SummaryOptions {
    pub robust_threshold: c_double,
    /// Maximum number of scatter pairs
    pub sample_cap: size_t,
    /// Sampling seed, only honored when `has_seed` is set
    pub seed: u64,
    pub has_seed: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        let core = ntl_fcst_core::SummaryOptions::default();
        Self {
            robust_threshold: core.robust_threshold,
            sample_cap: core.sample_cap,
            seed: 0,
            has_seed: false,
        }
    }
}

impl From<&SummaryOptions> for ntl_fcst_core::SummaryOptions {
    fn from(opts: &SummaryOptions) -> Self {
        Self {
            robust_threshold: opts.robust_threshold,
            sample_cap: opts.sample_cap,
            seed: opts.has_seed.then_some(opts.seed),
        }
    }
}

/// Host callbacks for progress, cancellation and log lines.
///
/// Every callback is optional; `user_data` is passed back unchanged.
#[repr(C)]
pub struct FeedbackCallbacks {
    pub user_data: *mut c_void,
    pub report_percent: Option<unsafe extern "C" fn(user_data: *mut c_void, percent: u8)>,
    pub is_cancelled: Option<unsafe extern "C" fn(user_data: *mut c_void) -> bool>,
    pub log: Option<unsafe extern "C" fn(user_data: *mut c_void, message: *const c_char)>,
}

impl Feedback for FeedbackCallbacks {
    fn report_percent(&self, percent: u8) {
        if let Some(cb) = self.report_percent {
            unsafe { cb(self.user_data, percent) }
        }
    }

    fn is_cancelled(&self) -> bool {
        match self.is_cancelled {
            Some(cb) => unsafe { cb(self.user_data) },
            None => false,
        }
    }

    fn log(&self, message: &str) {
        if let Some(cb) = self.log {
            // Interior NULs cannot cross the boundary
            let line = CString::new(message.replace('\0', " ")).unwrap_or_default();
            unsafe { cb(self.user_data, line.as_ptr()) }
        }
    }
}

/// Forecast grids returned by `ntl_fit_and_forecast`.
#[repr(C)]
pub struct FitResult {
    pub rows: size_t,
    pub cols: size_t,
    /// Number of forecast years and prediction grids
    pub n_future: size_t,
    pub future_years: *mut c_int,
    /// `n_future * rows * cols` predictions, one row-major grid per year
    pub predictions: *mut c_double,
    /// Per-pixel R² (NaN where undefined)
    pub r2: *mut c_double,
    /// Per-pixel RMSE (NaN where undefined)
    pub rmse: *mut c_double,
    pub n_visited: size_t,
    pub n_fitted: size_t,
    pub n_degenerate: size_t,
    pub cancelled: bool,
}

impl Default for FitResult {
    fn default() -> Self {
        Self {
            rows: 0,
            cols: 0,
            n_future: 0,
            future_years: std::ptr::null_mut(),
            predictions: std::ptr::null_mut(),
            r2: std::ptr::null_mut(),
            rmse: std::ptr::null_mut(),
            n_visited: 0,
            n_fitted: 0,
            n_degenerate: 0,
            cancelled: false,
        }
    }
}

/// Metric summary returned by `ntl_summarize`.
#[repr(C)]
pub struct SummaryResult {
    pub r2_mean: c_double,
    pub r2_min: c_double,
    pub r2_max: c_double,
    pub rmse_mean: c_double,
    pub rmse_min: c_double,
    pub rmse_max: c_double,
    /// Pixels with a defined R²
    pub n_defined: size_t,
    /// Percentage of defined pixels at or above `robust_threshold`
    pub robust_pct: c_double,
    pub robust_threshold: c_double,
    /// Year of the sampled predictions
    pub scatter_year: c_int,
    pub scatter_actual: *mut c_double,
    pub scatter_predicted: *mut c_double,
    pub n_scatter: size_t,
}

impl Default for SummaryResult {
    fn default() -> Self {
        Self {
            r2_mean: f64::NAN,
            r2_min: f64::NAN,
            r2_max: f64::NAN,
            rmse_mean: f64::NAN,
            rmse_min: f64::NAN,
            rmse_max: f64::NAN,
            n_defined: 0,
            robust_pct: f64::NAN,
            robust_threshold: f64::NAN,
            scatter_year: 0,
            scatter_actual: std::ptr::null_mut(),
            scatter_predicted: std::ptr::null_mut(),
            n_scatter: 0,
        }
    }
}
