//! Error types for the forecasting engine.

use thiserror::Error;

/// Result type for forecast operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Error types for forecasting operations.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Null pointer argument: {0}")]
    NullPointer(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Allocation error: {0}")]
    AllocationError(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Insufficient data: need at least {needed} input series, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Shape mismatch for {what}: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    ShapeMismatch {
        what: String,
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    #[error("No valid future years provided")]
    NoFutureYears,

    #[error("Invalid parameter '{param}' = '{value}': {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ForecastError {
    /// Convert to an error code for FFI.
    pub fn to_code(&self) -> i32 {
        match self {
            ForecastError::NullPointer(_) => 1,
            ForecastError::InvalidInput(_) => 2,
            ForecastError::ComputationError(_) => 3,
            ForecastError::AllocationError(_) => 4,
            ForecastError::InvalidModel(_) => 5,
            ForecastError::InsufficientData { .. } => 6,
            ForecastError::ShapeMismatch { .. } => 7,
            ForecastError::NoFutureYears => 8,
            ForecastError::InvalidParameter { .. } => 9,
            ForecastError::EmptyResult(_) => 10,
            ForecastError::Io(_) => 11,
            ForecastError::InternalError(_) => 12,
        }
    }

    /// Whether this error is a fatal configuration error raised before any
    /// per-pixel work starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ForecastError::InvalidInput(_)
                | ForecastError::InvalidModel(_)
                | ForecastError::InsufficientData { .. }
                | ForecastError::ShapeMismatch { .. }
                | ForecastError::NoFutureYears
                | ForecastError::InvalidParameter { .. }
        )
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(err: std::io::Error) -> Self {
        ForecastError::Io(err.to_string())
    }
}
