//! Per-pixel normalization of a temporal series.
//!
//! Every pixel fits its own [`Scaler`]; scalers are plain values and are never
//! shared between pixels. A series with zero range (MinMax) or zero variance
//! (Z-score) keeps a scale of 1, so it maps to all zeros and the inverse
//! transform is still exact.

use statrs::statistics::Statistics;

use crate::options::NormalizationType;

/// Fitted affine scaler: `forward(x) = (x - offset) / scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scaler {
    Identity,
    MinMax { min: f64, scale: f64, degenerate: bool },
    ZScore { mean: f64, std: f64, degenerate: bool },
}

/// Scale below this multiple of machine epsilon (relative to the series
/// magnitude) counts as zero.
const ZERO_SCALE_FACTOR: f64 = 10.0;

/// Replace a numerically zero scale by 1. Returns the scale and whether it was replaced.
fn handle_zero_scale(scale: f64, magnitude: f64) -> (f64, bool) {
    let bound = ZERO_SCALE_FACTOR * f64::EPSILON * magnitude.abs().max(1.0);
    if scale.is_finite() && scale > bound {
        (scale, false)
    } else {
        (1.0, true)
    }
}

impl Scaler {
    /// Fit a scaler of `kind` on one pixel's observed series.
    pub fn fit(kind: NormalizationType, series: &[f64]) -> Self {
        match kind {
            NormalizationType::None => Scaler::Identity,
            NormalizationType::MinMax => {
                let min = Statistics::min(series);
                let max = Statistics::max(series);
                let (scale, degenerate) = handle_zero_scale(max - min, max.abs().max(min.abs()));
                Scaler::MinMax {
                    min,
                    scale,
                    degenerate,
                }
            }
            NormalizationType::ZScore => {
                let mean = Statistics::mean(series);
                let (std, degenerate) =
                    handle_zero_scale(Statistics::population_std_dev(series), mean);
                Scaler::ZScore {
                    mean,
                    std,
                    degenerate,
                }
            }
        }
    }

    /// Whether the fitted series had zero range or zero variance.
    pub fn is_degenerate(&self) -> bool {
        match self {
            Scaler::Identity => false,
            Scaler::MinMax { degenerate, .. } | Scaler::ZScore { degenerate, .. } => *degenerate,
        }
    }

    #[inline]
    fn offset_scale(&self) -> (f64, f64) {
        match *self {
            Scaler::Identity => (0.0, 1.0),
            Scaler::MinMax { min, scale, .. } => (min, scale),
            Scaler::ZScore { mean, std, .. } => (mean, std),
        }
    }

    #[inline]
    pub fn forward(&self, x: f64) -> f64 {
        let (offset, scale) = self.offset_scale();
        (x - offset) / scale
    }

    #[inline]
    pub fn inverse(&self, z: f64) -> f64 {
        let (offset, scale) = self.offset_scale();
        z * scale + offset
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        match self {
            Scaler::Identity => values.to_vec(),
            _ => values.iter().map(|&x| self.forward(x)).collect(),
        }
    }

    pub fn inverse_transform(&self, values: &[f64]) -> Vec<f64> {
        match self {
            Scaler::Identity => values.to_vec(),
            _ => values.iter().map(|&z| self.inverse(z)).collect(),
        }
    }
}

/// Fit a scaler on `series` and return it with the normalized series.
pub fn fit_transform(kind: NormalizationType, series: &[f64]) -> (Scaler, Vec<f64>) {
    let scaler = Scaler::fit(kind, series);
    let normalized = scaler.transform(series);
    (scaler, normalized)
}
