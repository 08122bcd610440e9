//! Run configuration: model family, normalization, years and report options.

use crate::error::{ForecastError, Result};

/// First observed year of the default nighttime-light series.
pub const DEFAULT_START_YEAR: i32 = 2013;

/// Default future years, as typed by a user.
pub const DEFAULT_FUTURE_YEARS: &str = "2028,2033,2038,2043";

/// Default regularization strength for Ridge and Lasso.
pub const DEFAULT_ALPHA: f64 = 1.0;

/// R² at or above this value marks a pixel as robust.
pub const DEFAULT_ROBUST_THRESHOLD: f64 = 0.7;

/// Maximum number of actual-vs-predicted pairs kept for plotting.
pub const DEFAULT_SAMPLE_CAP: usize = 10_000;

/// Regression family fitted to every pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelType {
    /// Ordinary least squares on the year.
    #[default]
    Linear,
    /// Ordinary least squares on the year and its square.
    Polynomial,
    /// L2-penalized least squares on the year.
    Ridge,
    /// L1-penalized least squares on the year.
    Lasso,
}

impl std::str::FromStr for ModelType {
    type Err = ForecastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Linear" => return Ok(ModelType::Linear),
            "Polynomial" | "Polynomial (degree 2)" => return Ok(ModelType::Polynomial),
            "Ridge" => return Ok(ModelType::Ridge),
            "Lasso" => return Ok(ModelType::Lasso),
            _ => {}
        }

        // Fallback: case-insensitive matching for convenience
        match s.trim().to_lowercase().as_str() {
            "linear" | "ols" | "linear_regression" => Ok(ModelType::Linear),
            "polynomial" | "poly" | "poly2" | "quadratic" | "polynomial_2" => {
                Ok(ModelType::Polynomial)
            }
            "ridge" | "l2" => Ok(ModelType::Ridge),
            "lasso" | "l1" => Ok(ModelType::Lasso),
            _ => Err(ForecastError::InvalidModel(format!("Unknown model: {}", s))),
        }
    }
}

impl ModelType {
    /// All model families in menu order.
    pub const ALL: [ModelType; 4] = [
        ModelType::Linear,
        ModelType::Polynomial,
        ModelType::Ridge,
        ModelType::Lasso,
    ];

    /// Canonical model name.
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::Linear => "Linear",
            ModelType::Polynomial => "Polynomial",
            ModelType::Ridge => "Ridge",
            ModelType::Lasso => "Lasso",
        }
    }

    /// Model for a zero-based menu index (Linear, Polynomial, Ridge, Lasso).
    pub fn from_index(index: i32) -> Result<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| ForecastError::InvalidModel(format!("Unknown model index: {}", index)))
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-pixel rescaling applied before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizationType {
    #[default]
    None,
    /// Rescale to `[0, 1]` with the pixel's own min and max.
    MinMax,
    /// Center by the pixel's mean, scale by its standard deviation.
    ZScore,
}

impl std::str::FromStr for NormalizationType {
    type Err = ForecastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "None" => return Ok(NormalizationType::None),
            "MinMax" => return Ok(NormalizationType::MinMax),
            "Z-score" | "ZScore" => return Ok(NormalizationType::ZScore),
            _ => {}
        }

        match s.trim().to_lowercase().as_str() {
            "none" | "" | "identity" => Ok(NormalizationType::None),
            "minmax" | "min_max" | "min-max" => Ok(NormalizationType::MinMax),
            "zscore" | "z_score" | "z-score" | "standard" | "standardize" => {
                Ok(NormalizationType::ZScore)
            }
            _ => Err(ForecastError::InvalidParameter {
                param: "normalization".to_string(),
                value: s.to_string(),
                reason: "expected one of None, MinMax, Z-score".to_string(),
            }),
        }
    }
}

impl NormalizationType {
    /// All normalization kinds in menu order.
    pub const ALL: [NormalizationType; 3] = [
        NormalizationType::None,
        NormalizationType::MinMax,
        NormalizationType::ZScore,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NormalizationType::None => "None",
            NormalizationType::MinMax => "MinMax",
            NormalizationType::ZScore => "Z-score",
        }
    }

    /// Normalization for a zero-based menu index (None, MinMax, Z-score).
    pub fn from_index(index: i32) -> Result<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| ForecastError::InvalidParameter {
                param: "normalization".to_string(),
                value: index.to_string(),
                reason: "index out of range".to_string(),
            })
    }
}

impl std::fmt::Display for NormalizationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Space in which the per-pixel R² is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum R2Space {
    /// On the (possibly normalized) training target, like the fitted model's own score.
    #[default]
    Normalized,
    /// On the reconstructed values in original units.
    Original,
}

/// Options for the pixel-wise fit.
#[derive(Debug, Clone)]
pub struct ForecastOptions {
    /// Regression family
    pub model: ModelType,
    /// Per-pixel normalization
    pub normalization: NormalizationType,
    /// Ridge penalty strength
    pub ridge_alpha: f64,
    /// Lasso penalty strength
    pub lasso_alpha: f64,
    /// Maximum coordinate-descent passes for Lasso
    pub lasso_max_iter: usize,
    /// Lasso stops when the largest weighted squared coefficient change,
    /// relative to the target variance, falls below this
    pub lasso_tol: f64,
    /// Where R² is measured
    pub r2_space: R2Space,
    /// Fit pixels in parallel blocks (needs the `native` feature)
    pub parallel: bool,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            model: ModelType::Linear,
            normalization: NormalizationType::None,
            ridge_alpha: DEFAULT_ALPHA,
            lasso_alpha: DEFAULT_ALPHA,
            lasso_max_iter: 1000,
            lasso_tol: 1e-4,
            r2_space: R2Space::Normalized,
            parallel: false,
        }
    }
}

impl ForecastOptions {
    /// Check numeric parameters.
    pub fn validate(&self) -> Result<()> {
        for (param, value) in [("ridge_alpha", self.ridge_alpha), ("lasso_alpha", self.lasso_alpha)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ForecastError::InvalidParameter {
                    param: param.to_string(),
                    value: value.to_string(),
                    reason: "must be a finite non-negative number".to_string(),
                });
            }
        }
        if self.lasso_max_iter == 0 {
            return Err(ForecastError::InvalidParameter {
                param: "lasso_max_iter".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !(self.lasso_tol.is_finite() && self.lasso_tol > 0.0) {
            return Err(ForecastError::InvalidParameter {
                param: "lasso_tol".to_string(),
                value: self.lasso_tol.to_string(),
                reason: "must be a finite positive number".to_string(),
            });
        }
        Ok(())
    }
}

/// Options for the corpus-wide summary.
#[derive(Debug, Clone)]
pub struct SummaryOptions {
    /// R² threshold for a robust pixel
    pub robust_threshold: f64,
    /// Cap on the scatter sample size
    pub sample_cap: usize,
    /// Seed for the scatter sample; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            robust_threshold: DEFAULT_ROBUST_THRESHOLD,
            sample_cap: DEFAULT_SAMPLE_CAP,
            seed: None,
        }
    }
}

/// Parse a comma-separated list of future years.
///
/// Tokens that are not plain digit strings are skipped. Duplicates keep their
/// first position.
///
/// # Errors
/// [`ForecastError::NoFutureYears`] when no token parses.
pub fn parse_future_years(input: &str) -> Result<Vec<i32>> {
    let mut years: Vec<i32> = Vec::new();
    for token in input.split(',') {
        let token = token.trim();
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if let Ok(year) = token.parse::<i32>() {
            if !years.contains(&year) {
                years.push(year);
            }
        }
    }

    if years.is_empty() {
        return Err(ForecastError::NoFutureYears);
    }
    Ok(years)
}

/// Contiguous observed years `start, start + 1, ...` for `n` yearly grids.
pub fn observed_years(start_year: i32, n: usize) -> Vec<i32> {
    (0..n).map(|i| start_year + i as i32).collect()
}

/// List of supported model names.
pub fn list_models() -> Vec<String> {
    ModelType::ALL.iter().map(|m| m.name().to_string()).collect()
}

/// List of supported normalization names.
pub fn list_normalizations() -> Vec<String> {
    NormalizationType::ALL
        .iter()
        .map(|n| n.name().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_from_str() {
        assert_eq!("Linear".parse::<ModelType>().unwrap(), ModelType::Linear);
        assert_eq!(
            "Polynomial (degree 2)".parse::<ModelType>().unwrap(),
            ModelType::Polynomial
        );
        assert_eq!("poly".parse::<ModelType>().unwrap(), ModelType::Polynomial);
        assert_eq!(" RIDGE ".parse::<ModelType>().unwrap(), ModelType::Ridge);
        assert_eq!("l1".parse::<ModelType>().unwrap(), ModelType::Lasso);
        assert!(matches!(
            "Cubic".parse::<ModelType>(),
            Err(ForecastError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_model_names_round_trip() {
        for model in ModelType::ALL {
            assert_eq!(model.name().parse::<ModelType>().unwrap(), model);
        }
        assert_eq!(list_models(), vec!["Linear", "Polynomial", "Ridge", "Lasso"]);
    }

    #[test]
    fn test_from_index() {
        assert_eq!(ModelType::from_index(1).unwrap(), ModelType::Polynomial);
        assert!(ModelType::from_index(4).is_err());
        assert!(ModelType::from_index(-1).is_err());
        assert_eq!(
            NormalizationType::from_index(2).unwrap(),
            NormalizationType::ZScore
        );
        assert!(NormalizationType::from_index(3).is_err());
    }

    #[test]
    fn test_normalization_from_str() {
        assert_eq!(
            "Z-score".parse::<NormalizationType>().unwrap(),
            NormalizationType::ZScore
        );
        assert_eq!(
            "min_max".parse::<NormalizationType>().unwrap(),
            NormalizationType::MinMax
        );
        assert_eq!(
            "none".parse::<NormalizationType>().unwrap(),
            NormalizationType::None
        );
        assert!("log".parse::<NormalizationType>().is_err());
        for kind in NormalizationType::ALL {
            assert_eq!(kind.name().parse::<NormalizationType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_parse_future_years_default() {
        let years = parse_future_years(DEFAULT_FUTURE_YEARS).unwrap();
        assert_eq!(years, vec![2028, 2033, 2038, 2043]);
    }

    #[test]
    fn test_parse_future_years_skips_garbage() {
        let years = parse_future_years(" 2030, abc, -5, 20.5, ,2031 ").unwrap();
        assert_eq!(years, vec![2030, 2031]);
    }

    #[test]
    fn test_parse_future_years_dedup_keeps_order() {
        let years = parse_future_years("2040,2030,2040").unwrap();
        assert_eq!(years, vec![2040, 2030]);
    }

    #[test]
    fn test_parse_future_years_empty() {
        assert!(matches!(
            parse_future_years("next year, soon"),
            Err(ForecastError::NoFutureYears)
        ));
        assert!(matches!(
            parse_future_years(""),
            Err(ForecastError::NoFutureYears)
        ));
    }

    #[test]
    fn test_observed_years() {
        assert_eq!(
            observed_years(DEFAULT_START_YEAR, 3),
            vec![2013, 2014, 2015]
        );
        assert!(observed_years(2013, 0).is_empty());
    }

    #[test]
    fn test_options_validate() {
        assert!(ForecastOptions::default().validate().is_ok());
        let opts = ForecastOptions {
            ridge_alpha: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            opts.validate(),
            Err(ForecastError::InvalidParameter { ref param, .. }) if param == "ridge_alpha"
        ));
        let opts = ForecastOptions {
            lasso_tol: 0.0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }
}
