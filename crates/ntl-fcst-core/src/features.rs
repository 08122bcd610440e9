//! Feature expansion of time indices.
//!
//! Linear, Ridge and Lasso regress on the year itself; Polynomial adds the
//! squared year as a second column. The basis is fixed from the model
//! choice, so the observed and future years always go through the same
//! transform and the regression stays linear in its features.

use crate::options::ModelType;

/// Column-major feature matrix: `columns[feature][observation]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<Vec<f64>>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Number of observations.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of feature columns.
    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, j: usize) -> &[f64] {
        &self.columns[j]
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    /// Feature values of observation `i`.
    pub fn row(&self, i: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[i]).collect()
    }
}

/// Expansion basis applied to a column of years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureBasis {
    /// `[t]`
    Identity,
    /// `[t, t^2]`
    Quadratic,
}

impl FeatureBasis {
    /// Basis used by a model family.
    pub fn for_model(model: ModelType) -> Self {
        match model {
            ModelType::Polynomial => FeatureBasis::Quadratic,
            ModelType::Linear | ModelType::Ridge | ModelType::Lasso => FeatureBasis::Identity,
        }
    }

    /// Number of output columns.
    pub fn n_features(&self) -> usize {
        match self {
            FeatureBasis::Identity => 1,
            FeatureBasis::Quadratic => 2,
        }
    }

    /// Expand a column of years.
    pub fn expand(&self, years: &[i32]) -> FeatureMatrix {
        let t: Vec<f64> = years.iter().map(|&y| y as f64).collect();
        let columns = match self {
            FeatureBasis::Identity => vec![t],
            FeatureBasis::Quadratic => {
                let squared = t.iter().map(|v| v * v).collect();
                vec![t, squared]
            }
        };
        FeatureMatrix {
            columns,
            n_rows: years.len(),
        }
    }
}

/// Observed and future features, expanded once per run and shared by every pixel.
#[derive(Debug, Clone)]
pub struct ExpandedFeatures {
    pub basis: FeatureBasis,
    pub observed: FeatureMatrix,
    pub future: FeatureMatrix,
}

impl ExpandedFeatures {
    pub fn new(model: ModelType, observed_years: &[i32], future_years: &[i32]) -> Self {
        let basis = FeatureBasis::for_model(model);
        Self {
            basis,
            observed: basis.expand(observed_years),
            future: basis.expand(future_years),
        }
    }
}
