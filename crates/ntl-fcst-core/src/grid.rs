//! Plain 2-D numeric grids.
//!
//! A [`Grid`] is the unit exchanged with raster collaborators: a row-major
//! buffer of `rows * cols` values with no georeferencing attached.

use crate::error::{ForecastError, Result};

/// Row-major 2-D grid of `f64` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Grid {
    /// Build a grid from a row-major buffer.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(ForecastError::InvalidInput(format!(
                "Grid buffer has {} values, expected {}x{} = {}",
                data.len(),
                rows,
                cols,
                rows * cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a grid from nested rows. All rows must have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, |r| r.len());
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(ForecastError::InvalidInput(format!(
                "Row {} has {} values, expected {}",
                i,
                row.len(),
                n_cols
            )));
        }
        Ok(Self {
            rows: n_rows,
            cols: n_cols,
            data: rows.concat(),
        })
    }

    /// Grid of the given shape with every cell set to `value`.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `(row, col)`, or `None` when out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    /// Row-major view of the cells.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Grid::from_vec(2, 2, vec![1.0; 4]).is_ok());
        assert!(matches!(
            Grid::from_vec(2, 2, vec![1.0; 3]),
            Err(ForecastError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_rows_is_row_major() {
        let grid = Grid::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(grid.get(1, 0), Some(4.0));
        assert_eq!(grid.get(2, 0), None);
    }

    #[test]
    fn test_from_rows_ragged() {
        let result = Grid::from_rows(&[vec![1.0, 2.0], vec![3.0]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_filled() {
        let grid = Grid::filled(3, 2, f64::NAN);
        assert_eq!(grid.len(), 6);
        assert!(grid.as_slice().iter().all(|v| v.is_nan()));
    }
}
