//! Row-major embedding matrix.
//!
//! One row per document, one column per embedding dimension. Built once and
//! then only read; the tuner borrows it for the duration of a search.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};

/// Dense N × D matrix of `f32` values stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    data: Vec<f32>,
    n_rows: usize,
    n_cols: usize,
}

impl EmbeddingMatrix {
    /// Build from a flat buffer.
    ///
    /// # Errors
    ///
    /// - `EmptyInput` if `n_rows` or `n_cols` is zero
    /// - `DimensionMismatch` if `data.len() != n_rows * n_cols`
    /// - `InvalidConfiguration` if any value is NaN or infinite
    pub fn from_flat(data: Vec<f32>, n_rows: usize, n_cols: usize) -> Result<Self> {
        if n_rows == 0 || n_cols == 0 {
            return Err(TunerError::EmptyInput);
        }
        if data.len() != n_rows * n_cols {
            return Err(TunerError::dimension_mismatch(n_rows * n_cols, data.len()));
        }
        if let Some(idx) = data.iter().position(|v| !v.is_finite()) {
            return Err(TunerError::invalid_configuration(format!(
                "embedding value at row {}, column {} is not finite",
                idx / n_cols,
                idx % n_cols
            )));
        }
        Ok(Self {
            data,
            n_rows,
            n_cols,
        })
    }

    /// Build from one vector per row. All rows must share the first row's width.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let n_cols = rows.first().map(Vec::len).ok_or(TunerError::EmptyInput)?;
        let mut data = Vec::with_capacity(rows.len() * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(TunerError::dimension_mismatch(n_cols, row.len()));
            }
            data.extend_from_slice(row);
        }
        Self::from_flat(data, rows.len(), n_cols)
    }

    /// Number of rows (documents).
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns (embedding dimension).
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Borrow row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n_rows`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f32] {
        let start = i * self.n_cols;
        &self.data[start..start + self.n_cols]
    }

    /// Iterate over rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.n_cols)
    }

    /// Flat row-major view.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Copy rows into owned vectors.
    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        self.rows().map(<[f32]>::to_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_roundtrips_shape() {
        let m = EmbeddingMatrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(m.n_rows(), 2);
        assert_eq!(m.n_cols(), 3);
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
        assert_eq!(m.rows().count(), 2);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = EmbeddingMatrix::from_rows(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert_eq!(err, TunerError::dimension_mismatch(2, 1));
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(
            EmbeddingMatrix::from_rows(&[]).unwrap_err(),
            TunerError::EmptyInput
        );
        assert_eq!(
            EmbeddingMatrix::from_flat(vec![], 0, 4).unwrap_err(),
            TunerError::EmptyInput
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = EmbeddingMatrix::from_flat(vec![0.0, f32::NAN, 1.0, 2.0], 2, 2).unwrap_err();
        assert!(err.to_string().contains("row 0, column 1"), "{err}");
    }
}
