//! Row-major f32 matrix plus the dimension coercion and L2 normalization
//! applied to provider output before anything is written.

use core_types::BuildError;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatrix {
    rows: usize,
    dims: usize,
    data: Vec<f32>,
}

impl VectorMatrix {
    pub fn zeros(rows: usize, dims: usize) -> Self {
        Self {
            rows,
            dims,
            data: vec![0.0; rows * dims],
        }
    }

    /// Copy provider rows into a `rows × dims` matrix, truncating longer rows
    /// and zero-padding shorter ones. A mismatch is logged once as a
    /// recoverable [`BuildError::DimensionMismatch`].
    pub fn from_rows(rows: &[Vec<f32>], dims: usize) -> Self {
        let mut matrix = Self::zeros(rows.len(), dims);
        let mut reported = false;
        for (i, row) in rows.iter().enumerate() {
            if row.len() != dims && !reported {
                let notice = BuildError::DimensionMismatch {
                    expected: dims,
                    actual: row.len(),
                };
                warn!(
                    %notice,
                    row = i,
                    "coercing provider vectors to the configured dimension"
                );
                reported = true;
            }
            let n = row.len().min(dims);
            matrix.row_mut(i)[..n].copy_from_slice(&row[..n]);
        }
        matrix
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub const fn dims(&self) -> usize {
        self.dims
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dims..(i + 1) * self.dims]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        &mut self.data[i * self.dims..(i + 1) * self.dims]
    }

    /// Contiguous slice covering rows `start..end`.
    pub fn row_range(&self, start: usize, end: usize) -> &[f32] {
        &self.data[start * self.dims..end * self.dims]
    }

    /// Divide every row by its L2 norm. Zero rows are left as they are.
    pub fn normalize_rows(&mut self) {
        let mut zero_rows = 0usize;
        for i in 0..self.rows {
            if !l2_normalize(self.row_mut(i)) {
                zero_rows += 1;
            }
        }
        debug!(rows = self.rows, dims = self.dims, zero_rows, "normalized vectors");
    }

    /// Dot product of rows `a` and `b`; cosine similarity once normalized.
    pub fn dot(&self, a: usize, b: usize) -> f32 {
        dot(self.row(a), self.row(b))
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Normalize in place; returns `false` (and leaves `v` alone) for a zero vector.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}
