//! Sparse matrix operations.
//!
//! The global stiffness is accumulated as (row, col, value) triplets and
//! converted once to CSR (Compressed Sparse Row). The conversion sums
//! duplicates in insertion order, so assembling the same element matrices in
//! the same order always produces bit-identical values.

use crate::error::{Error, Result};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::csr::CsrMatrix as NalgebraCsr;

/// Compressed Sparse Row matrix.
pub type CsrMatrix = NalgebraCsr<f64>;

/// Builder for assembling a sparse matrix from triplets (COO format).
#[derive(Debug, Clone)]
pub struct TripletMatrix {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl TripletMatrix {
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self::with_capacity(n_rows, n_cols, 0)
    }

    pub fn with_capacity(n_rows: usize, n_cols: usize, nnz_estimate: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            rows: Vec::with_capacity(nnz_estimate),
            cols: Vec::with_capacity(nnz_estimate),
            values: Vec::with_capacity(nnz_estimate),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Add a value at (row, col). Exact zeros are skipped; duplicates are
    /// summed during conversion.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value != 0.0 {
            self.push(row, col, value);
        }
    }

    /// Reserve an explicit (possibly zero) entry on every diagonal position.
    ///
    /// Call before scattering so the diagonal is present in the CSR pattern
    /// even for DOFs no element touches.
    pub fn add_structural_diagonal(&mut self) {
        for i in 0..self.n_rows.min(self.n_cols) {
            self.push(i, i, 0.0);
        }
    }

    /// Add a dense square submatrix at the given global indices.
    ///
    /// Entries are visited row by row, so for node-major DOF lists the
    /// insertion order is lexicographic in (node i, component a, node l,
    /// component b).
    pub fn add_submatrix(&mut self, dof_indices: &[usize], submatrix: &DMatrix<f64>) {
        let n = dof_indices.len();
        debug_assert_eq!(submatrix.nrows(), n);
        debug_assert_eq!(submatrix.ncols(), n);

        for (i, &row) in dof_indices.iter().enumerate() {
            for (j, &col) in dof_indices.iter().enumerate() {
                self.add(row, col, submatrix[(i, j)]);
            }
        }
    }

    /// Number of stored triplets.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    fn push(&mut self, row: usize, col: usize, value: f64) {
        self.rows.push(row);
        self.cols.push(col);
        self.values.push(value);
    }

    /// Convert to CSR, summing duplicate entries in insertion order.
    ///
    /// # Errors
    ///
    /// [`Error::Solver`] if a triplet lies outside the matrix bounds.
    pub fn to_csr(self) -> Result<CsrMatrix> {
        let nnz = self.values.len();
        let outside = |t: usize| self.rows[t] >= self.n_rows || self.cols[t] >= self.n_cols;
        if let Some(t) = (0..nnz).find(|&t| outside(t)) {
            return Err(Error::Solver(format!(
                "triplet ({}, {}) outside {}x{} matrix",
                self.rows[t], self.cols[t], self.n_rows, self.n_cols
            )));
        }

        // Bucket triplets by row, keeping insertion order within each row.
        let mut bucket_offsets = vec![0usize; self.n_rows + 1];
        for &r in &self.rows {
            bucket_offsets[r + 1] += 1;
        }
        for r in 0..self.n_rows {
            bucket_offsets[r + 1] += bucket_offsets[r];
        }
        let mut order = vec![0usize; nnz];
        let mut cursor = bucket_offsets[..self.n_rows].to_vec();
        for (t, &r) in self.rows.iter().enumerate() {
            order[cursor[r]] = t;
            cursor[r] += 1;
        }

        let mut row_offsets = Vec::with_capacity(self.n_rows + 1);
        let mut col_indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        row_offsets.push(0);

        for r in 0..self.n_rows {
            let bucket = &mut order[bucket_offsets[r]..bucket_offsets[r + 1]];
            // stable: equal columns stay in insertion order
            bucket.sort_by_key(|&t| self.cols[t]);

            let mut last_col = None;
            for &t in bucket.iter() {
                let c = self.cols[t];
                if last_col == Some(c) {
                    if let Some(v) = values.last_mut() {
                        *v += self.values[t];
                    }
                } else {
                    col_indices.push(c);
                    values.push(self.values[t]);
                    last_col = Some(c);
                }
            }
            row_offsets.push(col_indices.len());
        }

        CsrMatrix::try_from_csr_data(self.n_rows, self.n_cols, row_offsets, col_indices, values)
            .map_err(|e| Error::Solver(format!("invalid CSR data: {e}")))
    }
}

/// Position of entry (row, col) in the CSR value array, if stored.
pub fn find_entry(matrix: &CsrMatrix, row: usize, col: usize) -> Option<usize> {
    let offsets = matrix.row_offsets();
    let start = offsets[row];
    let end = offsets[row + 1];
    matrix.col_indices()[start..end]
        .binary_search(&col)
        .ok()
        .map(|k| start + k)
}

/// Value at (row, col); zero when not stored.
pub fn get(matrix: &CsrMatrix, row: usize, col: usize) -> f64 {
    find_entry(matrix, row, col).map_or(0.0, |idx| matrix.values()[idx])
}

/// Diagonal entries.
pub fn diagonal(matrix: &CsrMatrix) -> Vec<f64> {
    (0..matrix.nrows().min(matrix.ncols()))
        .map(|i| get(matrix, i, i))
        .collect()
}

/// Sparse matrix-vector product y = A x.
pub fn mul_vec(matrix: &CsrMatrix, x: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(
        matrix.nrows(),
        matrix.row_iter().map(|row| {
            row.col_indices()
                .iter()
                .zip(row.values())
                .map(|(&c, &v)| v * x[c])
                .sum::<f64>()
        }),
    )
}

/// Exact (bitwise) symmetry check.
pub fn is_symmetric(matrix: &CsrMatrix) -> bool {
    if matrix.nrows() != matrix.ncols() {
        return false;
    }
    matrix.triplet_iter().all(|(r, c, &v)| {
        find_entry(matrix, c, r).map_or(v == 0.0, |idx| matrix.values()[idx] == v)
    })
}

/// Infinity norm, max_i Σ_j |a_ij|.
pub fn inf_norm(matrix: &CsrMatrix) -> f64 {
    matrix
        .row_iter()
        .map(|row| row.values().iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}
