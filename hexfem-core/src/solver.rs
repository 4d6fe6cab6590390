//! Linear system solvers.
//!
//! Solves the constrained system K u = f.
//!
//! # Solver Backends
//!
//! - [`FaerCholeskySolver`]: sparse Cholesky (LLᵀ) from the faer library. The
//!   production path; the constrained stiffness matrix is symmetric positive
//!   definite.
//! - [`DenseLuSolver`]: nalgebra dense LU, for small problems and for
//!   cross-checking the sparse path.
//!
//! # Singularity detection
//!
//! Both solvers estimate the reciprocal 1-norm condition number of the
//! diagonally scaled matrix S K S, with S = diag(K_ii^(-1/2)), using Hager's
//! estimator on top of the existing factorisation. Systems below the
//! configured threshold are rejected with [`Error::InsufficientConstraints`].

use crate::error::{Error, Result};
use crate::sparse::{self, CsrMatrix};
use faer::linalg::cholesky::llt::factor::LltError;
use faer::prelude::*;
use faer::sparse::linalg::solvers::{Llt, SymbolicLlt};
use faer::sparse::linalg::LltError as SparseLltError;
use faer::sparse::{SparseColMat, SymbolicSparseColMat};
use nalgebra::{DMatrix, DVector};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default rejection threshold for the reciprocal condition estimate.
pub const DEFAULT_RCOND_THRESHOLD: f64 = 1e-12;

/// Linear solver interface.
///
/// The matrix is taken by value so a solver can release it as soon as the
/// factorisation exists.
pub trait Solver: Send + Sync {
    /// Solve K u = f.
    ///
    /// # Errors
    ///
    /// - [`Error::Solver`] on shape mismatch
    /// - [`Error::NumericFault`] on NaN or infinity in K, f or u
    /// - [`Error::InsufficientConstraints`] if K is singular or nearly so
    fn solve(&self, matrix: CsrMatrix, rhs: &[f64]) -> Result<Solution>;

    /// Solver name for diagnostics.
    fn name(&self) -> &str;
}

/// Solver selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverType {
    /// Sparse Cholesky.
    Direct,
    /// Dense LU; small problems only.
    DenseLu,
    /// Currently always the sparse Cholesky.
    #[default]
    Auto,
}

/// Solver configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub solver_type: SolverType,
    /// Systems whose reciprocal condition estimate falls below this are
    /// rejected as insufficiently constrained.
    pub rcond_threshold: f64,
    /// Maximum iterations of the condition estimator (two solves each).
    pub condition_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            solver_type: SolverType::Auto,
            rcond_threshold: DEFAULT_RCOND_THRESHOLD,
            condition_iterations: 5,
        }
    }
}

/// Solution statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveStats {
    /// Solver name used.
    pub solver: String,
    pub n_dofs: usize,
    /// Reciprocal condition estimate of the scaled system.
    pub rcond: f64,
    /// Wall-clock time in seconds.
    pub time_seconds: f64,
}

/// Displacement vector and solve statistics.
#[derive(Debug, Clone)]
pub struct Solution {
    pub displacements: DVector<f64>,
    pub stats: SolveStats,
}

/// Select solver based on configuration.
pub fn select_solver(config: &SolverConfig) -> Box<dyn Solver> {
    match config.solver_type {
        SolverType::Direct | SolverType::Auto => Box::new(FaerCholeskySolver::with_config(config)),
        SolverType::DenseLu => Box::new(DenseLuSolver::with_config(config)),
    }
}

/// Shape and finiteness checks shared by all solvers.
fn validate(matrix: &CsrMatrix, rhs: &[f64]) -> Result<()> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(Error::Solver(format!(
            "matrix must be square, got {}x{}",
            n,
            matrix.ncols()
        )));
    }
    if n != rhs.len() {
        return Err(Error::Solver(format!(
            "RHS size mismatch: matrix has {} rows, RHS has {} entries",
            n,
            rhs.len()
        )));
    }
    if let Some((r, c, v)) = matrix.triplet_iter().find(|(_, _, v)| !v.is_finite()) {
        return Err(Error::NumericFault(format!("stiffness entry ({r}, {c}) is {v}")));
    }
    if let Some(i) = rhs.iter().position(|v| !v.is_finite()) {
        return Err(Error::NumericFault(format!("force entry {i} is {}", rhs[i])));
    }
    Ok(())
}

fn check_solution(u: &DVector<f64>) -> Result<()> {
    match u.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(Error::NumericFault(format!("displacement entry {i} is {}", u[i]))),
        None => Ok(()),
    }
}

/// Diagonal scaling S = diag(K_ii^(-1/2)) and ‖S K S‖₁.
struct Scaling {
    /// √K_ii, i.e. S⁻¹.
    sqrt_diag: Vec<f64>,
    norm1: f64,
}

impl Scaling {
    fn new(matrix: &CsrMatrix) -> Result<Self> {
        let diag = sparse::diagonal(matrix);
        if let Some(i) = diag.iter().position(|&d| !(d > 0.0)) {
            return Err(Error::InsufficientConstraints(format!(
                "non-positive diagonal {} at DOF {i}",
                diag[i]
            )));
        }
        let sqrt_diag: Vec<f64> = diag.iter().map(|d| d.sqrt()).collect();

        // S K S is symmetric, so the 1-norm equals the row-sum norm.
        let norm1 = matrix
            .row_iter()
            .enumerate()
            .map(|(r, row)| {
                row.col_indices()
                    .iter()
                    .zip(row.values())
                    .map(|(&c, v)| v.abs() / (sqrt_diag[r] * sqrt_diag[c]))
                    .sum::<f64>()
            })
            .fold(0.0, f64::max);

        Ok(Self { sqrt_diag, norm1 })
    }
}

/// Hager's 1-norm estimate of ‖A⁻¹‖₁ for symmetric A.
///
/// Returns the reciprocal condition number 1 / (‖A‖₁ ‖A⁻¹‖₁).
///
/// `solve_scaled` applies A⁻¹ = S⁻¹ K⁻¹ S⁻¹ in place.
fn estimate_rcond(
    scaling: &Scaling,
    max_iterations: usize,
    mut solve_scaled: impl FnMut(&mut [f64]) -> Result<()>,
) -> Result<f64> {
    let n = scaling.sqrt_diag.len();
    if n == 0 {
        return Ok(1.0);
    }

    let mut x = vec![1.0 / n as f64; n];
    let mut inv_norm = 0.0;

    for iteration in 0..max_iterations.max(1) {
        let mut y = x.clone();
        solve_scaled(&mut y)?;
        inv_norm = y.iter().map(|v| v.abs()).sum::<f64>();

        let mut z: Vec<f64> = y.iter().map(|&v| if v >= 0.0 { 1.0 } else { -1.0 }).collect();
        solve_scaled(&mut z)?;

        let (j, z_max) = z
            .iter()
            .enumerate()
            .map(|(i, v)| (i, v.abs()))
            .fold((0, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
        let ztx: f64 = z.iter().zip(&x).map(|(a, b)| a * b).sum();

        if iteration > 0 && z_max <= ztx {
            break;
        }
        x.iter_mut().for_each(|v| *v = 0.0);
        x[j] = 1.0;
    }

    Ok(1.0 / (scaling.norm1 * inv_norm))
}

/// Reject near-singular systems; warn when close to the threshold.
fn check_condition(rcond: f64, threshold: f64) -> Result<()> {
    if !rcond.is_finite() || rcond < threshold {
        return Err(Error::InsufficientConstraints(format!(
            "reciprocal condition estimate {rcond:e} below {threshold:e}"
        )));
    }
    if rcond < 100.0 * threshold {
        warn!(rcond, threshold, "stiffness matrix is close to singular");
    }
    Ok(())
}

/// Convert nalgebra-sparse CSR matrix to faer SparseColMat (CSC format).
///
/// Performs a genuine transpose-copy, so the result does not rely on K being
/// symmetric.
fn csr_to_faer_csc(csr: &CsrMatrix) -> SparseColMat<usize, f64> {
    let nrows = csr.nrows();
    let ncols = csr.ncols();

    let row_offsets = csr.row_offsets();
    let col_indices = csr.col_indices();
    let values = csr.values();

    let mut col_offsets = vec![0usize; ncols + 1];
    for &col in col_indices {
        col_offsets[col + 1] += 1;
    }
    for i in 0..ncols {
        col_offsets[i + 1] += col_offsets[i];
    }

    let nnz = values.len();
    let mut csc_row_indices = vec![0usize; nnz];
    let mut csc_values = vec![0.0f64; nnz];
    let mut col_positions = col_offsets[..ncols].to_vec();

    // rows visited in order, so row indices within each column are sorted
    for row in 0..nrows {
        for idx in row_offsets[row]..row_offsets[row + 1] {
            let col = col_indices[idx];
            let pos = col_positions[col];
            csc_row_indices[pos] = row;
            csc_values[pos] = values[idx];
            col_positions[col] += 1;
        }
    }

    // SAFETY: offsets are non-decreasing, end at nnz, and row indices are
    // in-bounds and strictly increasing within each column.
    unsafe {
        SparseColMat::new(
            SymbolicSparseColMat::new_unchecked(nrows, ncols, col_offsets, None, csc_row_indices),
            csc_values,
        )
    }
}

/// Sparse Cholesky solver using the faer library.
#[derive(Debug, Clone)]
pub struct FaerCholeskySolver {
    rcond_threshold: f64,
    condition_iterations: usize,
}

impl FaerCholeskySolver {
    pub fn new() -> Self {
        Self::with_config(&SolverConfig::default())
    }

    pub fn with_config(config: &SolverConfig) -> Self {
        Self {
            rcond_threshold: config.rcond_threshold,
            condition_iterations: config.condition_iterations,
        }
    }
}

impl Default for FaerCholeskySolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for FaerCholeskySolver {
    fn solve(&self, matrix: CsrMatrix, rhs: &[f64]) -> Result<Solution> {
        let start = Instant::now();
        validate(&matrix, rhs)?;
        let n = matrix.nrows();
        if n == 0 {
            return Ok(empty_solution(self.name()));
        }

        let scaling = Scaling::new(&matrix)?;
        debug!(n_dofs = n, nnz = matrix.nnz(), "sparse Cholesky factorisation");
        let csc = csr_to_faer_csc(&matrix);
        drop(matrix);

        let llt = {
            let csc_ref = csc.as_ref();
            let symbolic = SymbolicLlt::try_new(csc_ref.symbolic(), faer::Side::Lower)
                .map_err(|e| Error::Solver(format!("symbolic Cholesky analysis failed: {e:?}")))?;

            Llt::try_new_with_symbolic(symbolic, csc_ref, faer::Side::Lower).map_err(|e| match e {
                SparseLltError::Generic(err) => {
                    Error::Solver(format!("sparse Cholesky error: {err:?}"))
                }
                SparseLltError::Numeric(LltError::NonPositivePivot { index }) => {
                    Error::InsufficientConstraints(format!(
                        "stiffness matrix is not positive definite at pivot {index}"
                    ))
                }
            })?
        };
        drop(csc);

        let solve_in_place = |v: &mut [f64]| {
            let mut x = faer::Mat::from_fn(v.len(), 1, |i, _| v[i]);
            llt.solve_in_place(x.as_mut());
            for (i, vi) in v.iter_mut().enumerate() {
                *vi = x[(i, 0)];
            }
        };

        let rcond = estimate_rcond(&scaling, self.condition_iterations, |v| {
            let s = &scaling.sqrt_diag;
            v.iter_mut().zip(s).for_each(|(vi, si)| *vi *= si);
            solve_in_place(v);
            v.iter_mut().zip(s).for_each(|(vi, si)| *vi *= si);
            Ok(())
        })?;
        info!(rcond, "condition estimate");
        check_condition(rcond, self.rcond_threshold)?;

        let mut u = rhs.to_vec();
        solve_in_place(&mut u);
        let displacements = DVector::from_vec(u);
        check_solution(&displacements)?;

        Ok(Solution {
            displacements,
            stats: SolveStats {
                solver: self.name().to_string(),
                n_dofs: n,
                rcond,
                time_seconds: start.elapsed().as_secs_f64(),
            },
        })
    }

    fn name(&self) -> &str {
        "faer Sparse Cholesky (LLᵀ)"
    }
}

/// Dense LU solver (nalgebra); O(n²) memory.
#[derive(Debug, Clone)]
pub struct DenseLuSolver {
    rcond_threshold: f64,
    condition_iterations: usize,
}

impl DenseLuSolver {
    pub fn new() -> Self {
        Self::with_config(&SolverConfig::default())
    }

    pub fn with_config(config: &SolverConfig) -> Self {
        Self {
            rcond_threshold: config.rcond_threshold,
            condition_iterations: config.condition_iterations,
        }
    }
}

impl Default for DenseLuSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for DenseLuSolver {
    fn solve(&self, matrix: CsrMatrix, rhs: &[f64]) -> Result<Solution> {
        let start = Instant::now();
        validate(&matrix, rhs)?;
        let n = matrix.nrows();
        if n == 0 {
            return Ok(empty_solution(self.name()));
        }

        let scaling = Scaling::new(&matrix)?;
        let lu = DMatrix::from(&matrix).lu();
        drop(matrix);

        let solve_in_place = |v: &mut [f64]| -> Result<()> {
            let mut b = DVector::from_column_slice(v);
            if !lu.solve_mut(&mut b) {
                return Err(Error::InsufficientConstraints(
                    "stiffness matrix is singular (zero LU pivot)".into(),
                ));
            }
            v.copy_from_slice(b.as_slice());
            Ok(())
        };

        let rcond = estimate_rcond(&scaling, self.condition_iterations, |v| {
            let s = &scaling.sqrt_diag;
            v.iter_mut().zip(s).for_each(|(vi, si)| *vi *= si);
            solve_in_place(v)?;
            v.iter_mut().zip(s).for_each(|(vi, si)| *vi *= si);
            Ok(())
        })?;
        info!(rcond, "condition estimate");
        check_condition(rcond, self.rcond_threshold)?;

        let mut u = rhs.to_vec();
        solve_in_place(&mut u)?;
        let displacements = DVector::from_vec(u);
        check_solution(&displacements)?;

        Ok(Solution {
            displacements,
            stats: SolveStats {
                solver: self.name().to_string(),
                n_dofs: n,
                rcond,
                time_seconds: start.elapsed().as_secs_f64(),
            },
        })
    }

    fn name(&self) -> &str {
        "Dense LU"
    }
}

fn empty_solution(name: &str) -> Solution {
    Solution {
        displacements: DVector::zeros(0),
        stats: SolveStats {
            solver: name.to_string(),
            n_dofs: 0,
            rcond: 1.0,
            time_seconds: 0.0,
        },
    }
}
