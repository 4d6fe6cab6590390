//! Error types for hexfem operations.

use thiserror::Error;

/// Result type alias using the hexfem [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or solving an analysis.
///
/// Every error is raised by the operation that detected it; nothing is
/// recovered locally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Elastic constants outside the admissible range.
    #[error("invalid material: {0}")]
    InvalidMaterial(String),

    /// Malformed connectivity, too few nodes/elements, or an inverted element.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// Load direction, magnitude or target set rejected.
    #[error("invalid load: {0}")]
    InvalidLoadSpec(String),

    /// Constraint referencing a node or component that does not exist.
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    /// The constrained stiffness matrix is singular or numerically so.
    #[error("insufficient constraints: {0}")]
    InsufficientConstraints(String),

    /// NaN or infinity in the stiffness matrix, load vector or solution.
    #[error("numeric fault: {0}")]
    NumericFault(String),

    /// Shape mismatch between the system matrix and right-hand side.
    #[error("solver error: {0}")]
    Solver(String),
}
