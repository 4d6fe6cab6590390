//! Element trait and implementations.
//!
//! The [`Element`] trait is the seam between the assembler and an element
//! kernel: given nodal coordinates and a constitutive matrix it yields a
//! dense stiffness matrix, and given nodal displacements it recovers strain
//! and stress.
//!
//! # Submodules
//!
//! - [`gauss`] - Gauss quadrature rules for numerical integration
//! - [`hex8`] - Trilinear 8-node brick

use crate::error::Result;
use crate::types::{ConstitutiveMatrix, Point3, StrainTensor, StressTensor};
use nalgebra::DMatrix;

pub mod gauss;
pub mod hex8;

pub use gauss::{gauss_1d, gauss_hex, GaussPoint};
pub use hex8::Hex8;

/// Element-level strain and stress, averaged over the integration points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementResponse {
    pub strain: StrainTensor,
    pub stress: StressTensor,
}

/// Finite element interface.
///
/// Elements must be thread-safe (Send + Sync) so stiffness and recovery can
/// run on the rayon pool.
pub trait Element: Send + Sync {
    /// Number of nodes in this element.
    fn n_nodes(&self) -> usize;

    /// Degrees of freedom per node (3 for solid elements).
    fn dofs_per_node(&self) -> usize {
        3
    }

    /// Total degrees of freedom for this element.
    fn n_dofs(&self) -> usize {
        self.n_nodes() * self.dofs_per_node()
    }

    /// Element stiffness matrix, shape (n_dofs, n_dofs).
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidMesh`] if the element is inverted or degenerate.
    fn stiffness(&self, coords: &[Point3], d: &ConstitutiveMatrix) -> Result<DMatrix<f64>>;

    /// Strain and stress recovered from the element's nodal displacements
    /// (length n_dofs, node-major).
    fn recover(
        &self,
        coords: &[Point3],
        displacements: &[f64],
        d: &ConstitutiveMatrix,
    ) -> Result<ElementResponse>;

    /// Element volume.
    fn volume(&self, coords: &[Point3]) -> Result<f64>;
}
