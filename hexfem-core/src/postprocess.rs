//! Stress recovery and derived fields.
//!
//! After solving K u = f, each element's strain and stress are recovered as
//! the mean over its 2×2×2 integration points:
//!
//! 1. Gather the element's 24 nodal displacements from u
//! 2. ε = B uᵉ at every Gauss point, σ = D ε
//! 3. Average both over the eight points
//!
//! Scalar fields (von Mises, maximum absolute normal stress, displacement
//! magnitude) are pure functions of these results.

use crate::element::{Element, ElementResponse, Hex8};
use crate::error::{Error, Result};
use crate::material::Material;
use crate::mesh::{Mesh, DOFS_PER_NODE};
use crate::types::{StrainTensor, StressTensor};
use nalgebra::DVector;
use rayon::prelude::*;

/// Per-element recovery results, indexed by element.
#[derive(Debug, Clone, PartialEq)]
pub struct StressField {
    elements: Vec<ElementResponse>,
}

impl StressField {
    pub fn new(elements: Vec<ElementResponse>) -> Self {
        Self { elements }
    }

    /// Result for a specific element.
    pub fn element(&self, elem_id: usize) -> Option<&ElementResponse> {
        self.elements.get(elem_id)
    }

    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn responses(&self) -> &[ElementResponse] {
        &self.elements
    }

    pub fn stresses(&self) -> Vec<StressTensor> {
        self.elements.iter().map(|r| r.stress).collect()
    }

    pub fn strains(&self) -> Vec<StrainTensor> {
        self.elements.iter().map(|r| r.strain).collect()
    }

    /// Von Mises stress per element.
    pub fn von_mises(&self) -> Vec<f64> {
        self.elements.iter().map(|r| r.stress.von_mises()).collect()
    }

    /// max(|σ_xx|, |σ_yy|, |σ_zz|) per element.
    pub fn max_abs_normal(&self) -> Vec<f64> {
        self.elements.iter().map(|r| r.stress.max_abs_normal()).collect()
    }

    /// Largest element von Mises stress; zero for an empty field.
    pub fn max_von_mises(&self) -> f64 {
        self.von_mises().into_iter().fold(0.0, f64::max)
    }
}

/// Recover element strain and stress from the global displacement vector.
///
/// Elements are processed in parallel; the result keeps mesh order.
///
/// # Errors
///
/// [`Error::Solver`] if `displacements` does not have one entry per DOF.
pub fn recover(
    mesh: &Mesh,
    material: &Material,
    displacements: &DVector<f64>,
) -> Result<StressField> {
    if displacements.len() != mesh.n_dofs() {
        return Err(Error::Solver(format!(
            "displacement vector has {} entries, mesh has {} DOFs",
            displacements.len(),
            mesh.n_dofs()
        )));
    }
    let d = material.constitutive_matrix();
    let hex = Hex8::new();

    let elements = mesh
        .elements()
        .par_iter()
        .map(|conn| {
            let coords = mesh.coords_of(conn);
            let ue: Vec<f64> = mesh
                .element_dofs(conn)
                .iter()
                .map(|&dof| displacements[dof])
                .collect();
            hex.recover(&coords, &ue, &d)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(StressField { elements })
}

/// Euclidean norm of each node's displacement.
pub fn displacement_magnitudes(displacements: &DVector<f64>) -> Vec<f64> {
    displacements
        .as_slice()
        .chunks_exact(DOFS_PER_NODE)
        .map(|u| (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt())
        .collect()
}

/// Node with the largest displacement magnitude and that magnitude.
///
/// Ties resolve to the lowest node index.
pub fn max_displacement(displacements: &DVector<f64>) -> Option<(usize, f64)> {
    displacement_magnitudes(displacements)
        .into_iter()
        .enumerate()
        .fold(None, |best, (i, m)| match best {
            Some((_, b)) if b >= m => best,
            _ => Some((i, m)),
        })
}

/// Average a per-element scalar over the elements incident to each node.
///
/// Nodes without incident elements receive 0.
///
/// # Errors
///
/// [`Error::Solver`] if `element_values` does not have one entry per element.
pub fn nodal_average(mesh: &Mesh, element_values: &[f64]) -> Result<Vec<f64>> {
    if element_values.len() != mesh.n_elements() {
        return Err(Error::Solver(format!(
            "field has {} values, mesh has {} elements",
            element_values.len(),
            mesh.n_elements()
        )));
    }

    let mut sums = vec![0.0; mesh.n_nodes()];
    for (conn, &value) in mesh.elements().iter().zip(element_values) {
        for &n in conn {
            sums[n] += value;
        }
    }
    Ok(sums
        .into_iter()
        .zip(mesh.incident_counts())
        .map(|(s, count)| if count == 0 { 0.0 } else { s / count as f64 })
        .collect())
}

/// Factor of safety σ_y / max σ_vm.
///
/// Infinity when the maximum von Mises stress is zero.
///
/// # Errors
///
/// [`Error::InvalidMaterial`] if the yield stress is not positive and finite.
pub fn factor_of_safety(yield_stress: f64, von_mises: &[f64]) -> Result<f64> {
    if !yield_stress.is_finite() || yield_stress <= 0.0 {
        return Err(Error::InvalidMaterial(format!(
            "yield stress must be positive and finite, got {yield_stress}"
        )));
    }
    let max = von_mises.iter().copied().fold(0.0, f64::max);
    Ok(if max > 0.0 { yield_stress / max } else { f64::INFINITY })
}
