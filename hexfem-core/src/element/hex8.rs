//! 8-node hexahedron (Hex8) element.
//!
//! The Hex8 is a trilinear brick with 3 displacement DOFs per node (24 total)
//! integrated with the 2×2×2 Gauss rule.
//!
//! # Shape Functions
//!
//! ```text
//! N_i = (1 + ξ_i*ξ)(1 + η_i*η)(1 + ζ_i*ζ) / 8
//! ```
//! where (ξ_i, η_i, ζ_i) are ±1 for node i.
//!
//! # Node Numbering
//!
//! ```text
//!        7-------6
//!       /|      /|
//!      / |     / |
//!     4-------5  |
//!     |  3----|--2
//!     | /     | /
//!     |/      |/
//!     0-------1
//!
//! Node 0: (-1, -1, -1)    Node 4: (-1, -1, +1)
//! Node 1: (+1, -1, -1)    Node 5: (+1, -1, +1)
//! Node 2: (+1, +1, -1)    Node 6: (+1, +1, +1)
//! Node 3: (-1, +1, -1)    Node 7: (-1, +1, +1)
//! ```
//!
//! An element whose Jacobian determinant is not strictly positive at every
//! integration point is inverted or degenerate and is rejected with
//! [`Error::InvalidMesh`].

use crate::element::gauss::{gauss_hex, GaussPoint};
use crate::element::{Element, ElementResponse};
use crate::error::{Error, Result};
use crate::types::{ConstitutiveMatrix, Point3, StrainTensor, StressTensor};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3, Vector6};

/// Natural coordinates of the 8 vertices.
const XI: [f64; 8] = [-1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0];
const ETA: [f64; 8] = [-1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0];
const ZETA: [f64; 8] = [-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0];

const N_NODES: usize = 8;
const N_DOFS: usize = 24;

/// Shape function derivatives with respect to (ξ, η, ζ), one array per direction.
pub type NaturalDerivatives = ([f64; 8], [f64; 8], [f64; 8]);

/// 8-node hexahedral element (trilinear brick).
#[derive(Debug, Clone, Copy, Default)]
pub struct Hex8;

impl Hex8 {
    pub fn new() -> Self {
        Self
    }

    /// Shape functions at a point in natural coordinates.
    pub fn shape_functions(xi: f64, eta: f64, zeta: f64) -> [f64; 8] {
        let mut n = [0.0; 8];
        for i in 0..N_NODES {
            n[i] = 0.125 * (1.0 + XI[i] * xi) * (1.0 + ETA[i] * eta) * (1.0 + ZETA[i] * zeta);
        }
        n
    }

    /// Shape function derivatives (∂N/∂ξ, ∂N/∂η, ∂N/∂ζ).
    pub fn shape_derivatives(xi: f64, eta: f64, zeta: f64) -> NaturalDerivatives {
        let mut dn_dxi = [0.0; 8];
        let mut dn_deta = [0.0; 8];
        let mut dn_dzeta = [0.0; 8];

        for i in 0..N_NODES {
            let sx = 1.0 + XI[i] * xi;
            let se = 1.0 + ETA[i] * eta;
            let sz = 1.0 + ZETA[i] * zeta;

            dn_dxi[i] = 0.125 * XI[i] * se * sz;
            dn_deta[i] = 0.125 * sx * ETA[i] * sz;
            dn_dzeta[i] = 0.125 * sx * se * ZETA[i];
        }

        (dn_dxi, dn_deta, dn_dzeta)
    }

    /// Jacobian J = (∂N/∂ξ) · X.
    ///
    /// ```text
    /// J = [∂x/∂ξ  ∂y/∂ξ  ∂z/∂ξ]
    ///     [∂x/∂η  ∂y/∂η  ∂z/∂η]
    ///     [∂x/∂ζ  ∂y/∂ζ  ∂z/∂ζ]
    /// ```
    pub fn jacobian(coords: &[Point3], derivatives: &NaturalDerivatives) -> Matrix3<f64> {
        let (dn_dxi, dn_deta, dn_dzeta) = derivatives;
        let mut j = Matrix3::zeros();

        for (i, p) in coords.iter().enumerate().take(N_NODES) {
            for c in 0..3 {
                j[(0, c)] += dn_dxi[i] * p[c];
                j[(1, c)] += dn_deta[i] * p[c];
                j[(2, c)] += dn_dzeta[i] * p[c];
            }
        }

        j
    }

    /// Jacobian determinants at the eight 2×2×2 integration points.
    ///
    /// Used by mesh validation; does not reject anything itself.
    pub fn jacobian_determinants(coords: &[Point3]) -> Result<Vec<f64>> {
        check_coords(coords)?;
        Ok(gauss_hex(2)
            .iter()
            .map(|gp| {
                let dn = Self::shape_derivatives(gp.xi(), gp.eta(), gp.zeta());
                Self::jacobian(coords, &dn).determinant()
            })
            .collect())
    }

    /// Strain-displacement matrix B (6×24) and det(J) at a point.
    ///
    /// Column block (3i, 3i+1, 3i+2) belongs to local node i; rows follow
    /// Voigt order [ε_xx, ε_yy, ε_zz, γ_xy, γ_yz, γ_zx].
    pub fn b_matrix(
        coords: &[Point3],
        xi: f64,
        eta: f64,
        zeta: f64,
    ) -> Result<(DMatrix<f64>, f64)> {
        check_coords(coords)?;
        let dn = Self::shape_derivatives(xi, eta, zeta);
        let j = Self::jacobian(coords, &dn);

        let det_j = j.determinant();
        if !(det_j > 0.0) {
            return Err(Error::InvalidMesh(format!(
                "non-positive Jacobian determinant {det_j:e} \
                 at (ξ, η, ζ) = ({xi:.4}, {eta:.4}, {zeta:.4})"
            )));
        }
        let j_inv = j.try_inverse().ok_or_else(|| {
            Error::InvalidMesh(format!("singular Jacobian at ({xi:.4}, {eta:.4}, {zeta:.4})"))
        })?;

        let (dn_dxi, dn_deta, dn_dzeta) = dn;
        let mut b = DMatrix::zeros(6, N_DOFS);

        for i in 0..N_NODES {
            // [∂N/∂x, ∂N/∂y, ∂N/∂z] = J⁻¹ [∂N/∂ξ, ∂N/∂η, ∂N/∂ζ]
            let g = j_inv * Vector3::new(dn_dxi[i], dn_deta[i], dn_dzeta[i]);
            let col = 3 * i;

            b[(0, col)] = g[0];
            b[(1, col + 1)] = g[1];
            b[(2, col + 2)] = g[2];

            // γ_xy = ∂u/∂y + ∂v/∂x
            b[(3, col)] = g[1];
            b[(3, col + 1)] = g[0];

            // γ_yz = ∂v/∂z + ∂w/∂y
            b[(4, col + 1)] = g[2];
            b[(4, col + 2)] = g[1];

            // γ_zx = ∂w/∂x + ∂u/∂z
            b[(5, col)] = g[2];
            b[(5, col + 2)] = g[0];
        }

        Ok((b, det_j))
    }

    /// Strain and stress at each 2×2×2 integration point.
    pub fn stress_at_gauss_points(
        &self,
        coords: &[Point3],
        displacements: &[f64],
        d: &ConstitutiveMatrix,
    ) -> Result<Vec<(StrainTensor, StressTensor)>> {
        if displacements.len() != N_DOFS {
            return Err(Error::Solver(format!(
                "Hex8 requires {} displacement DOFs, got {}",
                N_DOFS,
                displacements.len()
            )));
        }
        let u = DVector::from_column_slice(displacements);

        gauss_hex(2)
            .iter()
            .map(|gp| {
                let strain = StrainTensor(Self::strain_at(coords, &u, gp)?);
                Ok((strain, StressTensor::from_strain(d, &strain)))
            })
            .collect()
    }

    fn strain_at(coords: &[Point3], u: &DVector<f64>, gp: &GaussPoint) -> Result<Vector6<f64>> {
        let (b, _) = Self::b_matrix(coords, gp.xi(), gp.eta(), gp.zeta())?;
        let eps = b * u;
        Ok(Vector6::from_iterator(eps.iter().copied()))
    }
}

fn check_coords(coords: &[Point3]) -> Result<()> {
    if coords.len() != N_NODES {
        return Err(Error::InvalidMesh(format!(
            "Hex8 requires exactly {} nodal coordinates, got {}",
            N_NODES,
            coords.len()
        )));
    }
    Ok(())
}

impl Element for Hex8 {
    fn n_nodes(&self) -> usize {
        N_NODES
    }

    fn stiffness(&self, coords: &[Point3], d: &ConstitutiveMatrix) -> Result<DMatrix<f64>> {
        let mut k = DMatrix::zeros(N_DOFS, N_DOFS);

        for gp in gauss_hex(2) {
            let (b, det_j) = Self::b_matrix(coords, gp.xi(), gp.eta(), gp.zeta())?;

            // K += Bᵀ D B |J| w
            let db = d * &b;
            k += b.transpose() * db * (det_j * gp.weight);
        }

        // Bᵀ D B is symmetric in exact arithmetic; make it bitwise so.
        let kt = k.transpose();
        Ok((k + kt) * 0.5)
    }

    fn recover(
        &self,
        coords: &[Point3],
        displacements: &[f64],
        d: &ConstitutiveMatrix,
    ) -> Result<ElementResponse> {
        let points = self.stress_at_gauss_points(coords, displacements, d)?;
        let n = points.len() as f64;

        let mut strain = Vector6::zeros();
        let mut stress = Vector6::zeros();
        for (eps, sigma) in &points {
            strain += eps.0;
            stress += sigma.0;
        }

        Ok(ElementResponse {
            strain: StrainTensor(strain / n),
            stress: StressTensor(stress / n),
        })
    }

    fn volume(&self, coords: &[Point3]) -> Result<f64> {
        let dets = Self::jacobian_determinants(coords)?;
        // unit weights for the 2-point rule
        Ok(dets.iter().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use approx::assert_relative_eq;

    fn unit_cube() -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ]
    }

    /// A skewed, non-parallel hexahedron that is still valid.
    fn distorted_hex() -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.1, 0.1, -0.1),
            Point3::new(2.3, 1.2, 0.0),
            Point3::new(-0.2, 0.9, 0.1),
            Point3::new(0.1, -0.1, 1.0),
            Point3::new(1.9, 0.0, 1.2),
            Point3::new(2.0, 1.1, 0.9),
            Point3::new(0.0, 1.0, 1.1),
        ]
    }

    fn inf_norm(k: &DMatrix<f64>) -> f64 {
        k.row_iter()
            .map(|r| r.iter().map(|v| v.abs()).sum::<f64>())
            .fold(0.0, f64::max)
    }

    fn nodal_field(coords: &[Point3], f: impl Fn(&Point3) -> Vector3<f64>) -> DVector<f64> {
        let mut u = DVector::zeros(24);
        for (i, p) in coords.iter().enumerate() {
            let v = f(p);
            for c in 0..3 {
                u[3 * i + c] = v[c];
            }
        }
        u
    }

    #[test]
    fn test_shape_functions_partition_of_unity() {
        let points = [(0.0, 0.0, 0.0), (1.0, 1.0, 1.0), (-1.0, 0.5, 0.0), (0.3, -0.7, 0.2)];
        for (xi, eta, zeta) in points {
            let sum: f64 = Hex8::shape_functions(xi, eta, zeta).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_shape_functions_kronecker_at_vertices() {
        for i in 0..8 {
            let n = Hex8::shape_functions(XI[i], ETA[i], ZETA[i]);
            for j in 0..8 {
                assert_relative_eq!(n[j], if i == j { 1.0 } else { 0.0 }, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_derivatives_sum_to_zero() {
        let (a, b, c) = Hex8::shape_derivatives(0.2, -0.4, 0.9);
        assert_relative_eq!(a.iter().sum::<f64>(), 0.0, epsilon = 1e-15);
        assert_relative_eq!(b.iter().sum::<f64>(), 0.0, epsilon = 1e-15);
        assert_relative_eq!(c.iter().sum::<f64>(), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_unit_cube_jacobian() {
        let dn = Hex8::shape_derivatives(0.1, 0.2, 0.3);
        let j = Hex8::jacobian(&unit_cube(), &dn);
        assert_relative_eq!(j, Matrix3::identity() * 0.5, epsilon = 1e-15);
    }

    #[test]
    fn test_volume() {
        let hex = Hex8::new();
        assert_relative_eq!(hex.volume(&unit_cube()).unwrap(), 1.0, epsilon = 1e-12);

        let stretched: Vec<Point3> = unit_cube()
            .iter()
            .map(|p| Point3::new(2.0 * p.x, p.y, 0.5 * p.z))
            .collect();
        assert_relative_eq!(hex.volume(&stretched).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverted_element_rejected() {
        // swapping the two faces mirrors the element
        let mut coords = unit_cube();
        coords.rotate_left(4);
        let d = Material::steel().constitutive_matrix();

        let err = Hex8::new().stiffness(&coords, &d).unwrap_err();
        assert!(matches!(err, Error::InvalidMesh(_)));
    }

    #[test]
    fn test_collapsed_element_rejected() {
        let mut coords = unit_cube();
        for p in coords.iter_mut().skip(4) {
            p.z = 0.0;
        }
        assert!(Hex8::b_matrix(&coords, 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_wrong_node_count_rejected() {
        let coords = &unit_cube()[..7];
        assert!(matches!(
            Hex8::jacobian_determinants(coords),
            Err(Error::InvalidMesh(_))
        ));
    }

    #[test]
    fn test_stiffness_exactly_symmetric() {
        let d = Material::steel().constitutive_matrix();
        for coords in [unit_cube(), distorted_hex()] {
            let k = Hex8::new().stiffness(&coords, &d).unwrap();
            assert_eq!(k.nrows(), 24);
            assert_eq!(k, k.transpose());
        }
    }

    #[test]
    fn test_stiffness_positive_diagonal() {
        let d = Material::steel().constitutive_matrix();
        let k = Hex8::new().stiffness(&distorted_hex(), &d).unwrap();
        for i in 0..24 {
            assert!(k[(i, i)] > 0.0, "K[{i},{i}] = {} should be positive", k[(i, i)]);
        }
    }

    #[test]
    fn test_rigid_translation_in_null_space() {
        let d = Material::new(2.0e11, 0.3).unwrap().constitutive_matrix();
        for coords in [unit_cube(), distorted_hex()] {
            let k = Hex8::new().stiffness(&coords, &d).unwrap();
            let scale = inf_norm(&k);
            for t in [
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, -2.0, 0.0),
                Vector3::new(0.3, 0.4, -5.0),
            ] {
                let u = nodal_field(&coords, |_| t);
                let f = &k * u;
                assert!(f.amax() <= 1e-8 * scale, "‖Kᵉu‖ = {:e}", f.amax());
            }
        }
    }

    #[test]
    fn test_infinitesimal_rotation_in_null_space() {
        let d = Material::new(1.0, 0.25).unwrap().constitutive_matrix();
        let coords = distorted_hex();
        let k = Hex8::new().stiffness(&coords, &d).unwrap();
        let omega = Vector3::new(0.2, -0.1, 0.3);
        let u = nodal_field(&coords, |p| omega.cross(p));
        assert!((&k * u).amax() <= 1e-8 * inf_norm(&k));
    }

    #[test]
    fn test_strain_energy_non_negative() {
        let d = Material::steel().constitutive_matrix();
        let k = Hex8::new().stiffness(&distorted_hex(), &d).unwrap();

        let mut seed = 12345u64;
        for _ in 0..20 {
            let u = DVector::from_fn(24, |_, _| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((seed >> 11) as f64 / (1u64 << 53) as f64) - 0.5
            });
            let energy = u.dot(&(&k * &u));
            assert!(energy >= -1e-9 * inf_norm(&k) * u.norm_squared());
        }
    }

    #[test]
    fn test_linear_field_recovers_symmetric_gradient() {
        // u = A x + b on a distorted element gives ε = sym(A) at every point
        let mat = Material::new(1e6, 0.25).unwrap();
        let d = mat.constitutive_matrix();
        let a = Matrix3::new(1e-3, 2e-4, -1e-4, 5e-4, -2e-3, 3e-4, 0.0, 1e-4, 4e-4);
        let offset = Vector3::new(0.01, -0.02, 0.005);
        let coords = distorted_hex();
        let u = nodal_field(&coords, |p| a * p + offset);

        let expected = StrainTensor::new([
            a[(0, 0)],
            a[(1, 1)],
            a[(2, 2)],
            a[(0, 1)] + a[(1, 0)],
            a[(1, 2)] + a[(2, 1)],
            a[(2, 0)] + a[(0, 2)],
        ]);

        let hex = Hex8::new();
        for (strain, stress) in hex.stress_at_gauss_points(&coords, u.as_slice(), &d).unwrap() {
            assert_relative_eq!(strain.0, expected.0, epsilon = 1e-12);
            assert_relative_eq!(stress.0, d * expected.0, epsilon = 1e-6);
        }

        let response = hex.recover(&coords, u.as_slice(), &d).unwrap();
        assert_relative_eq!(response.strain.0, expected.0, epsilon = 1e-12);
    }

    #[test]
    fn test_recover_averages_gauss_points() {
        // bending mode: ε_xx varies linearly through the depth and averages out
        let d = Material::steel().constitutive_matrix();
        let coords = unit_cube();
        let u = nodal_field(&coords, |p| Vector3::new(1e-4 * p.x * (p.z - 0.5), 0.0, 0.0));
        let hex = Hex8::new();

        let points = hex.stress_at_gauss_points(&coords, u.as_slice(), &d).unwrap();
        let mean_xx: f64 = points.iter().map(|(_, s)| s.0[0]).sum::<f64>() / 8.0;
        let response = hex.recover(&coords, u.as_slice(), &d).unwrap();

        assert_relative_eq!(response.stress.0[0], mean_xx, epsilon = 1e-9);
        assert_relative_eq!(response.stress.0[0], 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_recover_rejects_wrong_dof_count() {
        let d = Material::steel().constitutive_matrix();
        assert!(Hex8::new().recover(&unit_cube(), &[0.0; 12], &d).is_err());
    }
}
