//! Geometric aliases and small-strain tensors.
//!
//! Both tensors are stored as Voigt 6-vectors, normal components first:
//! `[xx, yy, zz, xy, yz, zx]`. Strain shears are engineering shears
//! (γ = 2ε), stress shears are plain τ, so that σ = D ε holds component-wise.

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};

/// Node position.
pub type Point3 = Vector3<f64>;

/// Displacement, force or direction.
pub type Vec3 = Vector3<f64>;

/// 6×6 isotropic elasticity matrix, σ = D ε.
pub type ConstitutiveMatrix = Matrix6<f64>;

/// Cauchy stress in Voigt form `[σxx, σyy, σzz, τxy, τyz, τzx]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressTensor(pub Vector6<f64>);

/// Small strain in Voigt form `[εxx, εyy, εzz, γxy, γyz, γzx]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrainTensor(pub Vector6<f64>);

impl StressTensor {
    pub fn new(components: [f64; 6]) -> Self {
        Self(Vector6::from_column_slice(&components))
    }

    pub fn zero() -> Self {
        Self(Vector6::zeros())
    }

    /// σ = D ε
    pub fn from_strain(d: &ConstitutiveMatrix, strain: &StrainTensor) -> Self {
        Self(d * strain.0)
    }

    /// Normal components (σxx, σyy, σzz).
    pub fn normal(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(0).into_owned()
    }

    /// Shear components (τxy, τyz, τzx).
    pub fn shear(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(3).into_owned()
    }

    /// Mean normal stress, (σxx + σyy + σzz) / 3.
    pub fn hydrostatic(&self) -> f64 {
        self.normal().sum() / 3.0
    }

    /// Equivalent stress from the second deviatoric invariant:
    /// σ_vm = √(½[(σxx−σyy)² + (σyy−σzz)² + (σzz−σxx)²] + 3(τxy² + τyz² + τzx²))
    pub fn von_mises(&self) -> f64 {
        let n = self.normal();
        let differences = (n.x - n.y).powi(2) + (n.y - n.z).powi(2) + (n.z - n.x).powi(2);
        (0.5 * differences + 3.0 * self.shear().norm_squared()).sqrt()
    }

    /// max(|σxx|, |σyy|, |σzz|)
    pub fn max_abs_normal(&self) -> f64 {
        self.normal().amax()
    }

    /// Symmetric 3×3 form.
    pub fn tensor(&self) -> Matrix3<f64> {
        let [xx, yy, zz, xy, yz, zx] = self.components();
        Matrix3::new(xx, xy, zx, xy, yy, yz, zx, yz, zz)
    }

    pub fn components(&self) -> [f64; 6] {
        let c = &self.0;
        [c[0], c[1], c[2], c[3], c[4], c[5]]
    }
}

impl StrainTensor {
    pub fn new(components: [f64; 6]) -> Self {
        Self(Vector6::from_column_slice(&components))
    }

    pub fn zero() -> Self {
        Self(Vector6::zeros())
    }

    /// Symmetric part of a displacement gradient ∂u_i/∂x_j.
    pub fn from_gradient(grad: &Matrix3<f64>) -> Self {
        Self::new([
            grad[(0, 0)],
            grad[(1, 1)],
            grad[(2, 2)],
            grad[(0, 1)] + grad[(1, 0)],
            grad[(1, 2)] + grad[(2, 1)],
            grad[(2, 0)] + grad[(0, 2)],
        ])
    }

    /// Trace, the relative volume change.
    pub fn volumetric(&self) -> f64 {
        self.0[0] + self.0[1] + self.0[2]
    }

    /// Symmetric 3×3 form with tensor shears γ/2.
    pub fn tensor(&self) -> Matrix3<f64> {
        let [xx, yy, zz, gxy, gyz, gzx] = self.components();
        let (xy, yz, zx) = (0.5 * gxy, 0.5 * gyz, 0.5 * gzx);
        Matrix3::new(xx, xy, zx, xy, yy, yz, zx, yz, zz)
    }

    pub fn components(&self) -> [f64; 6] {
        let c = &self.0;
        [c[0], c[1], c[2], c[3], c[4], c[5]]
    }
}
