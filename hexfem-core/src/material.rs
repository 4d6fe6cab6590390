//! Material property definitions.
//!
//! A single homogeneous, isotropic linear elastic material per analysis.

use crate::error::{Error, Result};
use crate::types::ConstitutiveMatrix;
use nalgebra::Matrix6;

/// Isotropic linear elastic material.
///
/// Immutable once constructed; the Lamé constants are derived at
/// construction and cached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    youngs_modulus: f64,
    poissons_ratio: f64,
    lambda: f64,
    mu: f64,
}

impl Material {
    /// Create a new isotropic linear elastic material.
    ///
    /// # Arguments
    ///
    /// * `youngs_modulus` - Young's modulus E (Pa), E > 0
    /// * `poissons_ratio` - Poisson's ratio ν (dimensionless, -1 < ν < 0.5)
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMaterial`] if either constant is non-finite or
    /// outside its admissible range.
    pub fn new(youngs_modulus: f64, poissons_ratio: f64) -> Result<Self> {
        if !youngs_modulus.is_finite() || youngs_modulus <= 0.0 {
            return Err(Error::InvalidMaterial(format!(
                "Young's modulus must be positive and finite, got {youngs_modulus}"
            )));
        }
        if !poissons_ratio.is_finite() || poissons_ratio <= -1.0 || poissons_ratio >= 0.5 {
            return Err(Error::InvalidMaterial(format!(
                "Poisson's ratio must be in range (-1, 0.5), got {poissons_ratio}"
            )));
        }

        let e = youngs_modulus;
        let nu = poissons_ratio;
        Ok(Self {
            youngs_modulus,
            poissons_ratio,
            lambda: e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu)),
            mu: e / (2.0 * (1.0 + nu)),
        })
    }

    /// Young's modulus E (Pa).
    pub fn youngs_modulus(&self) -> f64 {
        self.youngs_modulus
    }

    /// Poisson's ratio ν.
    pub fn poissons_ratio(&self) -> f64 {
        self.poissons_ratio
    }

    /// Lamé's first parameter λ = Eν / ((1+ν)(1-2ν)).
    pub fn lame_lambda(&self) -> f64 {
        self.lambda
    }

    /// Lamé's second parameter μ = E / (2(1+ν)).
    pub fn lame_mu(&self) -> f64 {
        self.mu
    }

    /// Shear modulus G (equal to μ).
    pub fn shear_modulus(&self) -> f64 {
        self.mu
    }

    /// Bulk modulus K = E / (3(1 - 2ν)).
    pub fn bulk_modulus(&self) -> f64 {
        self.youngs_modulus / (3.0 * (1.0 - 2.0 * self.poissons_ratio))
    }

    /// 3D constitutive matrix for isotropic linear elasticity.
    ///
    /// Returns the 6x6 matrix D such that σ = D * ε in Voigt notation.
    pub fn constitutive_matrix(&self) -> ConstitutiveMatrix {
        let l = self.lambda;
        let m = self.mu;
        let c11 = l + 2.0 * m;

        Matrix6::new(
            c11, l,   l,   0.0, 0.0, 0.0,
            l,   c11, l,   0.0, 0.0, 0.0,
            l,   l,   c11, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, m,   0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, m,   0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, m,
        )
    }
}

/// Common material presets.
impl Material {
    /// Structural steel (E = 200 GPa, ν = 0.3).
    pub fn steel() -> Self {
        Self::from_valid(200e9, 0.3)
    }

    /// Aluminum 6061-T6 (E = 68.9 GPa, ν = 0.33).
    pub fn aluminum() -> Self {
        Self::from_valid(68.9e9, 0.33)
    }

    fn from_valid(e: f64, nu: f64) -> Self {
        Self {
            youngs_modulus: e,
            poissons_ratio: nu,
            lambda: e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu)),
            mu: e / (2.0 * (1.0 + nu)),
        }
    }
}
