//! Gauss-Legendre quadrature on the reference interval and cube.
//!
//! ```
//! use hexfem_core::element::gauss::{gauss_1d, gauss_hex};
//!
//! // ∫_{-1}^{1} x² dx = 2/3, exact with two points
//! let integral: f64 = gauss_1d(2).iter().map(|&(x, w)| x * x * w).sum();
//! assert!((integral - 2.0 / 3.0).abs() < 1e-14);
//!
//! // 2×2×2 rule used by the Hex8 kernel
//! assert_eq!(gauss_hex(2).len(), 8);
//! ```

/// A quadrature point in the reference cube [-1, 1]³.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussPoint {
    /// Natural coordinates (ξ, η, ζ).
    pub coords: [f64; 3],
    /// Product weight.
    pub weight: f64,
}

impl GaussPoint {
    pub fn new(coords: [f64; 3], weight: f64) -> Self {
        Self { coords, weight }
    }

    #[inline]
    pub fn xi(&self) -> f64 {
        self.coords[0]
    }

    #[inline]
    pub fn eta(&self) -> f64 {
        self.coords[1]
    }

    #[inline]
    pub fn zeta(&self) -> f64 {
        self.coords[2]
    }
}

/// 1D Gauss-Legendre abscissae and weights on [-1, 1].
///
/// An n-point rule integrates polynomials up to degree 2n-1 exactly.
///
/// # Panics
///
/// Panics if `n` is not in 1..=3.
pub fn gauss_1d(n: usize) -> Vec<(f64, f64)> {
    match n {
        1 => vec![(0.0, 2.0)],
        2 => {
            let a = 1.0 / 3.0_f64.sqrt();
            vec![(-a, 1.0), (a, 1.0)]
        }
        3 => {
            let a = 0.6_f64.sqrt();
            vec![(-a, 5.0 / 9.0), (0.0, 8.0 / 9.0), (a, 5.0 / 9.0)]
        }
        _ => panic!("gauss_1d: n must be 1, 2, or 3, got {}", n),
    }
}

/// Tensor-product rule on the reference hexahedron, n points per direction.
///
/// Points are ordered with ξ outermost and ζ innermost, which fixes the
/// summation order of every quantity integrated with this rule.
///
/// # Panics
///
/// Panics if `n` is not in 1..=3.
pub fn gauss_hex(n: usize) -> Vec<GaussPoint> {
    let line = gauss_1d(n);
    let mut points = Vec::with_capacity(n * n * n);

    for &(xi, w_xi) in &line {
        for &(eta, w_eta) in &line {
            for &(zeta, w_zeta) in &line {
                points.push(GaussPoint::new([xi, eta, zeta], w_xi * w_eta * w_zeta));
            }
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_two_point_rule_is_exact_for_cubics() {
        let rule = gauss_1d(2);
        let cubic: f64 = rule.iter().map(|&(x, w)| (x.powi(3) - 2.0 * x + 1.0) * w).sum();
        assert_relative_eq!(cubic, 2.0, epsilon = 1e-14);
    }

    #[test]
    fn test_two_point_abscissae() {
        let rule = gauss_1d(2);
        assert_relative_eq!(rule[1].0, 0.577_350_269_189_625_8, epsilon = 1e-15);
        assert_eq!(rule[0].0, -rule[1].0);
        assert_eq!(rule[0].1, 1.0);
    }

    #[test]
    fn test_three_point_rule_is_exact_for_quintics() {
        let rule = gauss_1d(3);
        let integral: f64 = rule.iter().map(|&(x, w)| x.powi(4) * w).sum();
        assert_relative_eq!(integral, 0.4, epsilon = 1e-14);
    }

    #[test]
    fn test_hex_rule_sizes_and_weights() {
        for n in 1..=3 {
            let rule = gauss_hex(n);
            assert_eq!(rule.len(), n * n * n);
            let volume: f64 = rule.iter().map(|gp| gp.weight).sum();
            assert_relative_eq!(volume, 8.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_hex_rule_ordering() {
        let rule = gauss_hex(2);
        let a = 1.0 / 3.0_f64.sqrt();
        assert_eq!(rule[0].coords, [-a, -a, -a]);
        assert_eq!(rule[1].coords, [-a, -a, a]);
        assert_eq!(rule[7].coords, [a, a, a]);
        assert!(rule.iter().all(|gp| gp.weight == 1.0));
    }

    #[test]
    #[should_panic(expected = "gauss_1d: n must be")]
    fn test_gauss_1d_invalid_n() {
        gauss_1d(4);
    }
}
