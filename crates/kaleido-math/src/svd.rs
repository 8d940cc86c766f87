//! Singular value decomposition of 2×2 matrices.
//!
//! Wraps nalgebra's SVD and fixes the sign convention so that U Vᵀ is
//! always a proper rotation: when the decomposition comes back with a
//! reflection, the second column of U and the second singular value are
//! negated instead.

use nalgebra as na;

use crate::{Mat2, Vec2};

/// F = U diag(σ) Vᵀ with det(U Vᵀ) = +1.
#[derive(Debug, Clone, Copy)]
pub struct Svd2 {
    pub u: Mat2,
    pub sigma: Vec2,
    pub v_t: Mat2,
}

impl Svd2 {
    /// Decompose `m`. Returns `None` if the factorization did not converge
    /// or `m` contains non-finite entries.
    pub fn new(m: &Mat2) -> Option<Self> {
        if !m.iter().all(|x| x.is_finite()) {
            return None;
        }
        let svd = na::SVD::new(*m, true, true);
        let mut u = svd.u?;
        let v_t = svd.v_t?;
        let mut sigma = svd.singular_values;

        if u.determinant() * v_t.determinant() < 0.0 {
            let flipped = -u.column(1);
            u.set_column(1, &flipped);
            sigma[1] = -sigma[1];
        }

        Some(Self { u, sigma, v_t })
    }

    /// Rotational part R = U Vᵀ of the polar decomposition F = R S.
    pub fn rotation(&self) -> Mat2 {
        self.u * self.v_t
    }

    /// Rebuild U diag(σ') Vᵀ with replacement singular values.
    pub fn recompose(&self, sigma: &Vec2) -> Mat2 {
        self.u * Mat2::from_diagonal(sigma) * self.v_t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity() {
        let svd = Svd2::new(&Mat2::identity()).unwrap();
        assert_relative_eq!(svd.sigma, Vec2::new(1.0, 1.0), epsilon = 1e-12);
        assert_relative_eq!(svd.rotation(), Mat2::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_stretch_and_rotate() {
        let f = crate::rotation(0.3) * Mat2::new(2.0, 0.0, 0.0, 0.5);
        let svd = Svd2::new(&f).unwrap();
        let mut s = [svd.sigma.x, svd.sigma.y];
        s.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_relative_eq!(s[0], 0.5, epsilon = 1e-10);
        assert_relative_eq!(s[1], 2.0, epsilon = 1e-10);
        assert_relative_eq!(svd.rotation(), crate::rotation(0.3), epsilon = 1e-10);
        assert_relative_eq!(svd.recompose(&svd.sigma), f, epsilon = 1e-10);
    }

    #[test]
    fn test_reflection_moves_into_sigma() {
        let f = Mat2::new(1.0, 0.0, 0.0, -2.0);
        let svd = Svd2::new(&f).unwrap();
        assert_relative_eq!(svd.rotation().determinant(), 1.0, epsilon = 1e-10);
        assert!(svd.sigma.x * svd.sigma.y < 0.0);
        assert_relative_eq!(svd.recompose(&svd.sigma), f, epsilon = 1e-10);
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(Svd2::new(&Mat2::new(f64::NAN, 0.0, 0.0, 1.0)).is_none());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn recompose_reproduces_input(
            a in -3.0..3.0_f64, b in -3.0..3.0_f64,
            c in -3.0..3.0_f64, d in -3.0..3.0_f64,
        ) {
            let f = Mat2::new(a, b, c, d);
            let svd = Svd2::new(&f).unwrap();
            prop_assert!((svd.recompose(&svd.sigma) - f).norm() < 1e-8);
            prop_assert!((svd.rotation().determinant() - 1.0).abs() < 1e-8);
        }
    }
}
