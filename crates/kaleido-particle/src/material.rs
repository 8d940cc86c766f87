//! Elastoplastic constitutive model for the cap contents.

use kaleido_math::{Mat2, Svd2, Vec2};

use crate::{MpmError, Result};

/// Allowed range of the accumulated plastic volume ratio J_p.
pub const PLASTIC_JACOBIAN_RANGE: (f64, f64) = (0.6, 20.0);

/// Snow-like elastoplastic material.
///
/// Fixed-corotated elasticity whose Lamé parameters harden exponentially as
/// the material is plastically compressed (J_p < 1) and soften when it is
/// stretched. Plastic flow is modelled by clamping the singular values of the
/// deformation gradient into `[1 - θc, 1 + θs]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Young's modulus.
    pub youngs_modulus: f64,
    /// Poisson's ratio, in (0, 0.5).
    pub poisson_ratio: f64,
    /// Hardening coefficient ξ in h = exp(ξ (1 - J_p)).
    pub hardening: f64,
    /// Critical compression θc.
    pub critical_compression: f64,
    /// Critical stretch θs.
    pub critical_stretch: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self::snow()
    }
}

impl Material {
    /// The mpm99 snow parameters.
    pub fn snow() -> Self {
        Self {
            youngs_modulus: 5.0e3,
            poisson_ratio: 0.2,
            hardening: 10.0,
            critical_compression: 2.5e-2,
            critical_stretch: 4.5e-3,
        }
    }

    /// Check the parameters describe a physical, stable material.
    pub fn validate(&self) -> Result<()> {
        if !(self.youngs_modulus.is_finite() && self.youngs_modulus > 0.0) {
            return Err(MpmError::InvalidParameter(format!(
                "Young's modulus must be positive, got {}",
                self.youngs_modulus
            )));
        }
        if !(self.poisson_ratio > 0.0 && self.poisson_ratio < 0.5) {
            return Err(MpmError::InvalidParameter(format!(
                "Poisson ratio must lie in (0, 0.5), got {}",
                self.poisson_ratio
            )));
        }
        if !(self.hardening.is_finite() && self.hardening >= 0.0) {
            return Err(MpmError::InvalidParameter(format!(
                "hardening must be non-negative, got {}",
                self.hardening
            )));
        }
        if !(self.critical_compression > 0.0 && self.critical_compression < 1.0) {
            return Err(MpmError::InvalidParameter(format!(
                "critical compression must lie in (0, 1), got {}",
                self.critical_compression
            )));
        }
        if !(self.critical_stretch.is_finite() && self.critical_stretch > 0.0) {
            return Err(MpmError::InvalidParameter(format!(
                "critical stretch must be positive, got {}",
                self.critical_stretch
            )));
        }
        Ok(())
    }

    /// Initial Lamé parameters (μ₀, λ₀).
    pub fn lame_parameters(&self) -> (f64, f64) {
        let (e, nu) = (self.youngs_modulus, self.poisson_ratio);
        let mu = e / (2.0 * (1.0 + nu));
        let lambda = e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu));
        (mu, lambda)
    }

    /// Elastic range `[1 - θc, 1 + θs]` for the singular values of F.
    pub fn elastic_range(&self) -> (f64, f64) {
        (1.0 - self.critical_compression, 1.0 + self.critical_stretch)
    }

    /// Hardening factor h = exp(ξ (1 - J_p)).
    pub fn hardening_factor(&self, jp: f64) -> f64 {
        (self.hardening * (1.0 - jp)).exp()
    }

    /// Kirchhoff stress τ = 2μ (F - R) Fᵀ + λ J (J - 1) I.
    ///
    /// R is the rotation of the polar decomposition of F. If F cannot be
    /// decomposed the identity is used, which leaves only the volumetric term.
    pub fn kirchhoff_stress(&self, f: &Mat2, jp: f64) -> Mat2 {
        let h = self.hardening_factor(jp);
        let (mu0, lambda0) = self.lame_parameters();
        let (mu, lambda) = (mu0 * h, lambda0 * h);

        let j = f.determinant();
        let r = Svd2::new(f).map_or_else(Mat2::identity, |svd| svd.rotation());

        2.0 * mu * (f - r) * f.transpose() + Mat2::identity() * (lambda * j * (j - 1.0))
    }

    /// Project F back into the elastic region.
    ///
    /// Returns the clamped elastic deformation gradient and the updated
    /// plastic volume ratio, or `None` if F could not be decomposed.
    pub fn project_plastic(&self, f: &Mat2, jp: f64) -> Option<(Mat2, f64)> {
        let svd = Svd2::new(f)?;
        let (lo, hi) = self.elastic_range();
        let clamped: Vec2 = svd.sigma.map(|s| s.clamp(lo, hi));

        let j_trial = svd.sigma.x * svd.sigma.y;
        let j_elastic = clamped.x * clamped.y;
        let jp = (jp * j_trial / j_elastic).clamp(PLASTIC_JACOBIAN_RANGE.0, PLASTIC_JACOBIAN_RANGE.1);

        Some((svd.recompose(&clamped), jp))
    }
}
