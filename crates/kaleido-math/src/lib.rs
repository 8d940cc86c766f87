//! Planar math primitives for the kaleidoscope.
//!
//! Thin aliases over nalgebra plus the handful of 2D helpers the particle
//! simulator and the mirror tracer share: perpendiculars, the scalar cross
//! product, outer products, rotations and a 2×2 singular value decomposition.

pub mod svd;

pub use svd::Svd2;

use nalgebra as na;

/// 2D vector alias.
pub type Vec2 = na::Vector2<f64>;
/// 2x2 matrix alias.
pub type Mat2 = na::Matrix2<f64>;
/// Linear RGB color, each channel in [0, 1].
pub type Rgb = na::Vector3<f64>;

/// Standard gravity used by the cap simulation (units/s²).
pub const GRAVITY: f64 = 9.8;

/// Scalar (z-component) cross product of two planar vectors.
#[inline]
pub fn cross2(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Counter-clockwise perpendicular: rotates `v` by +90°.
#[inline]
pub fn perp(v: &Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Outer product a bᵀ.
#[inline]
pub fn outer(a: &Vec2, b: &Vec2) -> Mat2 {
    a * b.transpose()
}

/// Rotation matrix for a counter-clockwise angle in radians.
#[inline]
pub fn rotation(angle: f64) -> Mat2 {
    let (s, c) = angle.sin_cos();
    Mat2::new(c, -s, s, c)
}

/// Polar angle of `v` in (-π, π].
#[inline]
pub fn polar_angle(v: &Vec2) -> f64 {
    v.y.atan2(v.x)
}

/// Wrap an angle difference into (-π, π].
pub fn wrap_angle(mut a: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    a %= TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

/// Pack an 8-bit RGB triple into a hex color (0xRRGGBB).
#[inline]
pub fn pack_rgb8(rgb: [u8; 3]) -> u32 {
    (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32
}

/// Convert an 8-bit RGB triple to a linear [0, 1] color.
#[inline]
pub fn rgb_from_u8(rgb: [u8; 3]) -> Rgb {
    Rgb::new(
        rgb[0] as f64 / 255.0,
        rgb[1] as f64 / 255.0,
        rgb[2] as f64 / 255.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_cross_and_perp() {
        let a = Vec2::new(1.0, 0.0);
        let b = Vec2::new(0.0, 2.0);
        assert_relative_eq!(cross2(&a, &b), 2.0);
        assert_relative_eq!(cross2(&b, &a), -2.0);
        assert_eq!(perp(&a), Vec2::new(0.0, 1.0));
        assert_relative_eq!(cross2(&a, &perp(&a)), 1.0);
    }

    #[test]
    fn test_rotation_quarter_turn() {
        let r = rotation(FRAC_PI_2);
        let v = r * Vec2::new(1.0, 0.0);
        assert_relative_eq!(v, Vec2::new(0.0, 1.0), epsilon = 1e-12);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_outer_product() {
        let m = outer(&Vec2::new(1.0, 2.0), &Vec2::new(3.0, 4.0));
        assert_eq!(m, Mat2::new(3.0, 4.0, 6.0, 8.0));
    }

    #[test]
    fn test_wrap_angle() {
        assert_relative_eq!(wrap_angle(1.5 * PI), -0.5 * PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-1.5 * PI), 0.5 * PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(0.25), 0.25);
    }

    #[test]
    fn test_color_packing() {
        assert_eq!(pack_rgb8([255, 255, 255]), 0xffffff);
        assert_eq!(pack_rgb8([0x12, 0x34, 0x56]), 0x123456);
        assert_relative_eq!(rgb_from_u8([255, 0, 51]), Rgb::new(1.0, 0.0, 0.2));
    }
}
