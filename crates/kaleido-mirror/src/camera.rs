//! Pixel to cross-section mapping.

use kaleido_math::Vec2;

use crate::{MirrorError, Result};

/// Maps output pixels onto the plane of the tube's cross-section.
///
/// Pixel `(i, j)` lands at `((i - cx) * scale, (j - cy) * scale)`, where
/// `(cx, cy)` is the pixel placed over the tube axis. Row `j` grows upward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossSectionCamera {
    width: usize,
    height: usize,
    center: (f64, f64),
    scale: f64,
}

impl CrossSectionCamera {
    /// Camera centered on the tube axis, `scale` cross-section units per pixel.
    pub fn new(width: usize, height: usize, scale: f64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(MirrorError::InvalidParameter(format!(
                "image must be non-empty, got {width}x{height}"
            )));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(MirrorError::InvalidParameter(format!(
                "pixel scale must be positive, got {scale}"
            )));
        }
        Ok(Self {
            width,
            height,
            center: ((width / 2) as f64, (height / 2) as f64),
            scale,
        })
    }

    /// Move the pixel that sits over the tube axis.
    pub fn with_center(mut self, cx: f64, cy: f64) -> Self {
        self.center = (cx, cy);
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn pixel_to_point(&self, i: usize, j: usize) -> Vec2 {
        Vec2::new(
            (i as f64 - self.center.0) * self.scale,
            (j as f64 - self.center.1) * self.scale,
        )
    }

    /// Pixel nearest to `p`, if it falls inside the image.
    pub fn point_to_pixel(&self, p: &Vec2) -> Option<(usize, usize)> {
        let i = (p.x / self.scale + self.center.0).round();
        let j = (p.y / self.scale + self.center.1).round();
        let inside = i >= 0.0 && j >= 0.0 && i < self.width as f64 && j < self.height as f64;
        inside.then_some((i as usize, j as usize))
    }

    /// Cross-section point of every pixel, row-major from the bottom row.
    pub fn points(&self) -> impl Iterator<Item = Vec2> + '_ {
        (0..self.height).flat_map(move |j| (0..self.width).map(move |i| self.pixel_to_point(i, j)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_center_pixel_maps_to_origin() {
        let cam = CrossSectionCamera::new(512, 256, 0.01).unwrap();
        assert_relative_eq!(cam.pixel_to_point(256, 128), Vec2::zeros());
        assert_relative_eq!(cam.pixel_to_point(266, 118), Vec2::new(0.1, -0.1), epsilon = 1e-12);
    }

    #[test]
    fn test_pixel_round_trip() {
        let cam = CrossSectionCamera::new(64, 48, 0.5).unwrap().with_center(10.0, 5.0);
        let p = cam.pixel_to_point(3, 40);
        assert_eq!(cam.point_to_pixel(&p), Some((3, 40)));
        assert_eq!(cam.point_to_pixel(&Vec2::new(1e3, 0.0)), None);
    }

    #[test]
    fn test_points_row_major() {
        let cam = CrossSectionCamera::new(3, 2, 1.0).unwrap();
        let pts: Vec<Vec2> = cam.points().collect();
        assert_eq!(pts.len(), cam.pixel_count());
        assert_eq!(pts[1], cam.pixel_to_point(1, 0));
        assert_eq!(pts[3], cam.pixel_to_point(0, 1));
    }

    #[test]
    fn test_invalid_camera() {
        assert!(CrossSectionCamera::new(0, 4, 1.0).is_err());
        assert!(CrossSectionCamera::new(4, 4, 0.0).is_err());
    }
}
