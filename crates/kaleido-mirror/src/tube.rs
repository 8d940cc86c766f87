//! Mirror geometry: a regular polygon of flat mirrors.

use std::f64::consts::TAU;

use kaleido_math::Vec2;

use crate::{MirrorError, Result};

/// A flat mirror: the segment `start → end` lying on the line `n̂·p = d`.
///
/// `normal` points out of the tube, so points with a positive signed
/// distance are on the reflecting (outer) side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mirror {
    pub start: Vec2,
    pub end: Vec2,
    pub normal: Vec2,
    pub offset: f64,
}

impl Mirror {
    /// Mirror along `start → end` of a counter-clockwise polygon; the outward
    /// normal is the edge direction turned clockwise.
    pub fn through(start: Vec2, end: Vec2) -> Self {
        let e = end - start;
        let normal = Vec2::new(e.y, -e.x).normalize();
        Self {
            start,
            end,
            normal,
            offset: normal.dot(&start),
        }
    }

    /// Signed distance of `p` from the mirror line, positive outside.
    #[inline]
    pub fn signed_distance(&self, p: &Vec2) -> f64 {
        self.normal.dot(p) - self.offset
    }

    /// Mirror image of `p`: p - 2 (p·n̂ - d) n̂.
    #[inline]
    pub fn reflect(&self, p: &Vec2) -> Vec2 {
        p - self.normal * (2.0 * self.signed_distance(p))
    }

    /// Distance from `p` to the mirror segment.
    pub fn distance_to_segment(&self, p: &Vec2) -> f64 {
        let e = self.end - self.start;
        let t = ((p - self.start).dot(&e) / e.norm_squared()).clamp(0.0, 1.0);
        (p - (self.start + e * t)).norm()
    }

    /// Fraction of the path `from → to` at which it leaves the tube through
    /// this mirror's segment.
    ///
    /// `None` unless `from` is inside the mirror line and `to` is beyond it,
    /// both by more than `eps`, and the crossing lies on the segment.
    pub fn exit_parameter(&self, from: &Vec2, to: &Vec2, eps: f64) -> Option<f64> {
        let (d_from, d_to) = (self.signed_distance(from), self.signed_distance(to));
        if d_from >= -eps || d_to <= eps {
            return None;
        }
        let t = -d_from / (d_to - d_from);
        let hit = from + (to - from) * t;
        (self.distance_to_segment(&hit) <= eps).then_some(t)
    }
}

/// N mirrors forming a regular polygon around the tube axis (the
/// cross-section origin).
///
/// Vertex k sits at angle 2πk/N on the circumscribed circle; mirror k joins
/// vertex k to vertex k+1. The tube is static for the whole run.
#[derive(Debug, Clone)]
pub struct MirrorTube {
    circumradius: f64,
    mirrors: Vec<Mirror>,
}

impl MirrorTube {
    pub fn regular(mirror_count: usize, circumradius: f64) -> Result<Self> {
        if mirror_count < 3 {
            return Err(MirrorError::TooFewMirrors(mirror_count));
        }
        if !(circumradius.is_finite() && circumradius > 0.0) {
            return Err(MirrorError::InvalidParameter(format!(
                "tube circumradius must be positive, got {circumradius}"
            )));
        }

        let vertices: Vec<Vec2> = (0..mirror_count)
            .map(|k| {
                let (s, c) = (TAU * k as f64 / mirror_count as f64).sin_cos();
                Vec2::new(c, s) * circumradius
            })
            .collect();
        let mirrors = (0..mirror_count)
            .map(|k| Mirror::through(vertices[k], vertices[(k + 1) % mirror_count]))
            .collect();

        Ok(Self {
            circumradius,
            mirrors,
        })
    }

    pub fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }

    pub fn mirrors(&self) -> &[Mirror] {
        &self.mirrors
    }

    pub fn circumradius(&self) -> f64 {
        self.circumradius
    }

    /// Distance from the center to every mirror line.
    pub fn apothem(&self) -> f64 {
        self.circumradius * (std::f64::consts::PI / self.mirrors.len() as f64).cos()
    }

    /// Polygon vertices, in mirror order.
    pub fn vertices(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.mirrors.iter().map(|m| m.start)
    }

    /// Lowest-index mirror whose outer half-plane contains `p` by more than
    /// `eps`. At a polygon corner both neighbors qualify and the lower index
    /// wins.
    pub fn first_violated(&self, p: &Vec2, eps: f64) -> Option<usize> {
        self.mirrors
            .iter()
            .position(|m| m.signed_distance(p) > eps)
    }

    /// First mirror the path `from → to` leaves the tube through, and where.
    ///
    /// A path through a vertex meets both neighbors at once; the lower index
    /// wins.
    pub fn first_crossed(&self, from: &Vec2, to: &Vec2, eps: f64) -> Option<(usize, Vec2)> {
        let len = (to - from).norm();
        let mut first: Option<(usize, f64)> = None;
        for (k, m) in self.mirrors.iter().enumerate() {
            if let Some(t) = m.exit_parameter(from, to, eps) {
                if first.is_none_or(|(_, best)| (best - t) * len > eps) {
                    first = Some((k, t));
                }
            }
        }
        first.map(|(k, t)| (k, from + (to - from) * t))
    }

    /// Whether `p` is inside the polygon (within `eps`).
    pub fn contains(&self, p: &Vec2, eps: f64) -> bool {
        self.first_violated(p, eps).is_none()
    }
}
