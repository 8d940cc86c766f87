//! Rotating rigid wall of the cap.

use kaleido_math::{Vec2, perp};

use crate::{MpmError, Result};

/// Circular cap wall centered at the origin.
///
/// The disk itself is rotation invariant, so rotation only enters through
/// the wall's tangential speed and the integrated angle used to draw it.
#[derive(Debug, Clone)]
pub struct CapBoundary {
    radius: f64,
    max_angular_speed: f64,
    friction: f64,
    margin: f64,
    angle: f64,
    angular_velocity: f64,
}

impl CapBoundary {
    /// Frictionless wall at rest, with angular velocity limited to
    /// `[-max_angular_speed, max_angular_speed]`.
    pub fn new(radius: f64, max_angular_speed: f64) -> Result<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(MpmError::InvalidParameter(format!(
                "cap radius must be positive, got {radius}"
            )));
        }
        if !(max_angular_speed.is_finite() && max_angular_speed >= 0.0) {
            return Err(MpmError::InvalidParameter(format!(
                "max angular speed must be non-negative, got {max_angular_speed}"
            )));
        }
        Ok(Self {
            radius,
            max_angular_speed,
            friction: 0.0,
            margin: 0.0,
            angle: 0.0,
            angular_velocity: 0.0,
        })
    }

    /// Set the wall friction coefficient and the thickness of the band
    /// inside the rim where the wall condition already applies.
    pub fn with_wall(mut self, friction: f64, margin: f64) -> Result<Self> {
        if !(friction.is_finite() && friction >= 0.0) {
            return Err(MpmError::InvalidParameter(format!(
                "wall friction must be non-negative, got {friction}"
            )));
        }
        if !(margin >= 0.0 && margin < self.radius) {
            return Err(MpmError::InvalidParameter(format!(
                "wall margin must lie in [0, {}), got {margin}",
                self.radius
            )));
        }
        self.friction = friction;
        self.margin = margin;
        Ok(self)
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn max_angular_speed(&self) -> f64 {
        self.max_angular_speed
    }

    /// Integrated rotation angle (radians).
    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn angular_velocity(&self) -> f64 {
        self.angular_velocity
    }

    /// Set the angular velocity, clamped to the configured range.
    /// Non-finite input stops the wall. Returns the value actually applied.
    pub fn set_angular_velocity(&mut self, omega: f64) -> f64 {
        self.angular_velocity = if omega.is_finite() {
            omega.clamp(-self.max_angular_speed, self.max_angular_speed)
        } else {
            0.0
        };
        self.angular_velocity
    }

    /// Integrate the wall angle over `dt`.
    pub fn advance(&mut self, dt: f64) {
        self.angle += self.angular_velocity * dt;
    }

    /// Tangential speed of the wall at the rim.
    pub fn wall_speed(&self) -> f64 {
        self.angular_velocity * self.radius
    }

    pub fn contains(&self, x: &Vec2, tolerance: f64) -> bool {
        x.norm() <= self.radius + tolerance
    }

    /// Apply the wall condition to the velocity of a grid node at `node`.
    ///
    /// Nodes on or beyond the rim (less the margin) that move outward lose
    /// their normal velocity; the tangential velocity is pulled toward the
    /// wall speed by at most `friction * v_n`.
    pub fn constrain_velocity(&self, node: &Vec2, v: Vec2) -> Vec2 {
        let r = node.norm();
        if r < self.radius - self.margin || r <= 0.0 {
            return v;
        }

        let n = node / r;
        let v_n = n.dot(&v);
        if v_n <= 0.0 {
            return v;
        }

        let t = perp(&n);
        let v_t = t.dot(&v);
        let target = self.wall_speed();
        let v_t = if target > v_t {
            (v_t + self.friction * v_n).min(target)
        } else {
            (v_t - self.friction * v_n).max(target)
        };
        t * v_t
    }

    /// Pull a position that drifted past the rim back onto it.
    /// Returns `true` if the position was moved.
    pub fn project_inside(&self, x: &mut Vec2) -> bool {
        let r = x.norm();
        if r > self.radius {
            *x *= self.radius / r;
            true
        } else {
            false
        }
    }
}
