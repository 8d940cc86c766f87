//! Unwrapped angular displacement of the particle cloud about the cap center.

use kaleido_math::{polar_angle, wrap_angle};
use kaleido_particle::ParticleSet;

/// Particles closer to the center than this fraction of the cap radius have
/// an ill-defined polar angle and are left out of the mean.
const CORE_FRACTION: f64 = 0.05;

/// Accumulates each particle's polar-angle change across updates.
///
/// Updates must be frequent enough that no particle turns by more than π
/// about the center between two of them.
#[derive(Debug, Clone)]
pub struct RotationTracker {
    min_radius: f64,
    previous: Vec<f64>,
    accumulated: Vec<f64>,
}

impl RotationTracker {
    pub fn new(particles: &ParticleSet, cap_radius: f64) -> Self {
        Self {
            min_radius: CORE_FRACTION * cap_radius,
            previous: particles.positions().map(|x| polar_angle(&x)).collect(),
            accumulated: vec![0.0; particles.len()],
        }
    }

    pub fn update(&mut self, particles: &ParticleSet) {
        for ((x, prev), acc) in particles
            .positions()
            .zip(self.previous.iter_mut())
            .zip(self.accumulated.iter_mut())
        {
            let theta = polar_angle(&x);
            if x.norm() >= self.min_radius {
                *acc += wrap_angle(theta - *prev);
            }
            *prev = theta;
        }
    }

    /// Mean accumulated displacement (radians, counter-clockwise positive).
    pub fn mean(&self) -> f64 {
        if self.accumulated.is_empty() {
            return 0.0;
        }
        self.accumulated.iter().sum::<f64>() / self.accumulated.len() as f64
    }

    pub fn displacements(&self) -> &[f64] {
        &self.accumulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kaleido_math::{Rgb, Vec2, rotation};

    fn ring(angle: f64) -> ParticleSet {
        let r = rotation(angle);
        ParticleSet::from_samples((0..8).map(|k| {
            let a = k as f64 * std::f64::consts::TAU / 8.0;
            (r * Vec2::new(a.cos(), a.sin()) * 0.3, Rgb::zeros())
        }))
        .unwrap()
    }

    #[test]
    fn test_tracks_past_half_turn() {
        let mut tracker = RotationTracker::new(&ring(0.0), 0.5);
        // Eight quarter-radian steps: two radians in all, crossing ±π.
        for k in 1..=8 {
            tracker.update(&ring(0.25 * k as f64));
        }
        assert_relative_eq!(tracker.mean(), 2.0, epsilon = 1e-12);
        for d in tracker.displacements() {
            assert_relative_eq!(*d, 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_clockwise_is_negative() {
        let mut tracker = RotationTracker::new(&ring(0.0), 0.5);
        tracker.update(&ring(-0.1));
        assert_relative_eq!(tracker.mean(), -0.1, epsilon = 1e-12);
    }
}
