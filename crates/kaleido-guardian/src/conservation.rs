//! Invariant monitoring for the cap simulation.
//!
//! Particles are never created or destroyed and never leave the cap, so the
//! particle count and total mass are exact invariants. Momentum is not
//! conserved (gravity and the wall act on the cloud) and is only reported.

use kaleido_math::Vec2;
use kaleido_particle::MpmSolver;
use log::warn;

/// Quantities captured at the start of a run.
#[derive(Debug, Clone)]
pub struct ParticleBaseline {
    pub count: usize,
    pub total_mass: f64,
    pub momentum: Vec2,
    pub kinetic_energy: f64,
}

impl ParticleBaseline {
    pub fn new(solver: &MpmSolver) -> Self {
        let count = solver.particles().len();
        Self {
            count,
            total_mass: count as f64 * solver.particle_mass(),
            momentum: solver.total_momentum(),
            kinetic_energy: solver.kinetic_energy(),
        }
    }
}

/// Deviations from the baseline at the current step.
#[derive(Debug, Clone)]
pub struct ParticleMonitor {
    /// Current count minus the baseline count.
    pub count_delta: isize,
    /// Relative mass error: |M - M₀| / M₀
    pub mass_error: f64,
    /// Largest distance of any particle beyond the cap radius.
    pub radial_excess: f64,
    /// Particles with a non-finite position or velocity.
    pub non_finite: usize,
    /// Momentum change since the baseline.
    pub momentum_change: Vec2,
    pub kinetic_energy: f64,
}

impl ParticleMonitor {
    pub fn check(baseline: &ParticleBaseline, solver: &MpmSolver) -> Self {
        let particles = solver.particles();
        let radius = solver.cap().radius();

        let count = particles.len();
        let total_mass = count as f64 * solver.particle_mass();
        let mass_error = if baseline.total_mass > 0.0 {
            (total_mass - baseline.total_mass).abs() / baseline.total_mass
        } else {
            total_mass.abs()
        };

        let mut radial_excess: f64 = 0.0;
        let mut non_finite = 0;
        for p in particles {
            if p.x.iter().chain(p.v.iter()).all(|c| c.is_finite()) {
                radial_excess = radial_excess.max(p.x.norm() - radius);
            } else {
                non_finite += 1;
            }
        }

        let monitor = Self {
            count_delta: count as isize - baseline.count as isize,
            mass_error,
            radial_excess,
            non_finite,
            momentum_change: solver.total_momentum() - baseline.momentum,
            kinetic_energy: solver.kinetic_energy(),
        };
        if monitor.non_finite > 0 {
            warn!(
                "{} particles have non-finite state at t = {:.4}",
                monitor.non_finite,
                solver.time()
            );
        }
        monitor
    }

    /// Check whether any invariant is broken beyond tolerance.
    pub fn is_violated(&self, mass_tol: f64, radial_tol: f64) -> bool {
        self.count_delta != 0
            || self.non_finite > 0
            || self.mass_error > mass_tol
            || self.radial_excess > radial_tol
    }
}
