//! MPM solver with APIC P2G/G2P transfer inside the rotating cap.

use kaleido_math::{GRAVITY, Mat2, Vec2, outer};
use log::{debug, info, trace};
use rayon::prelude::*;

use crate::boundary::CapBoundary;
use crate::grid::{Grid, MASS_EPSILON};
use crate::material::Material;
use crate::particle::{Particle, ParticleSet};
use crate::seed::SeedSample;
use crate::{MpmError, Result};

/// Upper bound on the number of partial grids used by the P2G scatter.
const MAX_SCATTER_BUFFERS: usize = 16;
/// Smallest particle chunk handed to one scatter buffer.
const MIN_SCATTER_CHUNK: usize = 256;

/// Solver configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MpmParams {
    /// Nodes per side of the background grid (even).
    pub grid_resolution: usize,
    /// Largest time step of one substep.
    pub substep_dt: f64,
    /// Gravitational acceleration.
    pub gravity: Vec2,
    /// Particle density; particle volume is (dx / 2)².
    pub density: f64,
    pub material: Material,
    pub cap_radius: f64,
    /// Coulomb friction between the particles and the moving wall.
    pub wall_friction: f64,
    /// Band inside the rim where the wall condition already applies.
    pub wall_margin: f64,
    /// Angular velocity is clamped to ±this value.
    pub max_angular_speed: f64,
}

impl Default for MpmParams {
    fn default() -> Self {
        Self {
            grid_resolution: 128,
            substep_dt: 1e-4,
            gravity: Vec2::new(0.0, -GRAVITY),
            density: 1.0,
            material: Material::snow(),
            cap_radius: 0.5,
            wall_friction: 0.8,
            wall_margin: 0.0,
            max_angular_speed: 8.0,
        }
    }
}

impl MpmParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.substep_dt.is_finite() && self.substep_dt > 0.0) {
            return Err(MpmError::InvalidParameter(format!(
                "substep dt must be positive, got {}",
                self.substep_dt
            )));
        }
        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(MpmError::InvalidParameter(format!(
                "density must be positive, got {}",
                self.density
            )));
        }
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(MpmError::InvalidParameter("gravity must be finite".into()));
        }
        self.material.validate()
    }
}

/// What happened during one call to [`MpmSolver::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Substeps taken.
    pub substeps: usize,
    /// Deformation gradients reset to identity because they degenerated.
    pub degenerate_resets: usize,
}

/// Explicit MPM simulator of the cap contents.
///
/// Owns the particles and the grid; callers only see read-only views.
pub struct MpmSolver {
    params: MpmParams,
    cap: CapBoundary,
    grid: Grid,
    scatter: Vec<Grid>,
    scatter_chunk: usize,
    particles: ParticleSet,
    particle_mass: f64,
    particle_volume: f64,
    time: f64,
}

impl MpmSolver {
    /// Create a solver holding one particle per seed sample.
    ///
    /// Every sample must lie inside the cap.
    pub fn new<I, S>(params: MpmParams, samples: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<SeedSample>,
    {
        params.validate()?;
        let cap = CapBoundary::new(params.cap_radius, params.max_angular_speed)?
            .with_wall(params.wall_friction, params.wall_margin)?;
        let grid = Grid::covering_disk(params.grid_resolution, params.cap_radius)?;

        let particles = ParticleSet::from_samples(samples)?;
        if let Some(index) = particles
            .iter()
            .position(|p| !(p.x.iter().all(|c| c.is_finite()) && cap.contains(&p.x, 0.0)))
        {
            return Err(MpmError::SampleOutsideCap { index });
        }

        let particle_volume = (grid.dx() * 0.5).powi(2);
        let particle_mass = particle_volume * params.density;

        let scatter_chunk = particles
            .len()
            .div_ceil(MAX_SCATTER_BUFFERS)
            .max(MIN_SCATTER_CHUNK);
        let scatter = (0..particles.len().div_ceil(scatter_chunk))
            .map(|_| grid.empty_like())
            .collect();

        info!(
            "MPM solver: {} particles, {}x{} grid (dx = {:.4e}), substep {:.1e}s",
            particles.len(),
            grid.res(),
            grid.res(),
            grid.dx(),
            params.substep_dt
        );

        Ok(Self {
            params,
            cap,
            grid,
            scatter,
            scatter_chunk,
            particles,
            particle_mass,
            particle_volume,
            time: 0.0,
        })
    }

    /// Advance the simulation by `dt` with the wall turning at
    /// `angular_velocity` (clamped to the configured range).
    ///
    /// `dt` is split into equal substeps no longer than the configured
    /// substep. A non-positive or non-finite `dt` does nothing.
    pub fn step(&mut self, dt: f64, angular_velocity: f64) -> StepReport {
        let mut report = StepReport::default();
        if !(dt.is_finite() && dt > 0.0) {
            return report;
        }

        self.cap.set_angular_velocity(angular_velocity);
        // The small slack keeps round-off in dt / substep_dt from adding a substep.
        let substeps = (dt / self.params.substep_dt - 1e-9).ceil().max(1.0) as usize;
        let h = dt / substeps as f64;

        for _ in 0..substeps {
            report.degenerate_resets += self.substep(h);
        }
        report.substeps = substeps;

        if report.degenerate_resets > 0 {
            debug!(
                "reset {} degenerate deformation gradients at t = {:.4}",
                report.degenerate_resets, self.time
            );
        }
        trace!(
            "step: {} substeps, cap angle {:.4} rad",
            substeps,
            self.cap.angle()
        );
        report
    }

    /// One clear → P2G → grid update → G2P/advect pass of length `h`.
    /// Returns the number of degenerate deformation resets.
    pub fn substep(&mut self, h: f64) -> usize {
        self.grid.clear();
        self.particle_to_grid(h);
        self.grid_update(h);
        let resets = self.grid_to_particle(h);
        self.cap.advance(h);
        self.time += h;
        resets
    }

    /// P2G: scatter mass, momentum and stress impulse to the grid.
    ///
    /// Each particle chunk accumulates into its own partial grid; the partial
    /// grids are then summed in a fixed order.
    fn particle_to_grid(&mut self, h: f64) {
        let dx = self.grid.dx();
        let inv_dx = self.grid.inv_dx();
        let mass = self.particle_mass;
        let stress_scale = -h * self.particle_volume * 4.0 * inv_dx * inv_dx;
        let material = self.params.material;
        let grid = &self.grid;

        self.scatter
            .par_iter_mut()
            .zip(self.particles.as_slice().par_chunks(self.scatter_chunk))
            .for_each(|(part, chunk)| {
                part.clear();
                for p in chunk {
                    let stress = material.kirchhoff_stress(&p.f, p.jp);
                    let affine = stress * stress_scale + p.c * mass;
                    let momentum = p.v * mass;

                    for (k, w, offset) in grid.stencil(&p.x).nodes() {
                        part.mass[k] += w * mass;
                        part.velocity[k] += (momentum + affine * (offset * dx)) * w;
                    }
                }
            });

        self.grid.reduce_from(&self.scatter);
    }

    /// Momentum → velocity, gravity, then the rotating wall condition.
    fn grid_update(&mut self, h: f64) {
        let gravity = self.params.gravity;
        let cap = &self.cap;
        let grid = &mut self.grid;
        let (res, dx, origin) = (grid.res(), grid.dx(), grid.origin());

        grid.mass
            .par_iter()
            .zip(grid.velocity.par_iter_mut())
            .enumerate()
            .for_each(|(k, (&m, v))| {
                if m <= MASS_EPSILON {
                    *v = Vec2::zeros();
                    return;
                }
                let vel = *v / m + gravity * h;
                let node = origin + Vec2::new((k / res) as f64, (k % res) as f64) * dx;
                *v = cap.constrain_velocity(&node, vel);
            });
    }

    /// G2P: gather velocity and affine field, update F, advect.
    fn grid_to_particle(&mut self, h: f64) -> usize {
        let inv_dx = self.grid.inv_dx();
        let material = self.params.material;
        let grid = &self.grid;
        let cap = &self.cap;

        self.particles
            .as_mut_slice()
            .par_iter_mut()
            .map(|p: &mut Particle| {
                let mut v = Vec2::zeros();
                let mut c = Mat2::zeros();
                for (k, w, offset) in grid.stencil(&p.x).nodes() {
                    let gv = grid.velocity[k];
                    v += gv * w;
                    c += outer(&gv, &offset) * (4.0 * inv_dx * w);
                }

                if v.iter().chain(c.iter()).all(|x| x.is_finite()) {
                    p.v = v;
                    p.c = c;
                } else {
                    p.v = Vec2::zeros();
                    p.c = Mat2::zeros();
                }

                let grad_v = p.c;
                let reset = p.update_deformation(&grad_v, h, &material);

                p.x += p.v * h;
                cap.project_inside(&mut p.x);
                usize::from(reset)
            })
            .sum()
    }

    pub fn params(&self) -> &MpmParams {
        &self.params
    }

    /// Read-only view of the particles.
    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    pub fn cap(&self) -> &CapBoundary {
        &self.cap
    }

    /// The grid as left by the last substep.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Simulated time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn particle_mass(&self) -> f64 {
        self.particle_mass
    }

    /// Total linear momentum of the particles.
    pub fn total_momentum(&self) -> Vec2 {
        self.particles.iter().map(|p| p.v * self.particle_mass).sum()
    }

    /// Total kinetic energy of the particles.
    pub fn kinetic_energy(&self) -> f64 {
        self.particles
            .iter()
            .map(|p| 0.5 * self.particle_mass * p.v.norm_squared())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kaleido_math::Rgb;

    fn small_params() -> MpmParams {
        MpmParams {
            grid_resolution: 32,
            ..MpmParams::default()
        }
    }

    fn sample(x: f64, y: f64) -> (Vec2, Rgb) {
        (Vec2::new(x, y), Rgb::new(0.2, 0.4, 0.8))
    }

    #[test]
    fn test_particle_count_conserved() {
        let samples: Vec<_> = (0..40)
            .map(|i| sample(-0.2 + 0.01 * i as f64, -0.3 + 0.002 * i as f64))
            .collect();
        let mut solver = MpmSolver::new(small_params(), samples).unwrap();

        for _ in 0..10 {
            solver.step(2e-3, 4.0);
        }

        assert_eq!(solver.particles().len(), 40);
        assert!(solver.time() > 0.0199 && solver.time() < 0.0201);
    }

    #[test]
    fn test_free_fall() {
        let mut solver = MpmSolver::new(small_params(), [sample(0.0, 0.2)]).unwrap();

        // 0.1 s of free fall from rest, far from the wall.
        for _ in 0..50 {
            solver.step(2e-3, 0.0);
        }

        let p = &solver.particles().as_slice()[0];
        let t = solver.time();
        assert_relative_eq!(p.v.y, -GRAVITY * t, max_relative = 1e-3);
        assert_relative_eq!(p.v.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(p.x.y, 0.2 - 0.5 * GRAVITY * t * t, epsilon = 2e-3);
    }

    #[test]
    fn test_grid_mass_matches_particles() {
        let samples: Vec<_> = (0..9)
            .map(|i| sample(0.03 * (i % 3) as f64, 0.03 * (i / 3) as f64))
            .collect();
        let mut solver = MpmSolver::new(small_params(), samples).unwrap();
        solver.step(1e-4, 0.0);

        let expected = 9.0 * solver.particle_mass();
        assert_relative_eq!(solver.grid().total_mass(), expected, max_relative = 1e-10);
    }

    #[test]
    fn test_resting_particle_dragged_by_wall() {
        let mut solver = MpmSolver::new(small_params(), [sample(0.0, -0.49)]).unwrap();

        for _ in 0..20 {
            solver.step(2e-3, 8.0);
        }

        let p = &solver.particles().as_slice()[0];
        assert!(p.v.x > 0.0, "wall should drag the particle along, v = {}", p.v);
        assert!(p.x.norm() <= 0.5 + 1e-12);
    }

    #[test]
    fn test_step_clamps_angular_velocity_and_turns_cap() {
        let mut solver = MpmSolver::new(small_params(), [sample(0.0, 0.0)]).unwrap();
        let report = solver.step(2e-3, 100.0);

        assert_eq!(report.substeps, 20);
        assert_eq!(solver.cap().angular_velocity(), 8.0);
        assert_relative_eq!(solver.cap().angle(), 8.0 * 2e-3, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_step_is_noop() {
        let mut solver = MpmSolver::new(small_params(), [sample(0.0, 0.0)]).unwrap();
        assert_eq!(solver.step(0.0, 1.0), StepReport::default());
        assert_eq!(solver.step(f64::NAN, 1.0), StepReport::default());
        assert_eq!(solver.time(), 0.0);
    }

    #[test]
    fn test_invalid_construction() {
        let outside = MpmSolver::new(small_params(), [sample(0.0, 0.0), sample(0.6, 0.0)]);
        assert!(matches!(outside, Err(MpmError::SampleOutsideCap { index: 1 })));

        let bad_dt = MpmParams {
            substep_dt: 0.0,
            ..small_params()
        };
        assert!(MpmSolver::new(bad_dt, [sample(0.0, 0.0)]).is_err());

        let bad_grid = MpmParams {
            grid_resolution: 31,
            ..small_params()
        };
        assert!(MpmSolver::new(bad_grid, [sample(0.0, 0.0)]).is_err());
    }
}
