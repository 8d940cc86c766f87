//! Particle state representation for MPM.

use kaleido_math::{Mat2, Rgb, Vec2};

use crate::material::Material;
use crate::seed::SeedSample;
use crate::{MpmError, Result};

/// Smallest admissible det(F) before the deformation is treated as degenerate.
pub const MIN_JACOBIAN: f64 = 1e-6;

/// Constitutive family of a particle. The cap holds a single material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialTag {
    #[default]
    Snow,
}

/// A material point particle.
#[derive(Debug, Clone)]
pub struct Particle {
    /// Position in cap-local coordinates.
    pub x: Vec2,
    /// Velocity.
    pub v: Vec2,
    /// Elastic deformation gradient F.
    pub f: Mat2,
    /// Affine velocity field C (APIC).
    pub c: Mat2,
    /// Plastic volume ratio J_p.
    pub jp: f64,
    /// Display color.
    pub color: Rgb,
    /// Material family.
    pub tag: MaterialTag,
}

impl Particle {
    /// Create a particle at rest in its undeformed state.
    pub fn new(x: Vec2, color: Rgb) -> Self {
        Self {
            x,
            v: Vec2::zeros(),
            f: Mat2::identity(),
            c: Mat2::zeros(),
            jp: 1.0,
            color,
            tag: MaterialTag::default(),
        }
    }

    /// Advance F by (I + dt ∇v) F and clamp it back into the elastic range.
    ///
    /// A non-finite or non-positive Jacobian resets F to the identity before
    /// the plastic projection. Returns `true` when such a reset happened.
    pub fn update_deformation(&mut self, grad_v: &Mat2, dt: f64, material: &Material) -> bool {
        let f_trial = (Mat2::identity() + grad_v * dt) * self.f;
        let j = f_trial.determinant();

        let mut reset = false;
        self.f = if j.is_finite() && j > MIN_JACOBIAN {
            f_trial
        } else {
            reset = true;
            Mat2::identity()
        };

        match material.project_plastic(&self.f, self.jp) {
            Some((f, jp)) => {
                self.f = f;
                self.jp = jp;
            }
            None => {
                self.f = Mat2::identity();
                reset = true;
            }
        }
        reset
    }

    /// det(F).
    pub fn jacobian(&self) -> f64 {
        self.f.determinant()
    }
}

/// The fixed population of particles in the cap.
///
/// Created once from seed samples; particles are never added or removed.
#[derive(Debug, Clone)]
pub struct ParticleSet {
    particles: Vec<Particle>,
}

impl ParticleSet {
    /// Build the set from ordered (position, color) samples.
    pub fn from_samples<I, S>(samples: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<SeedSample>,
    {
        let particles: Vec<Particle> = samples
            .into_iter()
            .map(|s| {
                let s = s.into();
                Particle::new(s.position, s.color)
            })
            .collect();
        if particles.is_empty() {
            return Err(MpmError::EmptySeed);
        }
        Ok(Self { particles })
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }

    /// Read-only view of every particle.
    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Current positions, in particle order.
    pub fn positions(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.particles.iter().map(|p| p.x)
    }

    /// Particle colors, in particle order.
    pub fn colors(&self) -> impl Iterator<Item = Rgb> + '_ {
        self.particles.iter().map(|p| p.color)
    }

    /// Mean particle position.
    pub fn centroid(&self) -> Vec2 {
        let sum: Vec2 = self.positions().sum();
        sum / self.particles.len() as f64
    }
}

impl<'a> IntoIterator for &'a ParticleSet {
    type Item = &'a Particle;
    type IntoIter = std::slice::Iter<'a, Particle>;

    fn into_iter(self) -> Self::IntoIter {
        self.particles.iter()
    }
}
