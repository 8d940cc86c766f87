//! Material Point Method simulation of the kaleidoscope cap.
//!
//! Colored snow-like particles rest in a rotating disk. Each step transfers
//! particle mass and momentum to a background lattice with APIC (Affine
//! Particle-In-Cell) weights, applies gravity and the moving-wall boundary on
//! the lattice, and gathers velocities back to update particle state.

pub mod boundary;
pub mod grid;
pub mod material;
pub mod mpm;
pub mod particle;
pub mod seed;

pub use boundary::CapBoundary;
pub use grid::{Grid, Stencil};
pub use material::Material;
pub use mpm::{MpmParams, MpmSolver, StepReport};
pub use particle::{MaterialTag, Particle, ParticleSet};
pub use seed::{Seed, SeedRaster, SeedSample, sample_seed};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MpmError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Seed contains no particles")]
    EmptySeed,

    #[error("Seed sample {index} lies outside the cap")]
    SampleOutsideCap { index: usize },

    #[error("Seed raster yielded no usable pixel after {attempts} draws")]
    SeedExhausted { attempts: usize },
}

pub type Result<T> = std::result::Result<T, MpmError>;
