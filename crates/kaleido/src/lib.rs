//! kaleido — a kaleidoscope built from a particle simulation and a mirror tube.
//!
//! This is the umbrella crate: it re-exports the sub-crates and turns the
//! simulated cap contents into output frames.

pub use kaleido_format::{self, KaleidoSpec, load_kaleido_spec};
pub use kaleido_guardian::{
    self, CapHealth, ParticleBaseline, ParticleMonitor, RotationTracker,
};
pub use kaleido_math::{self, Rgb, Vec2};
pub use kaleido_mirror::{
    self, CrossSectionCamera, Miss, MirrorTube, ReflectionSolver, Trace, TraceOutcome,
};
pub use kaleido_particle::{
    self, Material, MpmParams, MpmSolver, ParticleSet, SeedRaster, StepReport, sample_seed,
};

pub mod render;

pub use render::{BACKGROUND, ColorField, Frame, compose_image, compose_pre_image};
