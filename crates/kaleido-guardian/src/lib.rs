//! Health monitoring for the cap simulation.
//!
//! This crate provides:
//! - Baselines and drift checks for particle count, mass and momentum
//! - Containment checks against the cap wall
//! - Unwrapped angular displacement tracking of the particle cloud
//! - Classification of a monitored step by its worst problem

pub mod conservation;
pub mod health;
pub mod rotation;

pub use conservation::{ParticleBaseline, ParticleMonitor};
pub use health::CapHealth;
pub use rotation::RotationTracker;
