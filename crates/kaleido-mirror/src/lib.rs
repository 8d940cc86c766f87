//! Kaleidoscope optics: a tube of flat mirrors around the cap.
//!
//! Every output pixel maps to a point in the tube's cross-section. That point
//! is folded back across the mirror walls until it lies inside the tube,
//! which yields the location the viewer actually sees through the mirrors.
//! Each pixel is independent of every other.

pub mod camera;
pub mod trace;
pub mod tube;

pub use camera::CrossSectionCamera;
pub use trace::{
    DEFAULT_MAX_BOUNCES, Miss, Reflection, ReflectionPath, ReflectionSolver, Trace, TraceOutcome,
};
pub use tube::{Mirror, MirrorTube};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("A mirror tube needs at least 3 mirrors, got {0}")]
    TooFewMirrors(usize),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, MirrorError>;
