//! JSON configuration for the kaleidoscope.
//!
//! A single document describes the simulation, the cap material, the cap
//! wall, the mirror tube and the output camera. Every field has a default,
//! so `{"version": "1.0", "name": "demo"}` is a complete configuration.

pub mod error;
pub mod schema;

pub use error::{FormatError, Result};
pub use schema::{
    CameraConfig, CapConfig, KaleidoSpec, MaterialConfig, SimulationConfig, TubeConfig,
    export_kaleido_spec, load_kaleido_spec, save_kaleido_spec,
};
