//! Error types for kaleido-format.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Simulation error: {0}")]
    MpmError(#[from] kaleido_particle::MpmError),

    #[error("Mirror error: {0}")]
    MirrorError(#[from] kaleido_mirror::MirrorError),
}

pub type Result<T> = std::result::Result<T, FormatError>;
