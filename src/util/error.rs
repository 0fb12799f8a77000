//! Error types for the refinement core.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for renderer setup and export.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration rejected during validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stage resource or worker could not be created
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    /// Output directory cannot be used
    #[error("Output directory unavailable: {}", .0.display())]
    OutputDir(PathBuf),

    /// Image dimensions do not match the stage they are bound to
    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// Capture was requested after shutdown
    #[error("Capture pipeline is shut down")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding error
    #[error("Encode failed: {0}")]
    Encode(#[from] image::ImageError),

    /// Settings (de)serialization error
    #[error("Settings parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Result type alias for refinement core operations.
pub type Result<T> = std::result::Result<T, Error>;
