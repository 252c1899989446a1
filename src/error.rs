//! Error types shared by the sandbox pipeline.

use thiserror::Error;

/// Errors produced while calibrating or running the sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The frame source could not grab or retrieve a frame.
    #[error("Frame acquisition failed: {0}")]
    Acquisition(String),

    /// Every calibration strategy failed, or manual calibration was aborted.
    #[error("Calibration failed: {0}")]
    CalibrationFailed(String),

    /// Point correspondences cannot produce a perspective transform.
    #[error("Invalid correspondence: {0}")]
    InvalidCorrespondence(String),

    #[error("For given sand depth and height limits the colorband has to cover {expected}mm, covers {actual}mm (px) as columns")]
    ColorBand { expected: u32, actual: u32 },

    #[error("The colorband must only have one row, found {0}")]
    ColorBandRows(u32),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
