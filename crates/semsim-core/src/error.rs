use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No calibration image for sample '{sample}', detector '{detector}' near {magnification}x")]
    NotFound {
        sample: String,
        detector: String,
        magnification: f64,
    },

    #[error("Failed to decode calibration image {}: {reason}", .path.display())]
    DecodeFailure { path: PathBuf, reason: String },

    #[error("Calibration library root not found: {}", .0.display())]
    LibraryRootMissing(PathBuf),

    #[error("Malformed parameter file: {0}")]
    ParamsFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No frame has been rendered yet")]
    NoFrame,

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),
}

impl SimError {
    /// Errors the session recovers from by keeping its last good state and frame.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SimError::InvalidParameter(_) | SimError::NotFound { .. } | SimError::DecodeFailure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
