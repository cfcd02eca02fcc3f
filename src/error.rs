use crate::common::QRError;
use crate::generate::OrchestratorError;

/// Error surfaced by [`crate::pipeline::Pipeline::run`] to the caller.
///
/// Verification failures are not errors; they come back as
/// `verified: false` on the response.
#[derive(Debug, thiserror::Error)]
pub enum ArtError {
    #[error("Invalid payload: {0}")]
    Validation(#[from] QRError),

    #[error("Unknown style: {0}")]
    UnknownStyle(String),

    #[error("Reference image unavailable: {0}")]
    ReferenceImageUnavailable(String),

    #[error("Style requires a reference image")]
    ReferenceImageMissing,

    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    #[error("Generation failed: {0}")]
    Generation(#[from] OrchestratorError),

    #[error("Render task failed: {0}")]
    Render(String),

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl ArtError {
    /// Validation errors come from the caller's input and are never retried.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::UnknownStyle(_) | Self::ReferenceImageMissing)
    }
}
