use thiserror::Error;

/// Message shown to the user when no hardware-accelerated context is available.
pub const UNSUPPORTED_MESSAGE: &str =
    "Your browser or graphics card does not seem to support WebGL.";

/// Fatal initialization failures. None of these are retried.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("hardware-accelerated rendering is not available")]
    Unsupported,
    #[error("canvas element `{0}` not found")]
    MissingCanvas(String),
    #[error("failed to create rendering surface: {0}")]
    Surface(String),
    #[error("failed to acquire GPU device: {0}")]
    Device(String),
    #[error("DOM error: {0}")]
    Dom(String),
}

impl InitError {
    /// Failures that mean the browser cannot drive the GPU at all.
    pub fn is_missing_gpu(&self) -> bool {
        matches!(self, Self::Unsupported | Self::Surface(_) | Self::Device(_))
    }
}
