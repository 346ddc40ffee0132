use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PreviewError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Render failed: {0}")]
    RenderFailure(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Coarse category of a [`PreviewError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    ResourceUnavailable,
    RenderFailure,
    Io,
}

impl PreviewError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PreviewError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PreviewError::ResourceUnavailable(_) => ErrorKind::ResourceUnavailable,
            PreviewError::RenderFailure(_) => ErrorKind::RenderFailure,
            PreviewError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn missing_parameter(name: &str) -> Self {
        PreviewError::InvalidArgument(format!(
            "generate_preview: parameter '{name}' must be a non-empty string"
        ))
    }

    pub fn render_timeout(after: Duration) -> Self {
        PreviewError::RenderFailure(format!("timed out after {after:?}"))
    }
}

impl From<std::io::Error> for PreviewError {
    fn from(err: std::io::Error) -> Self {
        PreviewError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PreviewError {
    fn from(err: serde_json::Error) -> Self {
        PreviewError::InvalidArgument(err.to_string())
    }
}

impl From<image::ImageError> for PreviewError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => PreviewError::Io(e.to_string()),
            other => PreviewError::Io(format!("image processing failed: {other}")),
        }
    }
}
