//! Render errors.

use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("2D context unavailable")]
    ContextUnavailable,
    #[error("Drawer was removed")]
    Removed,
    #[error("Paint failed: {0}")]
    Paint(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
