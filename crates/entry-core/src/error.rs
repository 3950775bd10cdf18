//! Error types for the render entry point.

use thiserror::Error;

/// Errors that can occur while rendering a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The shell could not be constructed; no response was produced.
    #[error("Shell render failed: {0}")]
    Shell(String),

    /// A failure inside the stream after rendering started.
    #[error("Stream render error: {0}")]
    Stream(String),

    /// The render was aborted before it became ready.
    #[error("Render aborted before the shell was ready")]
    Aborted,

    /// The renderer finished without producing a shell.
    #[error("Renderer ended without producing a shell")]
    Incomplete,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response construction failed.
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<http::Error> for RenderError {
    fn from(err: http::Error) -> Self {
        RenderError::Http(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for RenderError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        RenderError::Config(err.to_string())
    }
}
