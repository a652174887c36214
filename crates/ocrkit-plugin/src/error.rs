//! Handler error types.
//!
//! Defines [`HandlerError`], the single error type every handler
//! operation returns. The orchestration core wraps it into the
//! pipeline-level error that matches the stage it was raised in.

use thiserror::Error;

/// Errors produced by handler implementations.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Input had the wrong shape, size or content.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A dataset directory could not be read or parsed.
    #[error("dataset error: {0}")]
    Dataset(String),

    /// A model artifact could not be read back.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// Training step failed.
    #[error("training failed: {0}")]
    Training(String),

    /// Prediction failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The handler does not support this operation or option.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// I/O error during a handler operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact or option (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Image decode or encode error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
