//! Pipeline error taxonomy.
//!
//! [`PipelineError`] is what every orchestrator returns. Each variant
//! names the stage that failed and carries the offending id or path, and
//! [`PipelineError::code`] gives the stable string surfaced by the CLI
//! and the HTTP service.

use std::path::PathBuf;

use thiserror::Error;

use ocrkit_plugin::{HandlerError, HandlerKind};
use ocrkit_types::ConfigError;

use crate::registry::RegistryError;

/// Errors produced by the train, evaluate and inference orchestrators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    // ── Setup ────────────────────────────────────────────────────────

    /// Handler registration or resolution failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The pipeline context is incomplete or invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The context names no handler for a stage the run needs.
    #[error("no {kind} handler selected")]
    MissingHandler { kind: HandlerKind },

    // ── Training ─────────────────────────────────────────────────────

    /// The dataset location is missing, unreadable or yielded nothing.
    #[error("failed to load dataset at {}: {reason}", path.display())]
    DatasetLoad { path: PathBuf, reason: String },

    /// A train handler reported a NaN or infinite loss.
    #[error("training diverged at epoch {epoch}: loss is {loss}")]
    TrainingDiverged { epoch: u32, loss: f64 },

    /// The best-so-far checkpoint could not be written.
    #[error("failed to write checkpoint {}: {reason}", path.display())]
    Checkpoint { path: PathBuf, reason: String },

    // ── Evaluation ───────────────────────────────────────────────────

    /// The model artifact could not be read by the handler.
    #[error("failed to load model from {}: {source}", path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: HandlerError,
    },

    /// The target dataset yielded zero samples.
    #[error("no samples found in {}", path.display())]
    EmptyDataset { path: PathBuf },

    // ── Serving ──────────────────────────────────────────────────────

    /// Request bytes are not a decodable image.
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// The image decoded but preprocessing rejected it.
    #[error("preprocessing failed: {0}")]
    Preprocess(String),

    /// The model failed or broke its output contract.
    #[error("inference failed: {0}")]
    Inference(String),

    /// Any other handler failure during a run.
    #[error("handler '{id}' failed: {source}")]
    Handler {
        id: String,
        #[source]
        source: HandlerError,
    },
}

impl PipelineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Registry(e) => e.code(),
            Self::Config(_) => "CONFIG_ERROR",
            Self::MissingHandler { .. } => "MISSING_HANDLER",
            Self::DatasetLoad { .. } => "DATASET_LOAD_ERROR",
            Self::TrainingDiverged { .. } => "TRAINING_DIVERGED",
            Self::Checkpoint { .. } => "CHECKPOINT_ERROR",
            Self::ModelLoad { .. } => "MODEL_LOAD_ERROR",
            Self::EmptyDataset { .. } => "EMPTY_DATASET",
            Self::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            Self::Preprocess(_) => "PREPROCESS_ERROR",
            Self::Inference(_) => "INFERENCE_ERROR",
            Self::Handler { .. } => "HANDLER_ERROR",
        }
    }

    /// Whether the caller's input caused the failure (as opposed to the
    /// model, a handler, or the environment).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ImageDecode(_)
                | Self::Preprocess(_)
                | Self::Config(_)
                | Self::MissingHandler { .. }
                | Self::Registry(
                    RegistryError::HandlerNotFound { .. }
                        | RegistryError::HandlerKindMismatch { .. }
                )
        )
    }

    pub(crate) fn handler(id: &str, source: HandlerError) -> Self {
        Self::Handler {
            id: id.to_string(),
            source,
        }
    }
}
