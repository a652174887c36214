//! Handler contracts, one capability trait per pipeline stage.
//!
//! Every handler implements [`Handler`] for its identity plus exactly the
//! stage trait(s) it provides. The orchestration core only ever talks to
//! these traits, so a handler swap never touches the train, evaluate or
//! serving loops.
//!
//! All methods are synchronous. Handlers are CPU-bound; async callers
//! (the HTTP service) run them on a blocking thread.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ocrkit_types::report::{Dimensions, Prediction};
use ocrkit_types::{Dataset, PipelineContext, Sample, Tensor};

use crate::error::HandlerError;

// ---------------------------------------------------------------------------
// HandlerKind
// ---------------------------------------------------------------------------

/// The pipeline stage a handler serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Preprocess,
    Train,
    Evaluate,
    /// Serving-time recognition. Accepts `"ocr"` when parsed.
    #[serde(alias = "ocr")]
    Infer,
}

impl HandlerKind {
    /// Every kind, in pipeline order.
    pub const ALL: [HandlerKind; 4] = [
        HandlerKind::Preprocess,
        HandlerKind::Train,
        HandlerKind::Evaluate,
        HandlerKind::Infer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preprocess => "preprocess",
            Self::Train => "train",
            Self::Evaluate => "evaluate",
            Self::Infer => "infer",
        }
    }
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HandlerKind {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preprocess" => Ok(Self::Preprocess),
            "train" => Ok(Self::Train),
            "evaluate" | "eval" => Ok(Self::Evaluate),
            "infer" | "ocr" => Ok(Self::Infer),
            other => Err(HandlerError::InvalidInput(format!(
                "unknown handler kind '{other}' (expected preprocess, train, evaluate or infer)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Handler identity
// ---------------------------------------------------------------------------

/// Identity shared by every handler kind.
pub trait Handler: Send + Sync {
    /// Unique identifier within its kind (e.g. `"demo_train"`).
    fn id(&self) -> &str;

    /// Declared semantic version of this handler (e.g. `"1.2.0"`).
    fn version(&self) -> &str;

    /// One-line human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Semver requirement on the core (e.g. `"^0.1"`). `None` means any.
    fn core_requirement(&self) -> Option<&str> {
        None
    }

    /// Extra names the handler resolves under, such as a class-style
    /// name (`"DemoTrainHandler"`).
    fn aliases(&self) -> &[&str] {
        &[]
    }
}

// ---------------------------------------------------------------------------
// Preprocess
// ---------------------------------------------------------------------------

/// A decoded image after preprocessing.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Model input.
    pub tensor: Tensor,
    /// Dimensions of the image the tensor was built from.
    pub dimensions: Dimensions,
}

/// Turns raw images into model inputs.
///
/// The same handler is used for training, evaluation and serving, so
/// `load_dataset` and `process` must produce identically shaped tensors.
pub trait PreprocessHandler: Handler {
    /// Load every labelled sample under `root`.
    ///
    /// A missing or unreadable `root` is an error. An existing directory
    /// with no usable samples returns an empty [`Dataset`]; the caller
    /// decides whether that is fatal.
    fn load_dataset(&self, root: &Path, ctx: &PipelineContext) -> Result<Dataset, HandlerError>;

    /// Convert one decoded image into a model input.
    fn process(&self, image: &image::DynamicImage) -> Result<ProcessedImage, HandlerError>;
}

// ---------------------------------------------------------------------------
// Train
// ---------------------------------------------------------------------------

/// Read-only predictor over a loaded or in-training model.
///
/// Shared across concurrent requests, so implementations must not
/// mutate model state in `predict`.
pub trait Predictor: Send + Sync {
    /// Predict a [`LABEL_LENGTH`](ocrkit_types::LABEL_LENGTH)-character
    /// label with one confidence per character.
    fn predict(&self, input: &Tensor) -> Result<Prediction, HandlerError>;
}

/// Mutable model state for one training run.
pub trait TrainSession: Send {
    /// Run one full pass over `samples` and return the mean loss.
    fn train_epoch(&mut self, epoch: u32, samples: &[Sample]) -> Result<f64, HandlerError>;

    /// Predict with the current weights (used for validation).
    fn predict(&self, input: &Tensor) -> Result<Prediction, HandlerError>;

    /// Persist the current model to `path`, overwriting it.
    fn save(&self, path: &Path) -> Result<(), HandlerError>;
}

/// Creates training sessions.
pub trait TrainHandler: Handler {
    /// Start a session. `dataset` is the full loaded dataset, before the
    /// validation split, for handlers that size themselves from it.
    fn start(
        &self,
        ctx: &PipelineContext,
        dataset: &Dataset,
    ) -> Result<Box<dyn TrainSession>, HandlerError>;
}

// ---------------------------------------------------------------------------
// Evaluate / Infer
// ---------------------------------------------------------------------------

/// Loads a model artifact for offline evaluation.
pub trait EvaluateHandler: Handler {
    fn load_model(
        &self,
        path: &Path,
        ctx: &PipelineContext,
    ) -> Result<Box<dyn Predictor>, HandlerError>;
}

/// Loads a model artifact for serving.
pub trait InferHandler: Handler {
    /// The returned predictor is shared across every in-flight request.
    fn load_model(
        &self,
        path: &Path,
        ctx: &PipelineContext,
    ) -> Result<Arc<dyn Predictor>, HandlerError>;
}
