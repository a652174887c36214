//! Prediction, inference and report types.
//!
//! These are the structured results orchestrators hand back to the CLI
//! and HTTP layers. All of them serialize to JSON.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ── Images ───────────────────────────────────────────────────────────────

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Image dimensions before and after preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    /// As received by the service.
    pub original: Dimensions,
    /// As handed to the model.
    pub processed: Dimensions,
}

// ── Inference ────────────────────────────────────────────────────────────

/// Raw output of a predictor for one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted label text.
    pub text: String,
    /// One confidence per predicted character, each in `[0, 1]`.
    pub confidences: Vec<f32>,
}

impl Prediction {
    /// Mean of the per-character confidences, `0.0` when there are none.
    pub fn mean_confidence(&self) -> f32 {
        if self.confidences.is_empty() {
            return 0.0;
        }
        self.confidences.iter().sum::<f32>() / self.confidences.len() as f32
    }
}

/// One image submitted for recognition.
///
/// Transport-specific field names (`image`, `image_base64`, multipart
/// `file`) are normalized into `bytes` before a request reaches the core.
#[derive(Debug, Clone, Default)]
pub struct InferenceRequest {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// Declared format: a file extension (`png`) or MIME type
    /// (`image/png`). `None` means sniff from the payload.
    pub format: Option<String>,
}

impl InferenceRequest {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            format: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Recognition result for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub text: String,
    /// Exactly `LABEL_LENGTH` entries, each in `[0, 1]`.
    pub confidences: Vec<f32>,
    /// Mean of `confidences`.
    pub confidence: f32,
    pub image_size: ImageSize,
    /// Handler id -> declared version, for the handlers that served this.
    pub handler_versions: BTreeMap<String, String>,
}

// ── Evaluation ───────────────────────────────────────────────────────────

/// Per-sample evaluation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleDetail {
    pub source: PathBuf,
    pub expected: String,
    pub predicted: String,
    pub correct: bool,
    pub cer: f64,
}

/// Aggregate evaluation result for one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub total_samples: usize,
    pub correct_predictions: usize,
    /// Exact-match accuracy in `[0, 1]`.
    pub accuracy: f64,
    /// Mean character error rate.
    pub cer: f64,
    /// Position-wise correct characters over total label characters.
    pub character_accuracy: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<SampleDetail>,
}

// ── Training ─────────────────────────────────────────────────────────────

/// Metrics recorded after one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    /// 1-based epoch index.
    pub epoch: u32,
    /// Configured epoch count.
    pub epochs: u32,
    pub loss: f64,
    pub val_accuracy: f64,
    pub val_cer: f64,
    /// Whether this epoch produced a new best checkpoint.
    pub checkpointed: bool,
}

/// Result of a training run that reached its final epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub handler: String,
    pub handler_version: String,
    pub epochs_completed: u32,
    pub best_epoch: Option<u32>,
    pub best_accuracy: f64,
    pub best_cer: f64,
    pub final_loss: f64,
    pub artifact_path: Option<PathBuf>,
    pub train_samples: usize,
    pub validation_samples: usize,
    pub history: Vec<EpochReport>,
}
