//! Demo handler family.
//!
//! Trains nothing more than per-position character frequencies and
//! always predicts the most frequent character at each position. The
//! artifact is a small JSON document, which makes the family handy for
//! checking that a pipeline is wired correctly end to end.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ocrkit_core::{dataset, imaging};
use ocrkit_plugin::{
    EvaluateHandler, Handler, HandlerError, InferHandler, Predictor, PreprocessHandler,
    ProcessedImage, TrainHandler, TrainSession,
};
use ocrkit_types::report::{Dimensions, Prediction};
use ocrkit_types::sample::{char_index, index_char};
use ocrkit_types::{Dataset, LABEL_LENGTH, PipelineContext, Sample, Tensor, is_valid_label};

use crate::CORE_REQUIREMENT;

pub const DEMO_HANDLER_VERSION: &str = "1.0.0";

/// Preprocessed image width.
pub const DEMO_WIDTH: u32 = 128;
/// Preprocessed image height.
pub const DEMO_HEIGHT: u32 = 64;

const MODEL_TYPE: &str = "demo";
const SAMPLE_LABEL_LIMIT: usize = 5;

macro_rules! demo_identity {
    ($ty:ty, $id:literal, $alias:literal, $desc:literal) => {
        impl Handler for $ty {
            fn id(&self) -> &str {
                $id
            }
            fn version(&self) -> &str {
                DEMO_HANDLER_VERSION
            }
            fn description(&self) -> &str {
                $desc
            }
            fn core_requirement(&self) -> Option<&str> {
                Some(CORE_REQUIREMENT)
            }
            fn aliases(&self) -> &[&str] {
                &[$alias]
            }
        }
    };
}

// ── Preprocess ───────────────────────────────────────────────────────────

/// Grayscale resize to 128x64.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoPreprocess;

demo_identity!(
    DemoPreprocess,
    "demo_preprocess",
    "DemoPreprocessHandler",
    "Grayscale 128x64 resize for the demo family"
);

impl PreprocessHandler for DemoPreprocess {
    fn load_dataset(&self, root: &Path, _ctx: &PipelineContext) -> Result<Dataset, HandlerError> {
        dataset::load_with(root, |img| imaging::grayscale_tensor(img, DEMO_WIDTH, DEMO_HEIGHT))
    }

    fn process(&self, image: &image::DynamicImage) -> Result<ProcessedImage, HandlerError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(HandlerError::InvalidInput("image has no pixels".into()));
        }
        Ok(ProcessedImage {
            tensor: imaging::grayscale_tensor(image, DEMO_WIDTH, DEMO_HEIGHT)?,
            dimensions: Dimensions::new(DEMO_WIDTH, DEMO_HEIGHT),
        })
    }
}

// ── Artifact ─────────────────────────────────────────────────────────────

/// Hyperparameters recorded alongside a demo model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingConfig {
    pub epochs: u32,
    pub batch_size: usize,
    pub learning_rate: f64,
    #[serde(default)]
    pub validation_split: f64,
}

/// Summary of the dataset a demo model was trained on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetInfo {
    pub total_images: usize,
    pub unique_labels: usize,
    pub sample_labels: Vec<String>,
}

/// On-disk demo model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemoModel {
    pub model_type: String,
    pub demo_mode: bool,
    pub handler_version: String,
    pub training_config: TrainingConfig,
    pub dataset_info: DatasetInfo,
    pub prediction: String,
    pub confidences: Vec<f32>,
    pub epochs_trained: u32,
}

impl DemoModel {
    /// Read and validate a model file.
    pub fn load(path: &Path) -> Result<Self, HandlerError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HandlerError::ModelLoad(format!("cannot read {}: {e}", path.display()))
        })?;
        let model: DemoModel = serde_json::from_str(&raw).map_err(|e| {
            HandlerError::ModelLoad(format!("{} is not a demo model: {e}", path.display()))
        })?;
        if model.model_type != MODEL_TYPE {
            return Err(HandlerError::ModelLoad(format!(
                "expected model_type '{MODEL_TYPE}', found '{}'",
                model.model_type
            )));
        }
        if !is_valid_label(&model.prediction) || model.confidences.len() != LABEL_LENGTH {
            return Err(HandlerError::ModelLoad(format!(
                "malformed prediction '{}' in {}",
                model.prediction,
                path.display()
            )));
        }
        Ok(model)
    }
}

// ── Train ────────────────────────────────────────────────────────────────

/// Learns per-position character frequencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoTrain;

demo_identity!(
    DemoTrain,
    "demo_train",
    "DemoTrainHandler",
    "Frequency-count trainer that predicts the most common characters"
);

impl TrainHandler for DemoTrain {
    fn start(
        &self,
        ctx: &PipelineContext,
        dataset: &Dataset,
    ) -> Result<Box<dyn TrainSession>, HandlerError> {
        let hyper = ctx.hyperparameters();
        let unique = dataset.unique_labels();
        Ok(Box::new(DemoSession {
            config: TrainingConfig {
                epochs: hyper.epochs,
                batch_size: hyper.batch_size,
                learning_rate: hyper.learning_rate,
                validation_split: hyper.validation_split,
            },
            info: DatasetInfo {
                total_images: dataset.len(),
                unique_labels: unique.len(),
                sample_labels: unique
                    .iter()
                    .take(SAMPLE_LABEL_LIMIT)
                    .map(|l| l.to_string())
                    .collect(),
            },
            counts: [[0; 26]; LABEL_LENGTH],
            seen: 0,
            epochs_trained: 0,
        }))
    }
}

struct DemoSession {
    config: TrainingConfig,
    info: DatasetInfo,
    counts: [[u32; 26]; LABEL_LENGTH],
    seen: u32,
    epochs_trained: u32,
}

impl DemoSession {
    fn current(&self) -> Result<Prediction, HandlerError> {
        if self.seen == 0 {
            return Err(HandlerError::Inference("model has not been trained".into()));
        }
        let mut text = String::with_capacity(LABEL_LENGTH);
        let mut confidences = Vec::with_capacity(LABEL_LENGTH);
        for position in &self.counts {
            let (idx, count) = position
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
                .unwrap_or((0, &0));
            text.push(index_char(idx).unwrap_or('a'));
            confidences.push(*count as f32 / self.seen as f32);
        }
        Ok(Prediction { text, confidences })
    }
}

impl TrainSession for DemoSession {
    fn train_epoch(&mut self, epoch: u32, samples: &[Sample]) -> Result<f64, HandlerError> {
        if samples.is_empty() {
            return Err(HandlerError::Training("no training samples".into()));
        }
        self.counts = [[0; 26]; LABEL_LENGTH];
        self.seen = 0;
        for sample in samples {
            for (pos, c) in sample.label.chars().take(LABEL_LENGTH).enumerate() {
                if let Some(idx) = char_index(c) {
                    self.counts[pos][idx] += 1;
                }
            }
            self.seen += 1;
        }
        self.epochs_trained = epoch;

        let prediction = self.current()?;
        let top_share = f64::from(prediction.mean_confidence());
        let loss = (1.0 - top_share).max(0.01) / f64::from(epoch.max(1));
        debug!(epoch, loss, prediction = %prediction.text, "demo epoch");
        Ok(loss)
    }

    fn predict(&self, _input: &Tensor) -> Result<Prediction, HandlerError> {
        self.current()
    }

    fn save(&self, path: &Path) -> Result<(), HandlerError> {
        let prediction = self.current()?;
        let model = DemoModel {
            model_type: MODEL_TYPE.into(),
            demo_mode: true,
            handler_version: DEMO_HANDLER_VERSION.into(),
            training_config: self.config.clone(),
            dataset_info: self.info.clone(),
            prediction: prediction.text,
            confidences: prediction.confidences,
            epochs_trained: self.epochs_trained,
        };
        std::fs::write(path, serde_json::to_vec_pretty(&model)?)?;
        Ok(())
    }
}

// ── Evaluate / OCR ───────────────────────────────────────────────────────

struct FixedPrediction(Prediction);

impl Predictor for FixedPrediction {
    fn predict(&self, _input: &Tensor) -> Result<Prediction, HandlerError> {
        Ok(self.0.clone())
    }
}

fn load_predictor(path: &Path) -> Result<FixedPrediction, HandlerError> {
    let model = DemoModel::load(path)?;
    debug!(
        path = %path.display(),
        prediction = %model.prediction,
        "loaded demo model"
    );
    Ok(FixedPrediction(Prediction {
        text: model.prediction,
        confidences: model.confidences,
    }))
}

/// Evaluates demo models.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoEvaluate;

demo_identity!(
    DemoEvaluate,
    "demo_evaluate",
    "DemoEvaluateHandler",
    "Evaluates demo models"
);

impl EvaluateHandler for DemoEvaluate {
    fn load_model(
        &self,
        path: &Path,
        _ctx: &PipelineContext,
    ) -> Result<Box<dyn Predictor>, HandlerError> {
        Ok(Box::new(load_predictor(path)?))
    }
}

/// Serves demo models.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoOcr;

demo_identity!(DemoOcr, "demo_ocr", "DemoOCRHandler", "Serves demo models");

impl InferHandler for DemoOcr {
    fn load_model(
        &self,
        path: &Path,
        _ctx: &PipelineContext,
    ) -> Result<Arc<dyn Predictor>, HandlerError> {
        Ok(Arc::new(load_predictor(path)?))
    }
}
