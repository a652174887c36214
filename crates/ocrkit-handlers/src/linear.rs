//! Linear handler family.
//!
//! Each of the four label positions gets its own softmax regression over
//! the flattened 48x16 grayscale image plus a bias term. Weights live in
//! one `[positions, classes, features + 1]` array and are trained with
//! mini-batch SGD on mean cross-entropy.
//!
//! Handler options (under `handler_options.linear_train`):
//!
//! | key            | default | meaning                       |
//! |----------------|---------|-------------------------------|
//! | `weight_decay` | `0.0`   | L2 penalty applied per batch  |

use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array3, ArrayView1, Axis, s};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ocrkit_core::{dataset, imaging};
use ocrkit_plugin::{
    EvaluateHandler, Handler, HandlerError, InferHandler, Predictor, PreprocessHandler,
    ProcessedImage, TrainHandler, TrainSession,
};
use ocrkit_types::report::{Dimensions, Prediction};
use ocrkit_types::sample::{char_index, index_char};
use ocrkit_types::{CHARSET, Dataset, LABEL_LENGTH, PipelineContext, Sample, Tensor};

use crate::CORE_REQUIREMENT;
use crate::options;

pub const LINEAR_HANDLER_VERSION: &str = "0.2.0";

pub const LINEAR_WIDTH: u32 = 48;
pub const LINEAR_HEIGHT: u32 = 16;

const MODEL_TYPE: &str = "linear";
const FEATURES: usize = (LINEAR_WIDTH * LINEAR_HEIGHT) as usize;
const CLASSES: usize = CHARSET.len();
const MIN_PROB: f32 = 1e-12;

macro_rules! linear_identity {
    ($ty:ty, $id:literal, $alias:literal, $desc:literal) => {
        impl Handler for $ty {
            fn id(&self) -> &str {
                $id
            }
            fn version(&self) -> &str {
                LINEAR_HANDLER_VERSION
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

/// Grayscale resize to 48x16.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearPreprocess;

linear_identity!(
    LinearPreprocess,
    "linear_preprocess",
    "LinearPreprocessHandler",
    "Grayscale 48x16 resize for the linear family"
);

impl PreprocessHandler for LinearPreprocess {
    fn load_dataset(&self, root: &Path, _ctx: &PipelineContext) -> Result<Dataset, HandlerError> {
        dataset::load_with(root, |img| imaging::grayscale_tensor(img, LINEAR_WIDTH, LINEAR_HEIGHT))
    }

    fn process(&self, image: &image::DynamicImage) -> Result<ProcessedImage, HandlerError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(HandlerError::InvalidInput("image has no pixels".into()));
        }
        Ok(ProcessedImage {
            tensor: imaging::grayscale_tensor(image, LINEAR_WIDTH, LINEAR_HEIGHT)?,
            dimensions: Dimensions::new(LINEAR_WIDTH, LINEAR_HEIGHT),
        })
    }
}

// ── Model ────────────────────────────────────────────────────────────────

/// Per-position softmax regression weights.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    weights: Array3<f32>,
}

impl Default for LinearModel {
    fn default() -> Self {
        Self {
            weights: Array3::zeros((LABEL_LENGTH, CLASSES, FEATURES + 1)),
        }
    }
}

fn features(input: &Tensor) -> Result<Array1<f32>, HandlerError> {
    if input.len() != FEATURES {
        return Err(HandlerError::InvalidInput(format!(
            "expected {FEATURES} input values ({LINEAR_WIDTH}x{LINEAR_HEIGHT}), got {}",
            input.len()
        )));
    }
    Ok(input.iter().copied().collect())
}

fn softmax(mut logits: Array1<f32>) -> Array1<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    logits.mapv_inplace(|v| (v - max).exp());
    let sum = logits.sum();
    logits /= sum;
    logits
}

impl LinearModel {
    /// Class probabilities for one position.
    fn probabilities(&self, position: usize, x: &ArrayView1<f32>) -> Array1<f32> {
        let w = self.weights.index_axis(Axis(0), position);
        let logits = w.slice(s![.., ..FEATURES]).dot(x) + w.column(FEATURES);
        softmax(logits)
    }

    fn predict_features(&self, x: &ArrayView1<f32>) -> Result<Prediction, HandlerError> {
        let mut text = String::with_capacity(LABEL_LENGTH);
        let mut confidences = Vec::with_capacity(LABEL_LENGTH);
        for pos in 0..LABEL_LENGTH {
            let probs = self.probabilities(pos, x);
            let (idx, p) = probs
                .iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &p)| {
                    if p > best.1 { (i, p) } else { best }
                });
            if !p.is_finite() {
                return Err(HandlerError::Inference(format!(
                    "non-finite probability at position {pos}"
                )));
            }
            text.push(index_char(idx).unwrap_or('a'));
            confidences.push(p.clamp(0.0, 1.0));
        }
        Ok(Prediction { text, confidences })
    }

    pub fn predict(&self, input: &Tensor) -> Result<Prediction, HandlerError> {
        let x = features(input)?;
        self.predict_features(&x.view())
    }

    /// One SGD step over `batch`. Returns the summed per-character loss.
    fn step(
        &mut self,
        batch: &[(&Array1<f32>, [usize; LABEL_LENGTH])],
        learning_rate: f32,
        weight_decay: f32,
    ) -> f64 {
        let mut grad = Array3::<f32>::zeros(self.weights.raw_dim());
        let mut loss = 0.0_f64;
        for (x, targets) in batch {
            let x = x.view();
            for (pos, &target) in targets.iter().enumerate() {
                let mut probs = self.probabilities(pos, &x);
                loss -= f64::from(probs[target].max(MIN_PROB).ln());
                probs[target] -= 1.0;

                let mut g = grad.index_axis_mut(Axis(0), pos);
                for (k, &coef) in probs.iter().enumerate() {
                    g.slice_mut(s![k, ..FEATURES]).scaled_add(coef, &x);
                    g[[k, FEATURES]] += coef;
                }
            }
        }

        let scale = learning_rate / batch.len() as f32;
        if weight_decay > 0.0 {
            self.weights *= 1.0 - learning_rate * weight_decay;
        }
        self.weights.scaled_add(-scale, &grad);
        loss
    }
}

// ── Artifact ─────────────────────────────────────────────────────────────

/// On-disk linear model.
#[derive(Debug, Serialize, Deserialize)]
pub struct LinearArtifact {
    pub model_type: String,
    pub handler_version: String,
    pub width: u32,
    pub height: u32,
    pub epochs_trained: u32,
    pub shape: Vec<usize>,
    pub weights: Vec<f32>,
}

impl LinearArtifact {
    fn from_model(model: &LinearModel, epochs_trained: u32) -> Self {
        Self {
            model_type: MODEL_TYPE.into(),
            handler_version: LINEAR_HANDLER_VERSION.into(),
            width: LINEAR_WIDTH,
            height: LINEAR_HEIGHT,
            epochs_trained,
            shape: model.weights.shape().to_vec(),
            weights: model.weights.iter().copied().collect(),
        }
    }

    /// Validate the artifact and rebuild the weight array.
    pub fn into_model(self) -> Result<LinearModel, HandlerError> {
        if self.model_type != MODEL_TYPE {
            return Err(HandlerError::ModelLoad(format!(
                "expected model_type '{MODEL_TYPE}', found '{}'",
                self.model_type
            )));
        }
        if (self.width, self.height) != (LINEAR_WIDTH, LINEAR_HEIGHT) {
            return Err(HandlerError::ModelLoad(format!(
                "model was trained on {}x{} inputs, this handler produces {LINEAR_WIDTH}x{LINEAR_HEIGHT}",
                self.width, self.height
            )));
        }
        let expected = [LABEL_LENGTH, CLASSES, FEATURES + 1];
        if self.shape != expected {
            return Err(HandlerError::ModelLoad(format!(
                "weight shape {:?} does not match {expected:?}",
                self.shape
            )));
        }
        let weights = Array3::from_shape_vec((expected[0], expected[1], expected[2]), self.weights)
            .map_err(|e| HandlerError::ModelLoad(format!("bad weight data: {e}")))?;
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(HandlerError::ModelLoad("weights contain non-finite values".into()));
        }
        Ok(LinearModel { weights })
    }

    pub fn load(path: &Path) -> Result<LinearModel, HandlerError> {
        let raw = std::fs::read(path).map_err(|e| {
            HandlerError::ModelLoad(format!("cannot read {}: {e}", path.display()))
        })?;
        let artifact: LinearArtifact = serde_json::from_slice(&raw).map_err(|e| {
            HandlerError::ModelLoad(format!("{} is not a linear model: {e}", path.display()))
        })?;
        artifact.into_model()
    }
}

// ── Train ────────────────────────────────────────────────────────────────

/// Mini-batch SGD trainer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearTrain;

linear_identity!(
    LinearTrain,
    "linear_train",
    "LinearTrainHandler",
    "Per-position softmax regression trained with mini-batch SGD"
);

impl TrainHandler for LinearTrain {
    fn start(
        &self,
        ctx: &PipelineContext,
        _dataset: &Dataset,
    ) -> Result<Box<dyn TrainSession>, HandlerError> {
        let hyper = ctx.hyperparameters();
        let weight_decay = options::f64_option(ctx, self.id(), "weight_decay", 0.0)?;
        debug!(
            batch_size = hyper.batch_size,
            learning_rate = hyper.learning_rate,
            weight_decay,
            "starting linear session"
        );
        Ok(Box::new(LinearSession {
            model: LinearModel::default(),
            batch_size: hyper.batch_size.max(1),
            learning_rate: hyper.learning_rate as f32,
            weight_decay: weight_decay as f32,
            seed: hyper.seed,
            epochs_trained: 0,
        }))
    }
}

struct LinearSession {
    model: LinearModel,
    batch_size: usize,
    learning_rate: f32,
    weight_decay: f32,
    seed: u64,
    epochs_trained: u32,
}

fn targets(label: &str) -> Result<[usize; LABEL_LENGTH], HandlerError> {
    let mut out = [0; LABEL_LENGTH];
    let mut chars = label.chars();
    for slot in &mut out {
        *slot = chars
            .next()
            .and_then(char_index)
            .ok_or_else(|| HandlerError::InvalidInput(format!("unusable label '{label}'")))?;
    }
    Ok(out)
}

impl TrainSession for LinearSession {
    fn train_epoch(&mut self, epoch: u32, samples: &[Sample]) -> Result<f64, HandlerError> {
        if samples.is_empty() {
            return Err(HandlerError::Training("no training samples".into()));
        }
        let prepared = samples
            .iter()
            .map(|s| Ok((features(&s.input)?, targets(&s.label)?)))
            .collect::<Result<Vec<_>, HandlerError>>()?;

        let mut order: Vec<usize> = (0..prepared.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(u64::from(epoch)));
        order.shuffle(&mut rng);

        let mut total = 0.0;
        for chunk in order.chunks(self.batch_size) {
            let batch: Vec<_> = chunk
                .iter()
                .map(|&i| (&prepared[i].0, prepared[i].1))
                .collect();
            total += self
                .model
                .step(&batch, self.learning_rate, self.weight_decay);
        }
        self.epochs_trained = epoch;
        Ok(total / (prepared.len() * LABEL_LENGTH) as f64)
    }

    fn predict(&self, input: &Tensor) -> Result<Prediction, HandlerError> {
        self.model.predict(input)
    }

    fn save(&self, path: &Path) -> Result<(), HandlerError> {
        let artifact = LinearArtifact::from_model(&self.model, self.epochs_trained);
        std::fs::write(path, serde_json::to_vec(&artifact)?)?;
        Ok(())
    }
}

// ── Evaluate / OCR ───────────────────────────────────────────────────────

impl Predictor for LinearModel {
    fn predict(&self, input: &Tensor) -> Result<Prediction, HandlerError> {
        LinearModel::predict(self, input)
    }
}

/// Evaluates linear models.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearEvaluate;

linear_identity!(
    LinearEvaluate,
    "linear_evaluate",
    "LinearEvaluateHandler",
    "Evaluates linear models"
);

impl EvaluateHandler for LinearEvaluate {
    fn load_model(
        &self,
        path: &Path,
        _ctx: &PipelineContext,
    ) -> Result<Box<dyn Predictor>, HandlerError> {
        Ok(Box::new(LinearArtifact::load(path)?))
    }
}

/// Serves linear models.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearOcr;

linear_identity!(
    LinearOcr,
    "linear_ocr",
    "LinearOCRHandler",
    "Serves linear models"
);

impl InferHandler for LinearOcr {
    fn load_model(
        &self,
        path: &Path,
        _ctx: &PipelineContext,
    ) -> Result<Arc<dyn Predictor>, HandlerError> {
        Ok(Arc::new(LinearArtifact::load(path)?))
    }
}
