//! Scriptable handlers for unit tests.
//!
//! Samples carry their label as four class indices followed by an
//! ordinal, so predictors can answer "correctly" without a real model.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use ocrkit_plugin::{
    EvaluateHandler, Handler, HandlerError, InferHandler, Predictor, PreprocessHandler,
    ProcessedImage, TrainHandler, TrainSession,
};
use ocrkit_types::report::{Dimensions, Prediction};
use ocrkit_types::sample::{char_index, index_char};
use ocrkit_types::{Dataset, PipelineContext, Sample, Tensor};

const LABELS: [&str; 5] = ["abcd", "efgh", "ijkl", "mnop", "qrst"];

fn encode(label: &str, ordinal: usize) -> Tensor {
    let mut values: Vec<f32> = label
        .chars()
        .map(|c| char_index(c).unwrap_or(0) as f32)
        .collect();
    values.push(ordinal as f32);
    Tensor::from_shape_vec(ndarray::IxDyn(&[values.len()]), values).unwrap()
}

fn decode(input: &Tensor) -> String {
    input
        .iter()
        .take(4)
        .map(|v| index_char(*v as usize).unwrap_or('a'))
        .collect()
}

fn ordinal(input: &Tensor) -> usize {
    input.iter().nth(4).map(|v| *v as usize).unwrap_or(0)
}

// ── Preprocess ───────────────────────────────────────────────────────────

pub struct FixedPreprocess {
    id: String,
    version: String,
    core_requirement: Option<String>,
    aliases: Vec<&'static str>,
    count: usize,
}

impl FixedPreprocess {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.into(),
            version: "1.0.0".into(),
            core_requirement: None,
            aliases: Vec::new(),
            count: 10,
        }
    }

    pub fn with_version(mut self, v: &str) -> Self {
        self.version = v.into();
        self
    }

    pub fn with_core_requirement(mut self, req: &str) -> Self {
        self.core_requirement = Some(req.into());
        self
    }

    pub fn with_aliases(mut self, aliases: &[&'static str]) -> Self {
        self.aliases = aliases.to_vec();
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }
}

impl Handler for FixedPreprocess {
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> &str {
        &self.version
    }
    fn core_requirement(&self) -> Option<&str> {
        self.core_requirement.as_deref()
    }
    fn aliases(&self) -> &[&str] {
        &self.aliases
    }
}

impl PreprocessHandler for FixedPreprocess {
    fn load_dataset(&self, root: &Path, _ctx: &PipelineContext) -> Result<Dataset, HandlerError> {
        if !root.is_dir() {
            return Err(HandlerError::Dataset(format!(
                "not a directory: {}",
                root.display()
            )));
        }
        let samples = (0..self.count)
            .map(|i| {
                let label = LABELS[i % LABELS.len()];
                Sample {
                    label: label.into(),
                    input: encode(label, i),
                    source: root.join(format!("{label}_{i}.png")),
                }
            })
            .collect();
        Ok(Dataset::new(root, samples))
    }

    fn process(&self, image: &image::DynamicImage) -> Result<ProcessedImage, HandlerError> {
        if image.width() < 2 || image.height() < 2 {
            return Err(HandlerError::InvalidInput("image too small".into()));
        }
        Ok(ProcessedImage {
            tensor: encode("abcd", 0),
            dimensions: Dimensions::new(8, 4),
        })
    }
}

// ── Train ────────────────────────────────────────────────────────────────

pub struct FixedTrain {
    id: String,
    losses: Vec<f64>,
    accuracies: Vec<f64>,
    fail_save_at: Option<u32>,
    epochs_run: Arc<AtomicU32>,
}

impl FixedTrain {
    pub fn new(id: &str, losses: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            losses,
            accuracies: Vec::new(),
            fail_save_at: None,
            epochs_run: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Validation accuracy the session reaches after each epoch.
    pub fn with_accuracies(mut self, accuracies: Vec<f64>) -> Self {
        self.accuracies = accuracies;
        self
    }

    pub fn failing_save_at(mut self, epoch: u32) -> Self {
        self.fail_save_at = Some(epoch);
        self
    }

    pub fn epochs_run(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.epochs_run)
    }
}

impl Handler for FixedTrain {
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
}

impl TrainHandler for FixedTrain {
    fn start(
        &self,
        _ctx: &PipelineContext,
        _dataset: &Dataset,
    ) -> Result<Box<dyn TrainSession>, HandlerError> {
        Ok(Box::new(FixedSession {
            epoch: 0,
            losses: self.losses.clone(),
            accuracies: self.accuracies.clone(),
            fail_save_at: self.fail_save_at,
            epochs_run: Arc::clone(&self.epochs_run),
        }))
    }
}

struct FixedSession {
    epoch: u32,
    losses: Vec<f64>,
    accuracies: Vec<f64>,
    fail_save_at: Option<u32>,
    epochs_run: Arc<AtomicU32>,
}

fn at(values: &[f64], epoch: u32, default: f64) -> f64 {
    values
        .get(epoch.saturating_sub(1) as usize)
        .or(values.last())
        .copied()
        .unwrap_or(default)
}

impl TrainSession for FixedSession {
    fn train_epoch(&mut self, epoch: u32, _samples: &[Sample]) -> Result<f64, HandlerError> {
        self.epoch = epoch;
        self.epochs_run.fetch_add(1, Ordering::SeqCst);
        Ok(at(&self.losses, epoch, 1.0))
    }

    fn predict(&self, input: &Tensor) -> Result<Prediction, HandlerError> {
        let accuracy = at(&self.accuracies, self.epoch, 1.0);
        let correct = (ordinal(input) % 10) < (accuracy * 10.0).round() as usize;
        let text = if correct { decode(input) } else { "zzzz".into() };
        Ok(Prediction {
            text,
            confidences: vec![accuracy as f32; 4],
        })
    }

    fn save(&self, path: &Path) -> Result<(), HandlerError> {
        if self.fail_save_at == Some(self.epoch) {
            std::fs::write(path, "partial garbage")?;
            return Err(HandlerError::Training("disk full".into()));
        }
        std::fs::write(path, format!("{{\"epoch\":{}}}", self.epoch))?;
        Ok(())
    }
}

// ── Evaluate / Infer ─────────────────────────────────────────────────────

/// Predicts whatever label the tensor encodes, or a fixed prediction.
pub struct Echo {
    fixed: Option<Prediction>,
}

impl Predictor for Echo {
    fn predict(&self, input: &Tensor) -> Result<Prediction, HandlerError> {
        if let Some(p) = &self.fixed {
            return Ok(p.clone());
        }
        Ok(Prediction {
            text: decode(input),
            confidences: vec![0.9; 4],
        })
    }
}

fn require_artifact(path: &Path) -> Result<(), HandlerError> {
    if !path.is_file() {
        return Err(HandlerError::ModelLoad(format!(
            "no artifact at {}",
            path.display()
        )));
    }
    Ok(())
}

pub struct StubEvaluate {
    id: String,
}

impl StubEvaluate {
    pub fn new(id: &str) -> Self {
        Self { id: id.into() }
    }
}

impl Handler for StubEvaluate {
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
}

impl EvaluateHandler for StubEvaluate {
    fn load_model(
        &self,
        path: &Path,
        _ctx: &PipelineContext,
    ) -> Result<Box<dyn Predictor>, HandlerError> {
        require_artifact(path)?;
        Ok(Box::new(Echo { fixed: None }))
    }
}

pub struct StubInfer {
    id: String,
    fixed: Option<Prediction>,
}

impl StubInfer {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.into(),
            fixed: None,
        }
    }

    pub fn returning(mut self, prediction: Prediction) -> Self {
        self.fixed = Some(prediction);
        self
    }
}

impl Handler for StubInfer {
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> &str {
        "2.1.0"
    }
}

impl InferHandler for StubInfer {
    fn load_model(
        &self,
        path: &Path,
        _ctx: &PipelineContext,
    ) -> Result<Arc<dyn Predictor>, HandlerError> {
        require_artifact(path)?;
        Ok(Arc::new(Echo {
            fixed: self.fixed.clone(),
        }))
    }
}
