//! Per-request inference.
//!
//! Handlers and the model are resolved and loaded once, in
//! [`InferenceOrchestrator::from_registry`]. After that every call to
//! [`infer`](InferenceOrchestrator::infer) takes `&self` only, so one
//! orchestrator can be shared across any number of concurrent requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use ocrkit_plugin::{HandlerKind, Predictor, PreprocessHandler};
use ocrkit_types::report::{Dimensions, ImageSize, InferenceRequest, InferenceResponse, Prediction};
use ocrkit_types::{LABEL_LENGTH, PipelineContext, is_valid_label};

use crate::error::PipelineError;
use crate::imaging;
use crate::registry::HandlerRegistry;

/// Decode, preprocess and predict for individual requests.
pub struct InferenceOrchestrator {
    preprocess: Arc<dyn PreprocessHandler>,
    predictor: Arc<dyn Predictor>,
    preprocess_id: String,
    infer_id: String,
    handler_versions: BTreeMap<String, String>,
}

impl std::fmt::Debug for InferenceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceOrchestrator")
            .field("preprocess", &self.preprocess_id)
            .field("infer", &self.infer_id)
            .finish()
    }
}

impl InferenceOrchestrator {
    /// Resolve the preprocess and infer handlers named in `ctx` and load
    /// the model at `ctx.artifact_path()`.
    pub fn from_registry(
        registry: &HandlerRegistry,
        ctx: &PipelineContext,
    ) -> Result<Self, PipelineError> {
        let selection = ctx.handlers();
        let infer_id = selection.infer.as_deref().ok_or(PipelineError::MissingHandler {
            kind: HandlerKind::Infer,
        })?;
        let preprocess = registry.resolve_preprocess(&selection.preprocess)?;
        let infer = registry.resolve_infer(infer_id)?;

        // Report registered ids even when the selection used an alias.
        let preprocess_desc = registry.resolve(&selection.preprocess, HandlerKind::Preprocess)?;
        let infer_desc = registry.resolve(infer_id, HandlerKind::Infer)?;
        let preprocess_id = preprocess_desc.id();
        let infer_id = infer_desc.id();

        let mut handler_versions = BTreeMap::new();
        handler_versions.insert(
            preprocess_id.to_string(),
            preprocess_desc.version().to_string(),
        );
        handler_versions.insert(infer_id.to_string(), infer_desc.version().to_string());

        let model_path = ctx.artifact_path();
        let predictor = infer
            .load_model(model_path, ctx)
            .map_err(|source| PipelineError::ModelLoad {
                path: model_path.to_path_buf(),
                source,
            })?;
        info!(
            preprocess = preprocess_id,
            infer = infer_id,
            model = %model_path.display(),
            "inference pipeline ready"
        );

        Ok(Self {
            preprocess,
            predictor,
            preprocess_id: preprocess_id.to_string(),
            infer_id: infer_id.to_string(),
            handler_versions,
        })
    }

    pub fn preprocess_id(&self) -> &str {
        &self.preprocess_id
    }

    pub fn infer_id(&self) -> &str {
        &self.infer_id
    }

    /// Declared versions of the handlers this pipeline runs, by id.
    pub fn handler_versions(&self) -> &BTreeMap<String, String> {
        &self.handler_versions
    }

    /// Recognize one image.
    pub fn infer(&self, request: &InferenceRequest) -> Result<InferenceResponse, PipelineError> {
        let image = imaging::decode(&request.bytes, request.format.as_deref())?;
        let original = Dimensions::new(image.width(), image.height());

        let processed = self
            .preprocess
            .process(&image)
            .map_err(|e| PipelineError::Preprocess(e.to_string()))?;

        let prediction = self
            .predictor
            .predict(&processed.tensor)
            .map_err(|e| PipelineError::Inference(e.to_string()))?;
        check_prediction(&prediction)?;
        debug!(text = %prediction.text, original = %original, "inference complete");

        Ok(InferenceResponse {
            confidence: prediction.mean_confidence(),
            text: prediction.text,
            confidences: prediction.confidences,
            image_size: ImageSize {
                original,
                processed: processed.dimensions,
            },
            handler_versions: self.handler_versions.clone(),
        })
    }
}

fn check_prediction(prediction: &Prediction) -> Result<(), PipelineError> {
    if !is_valid_label(&prediction.text) {
        return Err(PipelineError::Inference(format!(
            "handler returned '{}', expected {LABEL_LENGTH} lowercase letters",
            prediction.text
        )));
    }
    if prediction.confidences.len() != LABEL_LENGTH {
        return Err(PipelineError::Inference(format!(
            "handler returned {} confidences, expected {LABEL_LENGTH}",
            prediction.confidences.len()
        )));
    }
    if let Some(bad) = prediction
        .confidences
        .iter()
        .find(|c| !c.is_finite() || !(0.0..=1.0).contains(*c))
    {
        return Err(PipelineError::Inference(format!(
            "confidence {bad} is outside [0, 1]"
        )));
    }
    Ok(())
}
