//! Single-pass evaluation of a saved model.

use std::sync::Arc;

use tracing::info;

use ocrkit_plugin::HandlerKind;
use ocrkit_types::PipelineContext;
use ocrkit_types::report::EvaluationReport;

use crate::error::PipelineError;
use crate::metrics;
use crate::registry::HandlerRegistry;

/// Scores a model artifact against a labelled dataset.
///
/// Stateless: each [`run`](Self::run) loads the model and dataset afresh
/// and touches nothing shared.
pub struct EvaluateOrchestrator {
    registry: Arc<HandlerRegistry>,
    keep_details: bool,
}

impl EvaluateOrchestrator {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            keep_details: true,
        }
    }

    /// Whether reports include one [`SampleDetail`](ocrkit_types::report::SampleDetail)
    /// per sample. On by default.
    pub fn with_details(mut self, keep: bool) -> Self {
        self.keep_details = keep;
        self
    }

    pub fn run(&self, ctx: &PipelineContext) -> Result<EvaluationReport, PipelineError> {
        let selection = ctx.handlers();
        let eval_id = selection
            .evaluate
            .as_deref()
            .ok_or(PipelineError::MissingHandler {
                kind: HandlerKind::Evaluate,
            })?;
        let evaluator = self.registry.resolve_evaluate(eval_id)?;
        let preprocess = self.registry.resolve_preprocess(&selection.preprocess)?;
        let root = ctx.dataset_root()?;

        let model_path = ctx.artifact_path();
        let predictor = evaluator
            .load_model(model_path, ctx)
            .map_err(|source| PipelineError::ModelLoad {
                path: model_path.to_path_buf(),
                source,
            })?;

        let dataset = preprocess
            .load_dataset(root, ctx)
            .map_err(|e| PipelineError::DatasetLoad {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;
        if dataset.is_empty() {
            return Err(PipelineError::EmptyDataset {
                path: root.to_path_buf(),
            });
        }

        let report = metrics::score(dataset.samples(), self.keep_details, |input| {
            predictor.predict(input)
        })
        .map_err(|e| PipelineError::handler(eval_id, e))?;

        info!(
            handler = eval_id,
            samples = report.total_samples,
            accuracy = report.accuracy,
            cer = report.cer,
            "evaluation complete"
        );
        Ok(report)
    }
}
