//! Pipeline orchestrators.
//!
//! | Orchestrator | Drives |
//! |--------------|--------|
//! | [`TrainOrchestrator`] | dataset load, epoch loop, validation, best-only checkpointing |
//! | [`EvaluateOrchestrator`] | one pass over a dataset with a saved model |
//! | [`InferenceOrchestrator`] | per-request decode, preprocess and predict |
//!
//! Each one resolves its handlers from a [`HandlerRegistry`](crate::registry::HandlerRegistry)
//! using the ids in the [`PipelineContext`](ocrkit_types::PipelineContext)
//! and never needs to know what model is behind them.

pub mod evaluate;
pub mod infer;
pub mod train;

pub use evaluate::EvaluateOrchestrator;
pub use infer::InferenceOrchestrator;
pub use train::{TracingObserver, TrainOrchestrator, TrainState, TrainingObserver, TrainingRun};
