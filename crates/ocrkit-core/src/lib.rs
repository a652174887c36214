//! Core engine for ocrkit.
//!
//! Owns the [`HandlerRegistry`](registry::HandlerRegistry) and the three
//! orchestrators that drive handlers through a fixed contract:
//!
//! - [`pipeline::TrainOrchestrator`] -- epoch loop with best-only checkpointing
//! - [`pipeline::EvaluateOrchestrator`] -- accuracy / CER over a dataset
//! - [`pipeline::InferenceOrchestrator`] -- per-request recognition
//!
//! Supporting modules provide shared scoring ([`metrics`]), image
//! decoding ([`imaging`]), labelled-directory loading ([`dataset`]) and a
//! synthetic CAPTCHA renderer ([`synth`]).

pub mod dataset;
pub mod error;
pub mod imaging;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod synth;

#[cfg(test)]
pub(crate) mod testing;

pub use error::PipelineError;
pub use registry::{AnyHandler, HandlerDescriptor, HandlerRegistry, RegistryError};

/// Version of the orchestration core, reported in logs and API responses
/// and checked against each handler's core requirement.
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");
