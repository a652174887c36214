//! Handler trait definitions for ocrkit.
//!
//! This crate defines the contracts a CAPTCHA OCR handler must satisfy
//! to be plugged into the ocrkit pipeline. The orchestration core in
//! `ocrkit-core` drives handlers exclusively through these traits.
//!
//! # Trait Overview
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Handler`] | Identity: id, semantic version, core requirement |
//! | [`PreprocessHandler`] | Dataset loading and image-to-tensor conversion |
//! | [`TrainHandler`] | Starts a [`TrainSession`] for one training run |
//! | [`EvaluateHandler`] | Loads a model artifact for offline evaluation |
//! | [`InferHandler`] | Loads a model artifact for serving |
//!
//! # Supporting Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`TrainSession`] | Per-run mutable model: epochs, validation predictions, save |
//! | [`Predictor`] | Read-only prediction over a loaded model |

pub mod error;
pub mod info;
pub mod traits;

pub use error::HandlerError;
pub use info::HandlerInfo;
pub use traits::{
    EvaluateHandler, Handler, HandlerKind, InferHandler, Predictor, PreprocessHandler,
    ProcessedImage, TrainHandler, TrainSession,
};
