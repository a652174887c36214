//! # ocrkit-types
//!
//! Core type definitions for the ocrkit CAPTCHA OCR pipeline framework.
//!
//! This crate is the foundation of the dependency graph -- every other
//! ocrkit crate depends on it. It contains:
//!
//! - **[`error`]** -- [`ConfigError`] for configuration validation
//! - **[`config`]** -- [`PipelineContext`], hyperparameters and the
//!   on-disk config file schema
//! - **[`sample`]** -- labels, tensors, samples and datasets
//! - **[`report`]** -- predictions, inference request/response and the
//!   training / evaluation reports

pub mod config;
pub mod error;
pub mod report;
pub mod sample;

pub use config::{HandlerSelection, Hyperparameters, PipelineContext};
pub use error::{ConfigError, Result};
pub use sample::{CHARSET, Dataset, LABEL_LENGTH, Sample, Tensor, is_valid_label};
