//! Handler implementations for ocrkit.
//!
//! Provides two complete, interchangeable handler families that
//! implement the contracts from `ocrkit-plugin`.
//!
//! # Families
//!
//! - **Demo** ([`demo`]): `demo_preprocess`, `demo_train`, `demo_evaluate`,
//!   `demo_ocr`. Learns label statistics only; useful for wiring checks.
//! - **Linear** ([`linear`]): `linear_preprocess`, `linear_train`,
//!   `linear_evaluate`, `linear_ocr`. Per-position softmax regression
//!   trained with mini-batch SGD.
//!
//! Both persist a JSON artifact and reuse the shared dataset loader in
//! `ocrkit_core::dataset`.

#[cfg(feature = "demo")]
pub mod demo;
#[cfg(feature = "linear")]
pub mod linear;
pub mod options;

use ocrkit_core::registry::{AnyHandler, HandlerRegistry, RegistryError};

/// Core versions the bundled handlers are built against.
pub const CORE_REQUIREMENT: &str = "^0.1";

/// Register every bundled handler with `registry`.
///
/// Fails if any id is already registered for the same kind, so call it
/// on a fresh registry or before registering same-named custom handlers.
pub fn register_all(registry: &mut HandlerRegistry) -> Result<(), RegistryError> {
    #[cfg(feature = "demo")]
    {
        registry.register(AnyHandler::preprocess(demo::DemoPreprocess))?;
        registry.register(AnyHandler::train(demo::DemoTrain))?;
        registry.register(AnyHandler::evaluate(demo::DemoEvaluate))?;
        registry.register(AnyHandler::infer(demo::DemoOcr))?;
    }

    #[cfg(feature = "linear")]
    {
        registry.register(AnyHandler::preprocess(linear::LinearPreprocess))?;
        registry.register(AnyHandler::train(linear::LinearTrain))?;
        registry.register(AnyHandler::evaluate(linear::LinearEvaluate))?;
        registry.register(AnyHandler::infer(linear::LinearOcr))?;
    }

    Ok(())
}

/// A fresh registry holding every bundled handler.
pub fn default_registry() -> Result<HandlerRegistry, RegistryError> {
    let mut registry = HandlerRegistry::new();
    register_all(&mut registry)?;
    Ok(registry)
}
