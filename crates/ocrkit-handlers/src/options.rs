//! Typed access to per-handler options from the pipeline context.

use ocrkit_plugin::HandlerError;
use ocrkit_types::PipelineContext;

/// Read a non-negative finite number option, or `default` when unset.
pub fn f64_option(
    ctx: &PipelineContext,
    handler_id: &str,
    key: &str,
    default: f64,
) -> Result<f64, HandlerError> {
    match ctx.handler_option(handler_id, key) {
        None => Ok(default),
        Some(v) => v
            .as_f64()
            .filter(|x| x.is_finite() && *x >= 0.0)
            .ok_or_else(|| {
                HandlerError::InvalidInput(format!(
                    "{handler_id}.{key} must be a non-negative number, got {v}"
                ))
            }),
    }
}

/// Read an unsigned integer option, or `default` when unset.
pub fn u64_option(
    ctx: &PipelineContext,
    handler_id: &str,
    key: &str,
    default: u64,
) -> Result<u64, HandlerError> {
    match ctx.handler_option(handler_id, key) {
        None => Ok(default),
        Some(v) => v.as_u64().ok_or_else(|| {
            HandlerError::InvalidInput(format!(
                "{handler_id}.{key} must be a non-negative integer, got {v}"
            ))
        }),
    }
}
