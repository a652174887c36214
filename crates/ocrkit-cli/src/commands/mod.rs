//! CLI command implementations for `ocrkit`.
//!
//! Each subcommand is implemented in its own module:
//!
//! - [`train`] / [`evaluate`] / [`api`] -- drive the core orchestrators.
//! - [`init`] / [`create_handler`] -- write handler sources and scripts.
//! - [`handlers_cmd`] -- registry listing.
//! - [`generate`] -- synthetic data.

pub mod api;
pub mod create_handler;
pub mod evaluate;
pub mod generate;
pub mod handlers_cmd;
pub mod init;
mod scaffold;
pub mod train;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use ocrkit_core::registry::{self, HandlerRegistry, RegistryError};
use ocrkit_core::PipelineError;
use ocrkit_plugin::HandlerKind;
use ocrkit_types::ConfigError;
use ocrkit_types::config::Config;

/// Load configuration from the given path override or via auto-discovery.
///
/// Discovery order: `--config`, then `OCRKIT_CONFIG`, then
/// `~/.ocrkit/config.json`. Returns defaults when no file is found.
pub fn load_config(config_override: Option<&Path>) -> anyhow::Result<Config> {
    Config::load(config_override).context("failed to load config")
}

/// Build the registry of bundled handlers and install it process-wide.
pub fn build_registry() -> anyhow::Result<Arc<HandlerRegistry>> {
    if let Some(existing) = registry::global() {
        return Ok(existing);
    }
    let reg = ocrkit_handlers::default_registry()?;
    Ok(registry::install(reg)?)
}

/// Stable code for the error line printed on failure.
pub fn error_code(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<PipelineError>() {
            return e.code();
        }
        if let Some(e) = cause.downcast_ref::<RegistryError>() {
            return e.code();
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return "CONFIG_ERROR";
        }
    }
    "ERROR"
}

/// Format a top-level failure as `error[CODE]: message`.
pub fn render_error(err: &anyhow::Error) -> String {
    format!("error[{}]: {err:#}", error_code(err))
}

/// Map an alias such as `DemoTrainHandler` to its registered id. Unknown
/// names pass through unchanged so resolution reports them.
pub fn canonical_id(registry: &HandlerRegistry, name: String, kind: HandlerKind) -> String {
    match registry.canonical_id(&name, kind) {
        Some(id) => id.to_string(),
        None => name,
    }
}

/// Pick the preprocess handler for a run.
///
/// An explicit flag wins. Otherwise a non-default configured id is used,
/// then the `<family>_preprocess` sibling of `stage_id` when registered,
/// then the configured default.
pub fn pick_preprocess(
    flag: Option<&str>,
    configured: &str,
    stage_id: &str,
    registry: &HandlerRegistry,
) -> String {
    if let Some(id) = flag {
        return id.to_string();
    }
    let default_id = ocrkit_types::HandlerSelection::default().preprocess;
    if configured != default_id {
        return configured.to_string();
    }
    if let Some((family, _)) = stage_id.rsplit_once('_') {
        let sibling = format!("{family}_preprocess");
        if registry.contains(&sibling, HandlerKind::Preprocess) {
            return sibling;
        }
    }
    configured.to_string()
}

/// Parse `--handler-config id=path` arguments into option objects.
pub fn read_handler_configs(
    entries: &[String],
) -> anyhow::Result<HashMap<String, serde_json::Value>> {
    let mut out = HashMap::new();
    for entry in entries {
        let (id, path) = entry
            .split_once('=')
            .filter(|(id, path)| !id.is_empty() && !path.is_empty())
            .with_context(|| format!("expected --handler-config <id>=<path>, got '{entry}'"))?;
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read handler config {path}"))?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse handler config {path}"))?;
        if !value.is_object() {
            anyhow::bail!("handler config {path} must contain a JSON object");
        }
        out.insert(id.to_string(), value);
    }
    Ok(out)
}
