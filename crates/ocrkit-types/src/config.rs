//! Configuration schema and the per-invocation [`PipelineContext`].
//!
//! Two layers live here:
//!
//! - [`Config`] -- the optional on-disk JSON file. Every field has a
//!   serde default so an empty object (or a missing file) is valid.
//! - [`PipelineContext`] -- the validated, immutable bundle an
//!   orchestrator receives. Built fresh for every CLI or API invocation
//!   through [`PipelineContext::builder`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Environment variable that overrides config file discovery.
pub const CONFIG_ENV: &str = "OCRKIT_CONFIG";

// ── Root config ──────────────────────────────────────────────────────────

/// Root of the `config.json` file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default training hyperparameters.
    #[serde(default)]
    pub train: Hyperparameters,

    /// Inference service settings.
    #[serde(default)]
    pub serve: ServeConfig,

    /// Default handler identifiers.
    #[serde(default, alias = "handlerSelection")]
    pub handlers: HandlerSelection,

    /// Free-form options keyed by handler id.
    #[serde(default, alias = "handlerOptions")]
    pub handler_options: HashMap<String, serde_json::Value>,
}

impl Config {
    /// Parse a config file from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Resolve which config file to read.
    ///
    /// Order: explicit override, then `$OCRKIT_CONFIG`, then
    /// `~/.ocrkit/config.json`. Returns `None` when no home directory
    /// can be determined and nothing else was given.
    pub fn discover_path(override_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = override_path {
            return Some(p.to_path_buf());
        }
        if let Ok(p) = std::env::var(CONFIG_ENV)
            && !p.is_empty()
        {
            return Some(PathBuf::from(p));
        }
        default_config_path()
    }

    /// Load the discovered config, falling back to defaults when the
    /// file does not exist. An explicit override that is missing is an
    /// error.
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let Some(path) = Self::discover_path(override_path) else {
            return Ok(Self::default());
        };
        if !path.exists() {
            if override_path.is_some() {
                return Err(ConfigError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file not found: {}", path.display()),
                )));
            }
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }
}

#[cfg(feature = "native")]
fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".ocrkit").join("config.json"))
}

#[cfg(not(feature = "native"))]
fn default_config_path() -> Option<PathBuf> {
    None
}

// ── Hyperparameters ──────────────────────────────────────────────────────

/// Training knobs shared by every train handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Number of full passes over the training split.
    #[serde(default = "default_epochs")]
    pub epochs: u32,

    /// Samples per gradient step.
    #[serde(default = "default_batch_size", alias = "batchSize")]
    pub batch_size: usize,

    /// Optimizer step scale.
    #[serde(default = "default_learning_rate", alias = "learningRate")]
    pub learning_rate: f64,

    /// Fraction of the dataset held out for validation, in `[0, 1)`.
    #[serde(default = "default_validation_split", alias = "validationSplit")]
    pub validation_split: f64,

    /// Seed for the train/validation shuffle.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_epochs() -> u32 {
    10
}
fn default_batch_size() -> usize {
    32
}
fn default_learning_rate() -> f64 {
    0.001
}
fn default_validation_split() -> f64 {
    0.2
}
fn default_seed() -> u64 {
    42
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            validation_split: default_validation_split(),
            seed: default_seed(),
        }
    }
}

impl Hyperparameters {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(ConfigError::invalid("epochs", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be at least 1"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigError::invalid(
                "learning_rate",
                format!("must be a positive finite number, got {}", self.learning_rate),
            ));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(ConfigError::invalid(
                "validation_split",
                format!("must be in [0, 1), got {}", self.validation_split),
            ));
        }
        Ok(())
    }
}

// ── Handler selection ────────────────────────────────────────────────────

/// Handler identifiers chosen for one invocation, one per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerSelection {
    #[serde(default = "default_preprocess")]
    pub preprocess: String,
    #[serde(default)]
    pub train: Option<String>,
    #[serde(default)]
    pub evaluate: Option<String>,
    #[serde(default, alias = "ocr")]
    pub infer: Option<String>,
}

fn default_preprocess() -> String {
    "demo_preprocess".into()
}

impl Default for HandlerSelection {
    fn default() -> Self {
        Self {
            preprocess: default_preprocess(),
            train: None,
            evaluate: None,
            infer: None,
        }
    }
}

// ── Serve ────────────────────────────────────────────────────────────────

/// Inference service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServeConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty means permissive.
    #[serde(default, alias = "corsOrigins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

// ── PipelineContext ──────────────────────────────────────────────────────

/// Validated configuration for a single pipeline run.
///
/// Immutable once built; orchestrators only borrow it.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    dataset_root: Option<PathBuf>,
    artifact_path: PathBuf,
    hyper: Hyperparameters,
    handlers: HandlerSelection,
    handler_options: HashMap<String, serde_json::Value>,
}

impl PipelineContext {
    pub fn builder() -> PipelineContextBuilder {
        PipelineContextBuilder::default()
    }

    /// Dataset directory. Required for training and evaluation.
    pub fn dataset_root(&self) -> Result<&Path> {
        self.dataset_root
            .as_deref()
            .ok_or(ConfigError::Missing("dataset_root"))
    }

    /// Where the model artifact is written (train) or read from
    /// (evaluate, infer).
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyper
    }

    pub fn handlers(&self) -> &HandlerSelection {
        &self.handlers
    }

    /// Options object for `handler_id`, if any were configured.
    pub fn handler_options(&self, handler_id: &str) -> Option<&serde_json::Value> {
        self.handler_options.get(handler_id)
    }

    /// A single option for `handler_id`.
    pub fn handler_option(&self, handler_id: &str, key: &str) -> Option<&serde_json::Value> {
        self.handler_options(handler_id)?.get(key)
    }
}

/// Builder for [`PipelineContext`]. Validation runs in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct PipelineContextBuilder {
    dataset_root: Option<PathBuf>,
    artifact_path: Option<PathBuf>,
    hyper: Hyperparameters,
    handlers: HandlerSelection,
    handler_options: HashMap<String, serde_json::Value>,
}

impl PipelineContextBuilder {
    pub fn dataset_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_root = Some(path.into());
        self
    }

    pub fn artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = Some(path.into());
        self
    }

    pub fn hyperparameters(mut self, hyper: Hyperparameters) -> Self {
        self.hyper = hyper;
        self
    }

    pub fn epochs(mut self, epochs: u32) -> Self {
        self.hyper.epochs = epochs;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.hyper.batch_size = batch_size;
        self
    }

    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.hyper.learning_rate = lr;
        self
    }

    pub fn validation_split(mut self, fraction: f64) -> Self {
        self.hyper.validation_split = fraction;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.hyper.seed = seed;
        self
    }

    pub fn handlers(mut self, handlers: HandlerSelection) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn preprocess_handler(mut self, id: impl Into<String>) -> Self {
        self.handlers.preprocess = id.into();
        self
    }

    pub fn train_handler(mut self, id: impl Into<String>) -> Self {
        self.handlers.train = Some(id.into());
        self
    }

    pub fn evaluate_handler(mut self, id: impl Into<String>) -> Self {
        self.handlers.evaluate = Some(id.into());
        self
    }

    pub fn infer_handler(mut self, id: impl Into<String>) -> Self {
        self.handlers.infer = Some(id.into());
        self
    }

    /// Attach an options object for one handler. Replaces any earlier one.
    pub fn handler_options(mut self, handler_id: impl Into<String>, options: serde_json::Value) -> Self {
        self.handler_options.insert(handler_id.into(), options);
        self
    }

    /// Merge options from a [`Config`] without clobbering ones already set.
    pub fn merge_handler_options(mut self, options: &HashMap<String, serde_json::Value>) -> Self {
        for (id, value) in options {
            self.handler_options
                .entry(id.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<PipelineContext> {
        let artifact_path = self
            .artifact_path
            .ok_or(ConfigError::Missing("artifact_path"))?;
        if artifact_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("artifact_path", "must not be empty"));
        }
        self.hyper.validate()?;
        if self.handlers.preprocess.trim().is_empty() {
            return Err(ConfigError::invalid("preprocess handler", "must not be empty"));
        }
        for (id, value) in &self.handler_options {
            if !value.is_object() {
                return Err(ConfigError::invalid(
                    "handler_options",
                    format!("options for '{id}' must be a JSON object"),
                ));
            }
        }
        Ok(PipelineContext {
            dataset_root: self.dataset_root,
            artifact_path,
            hyper: self.hyper,
            handlers: self.handlers,
            handler_options: self.handler_options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PipelineContextBuilder {
        PipelineContext::builder()
            .dataset_root("/data")
            .artifact_path("/tmp/model.json")
    }

    #[test]
    fn defaults_are_valid() {
        let ctx = base().build().unwrap();
        assert_eq!(ctx.hyperparameters(), &Hyperparameters::default());
        assert_eq!(ctx.handlers().preprocess, "demo_preprocess");
        assert_eq!(ctx.dataset_root().unwrap(), Path::new("/data"));
    }

    #[test]
    fn zero_epochs_rejected() {
        let err = base().epochs(0).build().unwrap_err();
        assert!(err.to_string().contains("epochs"));
    }

    #[test]
    fn zero_batch_rejected() {
        let err = base().batch_size(0).build().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn bad_learning_rate_rejected() {
        assert!(base().learning_rate(0.0).build().is_err());
        assert!(base().learning_rate(-1.0).build().is_err());
        assert!(base().learning_rate(f64::NAN).build().is_err());
    }

    #[test]
    fn validation_split_range() {
        assert!(base().validation_split(0.0).build().is_ok());
        assert!(base().validation_split(0.99).build().is_ok());
        assert!(base().validation_split(1.0).build().is_err());
        assert!(base().validation_split(-0.1).build().is_err());
    }

    #[test]
    fn artifact_path_required() {
        let err = PipelineContext::builder().build().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("artifact_path")));
    }

    #[test]
    fn dataset_root_optional_until_needed() {
        let ctx = PipelineContext::builder()
            .artifact_path("m.json")
            .build()
            .unwrap();
        assert!(matches!(
            ctx.dataset_root(),
            Err(ConfigError::Missing("dataset_root"))
        ));
    }

    #[test]
    fn handler_options_must_be_objects() {
        let err = base()
            .handler_options("linear_train", serde_json::json!(3))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("linear_train"));

        let ctx = base()
            .handler_options("linear_train", serde_json::json!({"weight_decay": 0.01}))
            .build()
            .unwrap();
        assert_eq!(
            ctx.handler_option("linear_train", "weight_decay"),
            Some(&serde_json::json!(0.01))
        );
        assert!(ctx.handler_option("linear_train", "missing").is_none());
    }

    #[test]
    fn merge_keeps_explicit_options() {
        let mut file = HashMap::new();
        file.insert("a".to_string(), serde_json::json!({"x": 1}));
        file.insert("b".to_string(), serde_json::json!({"y": 2}));
        let ctx = base()
            .handler_options("a", serde_json::json!({"x": 9}))
            .merge_handler_options(&file)
            .build()
            .unwrap();
        assert_eq!(ctx.handler_option("a", "x"), Some(&serde_json::json!(9)));
        assert_eq!(ctx.handler_option("b", "y"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn config_from_empty_object() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.train.epochs, 10);
        assert_eq!(cfg.serve.port, 8000);
        assert_eq!(cfg.serve.host, "127.0.0.1");
        assert!(cfg.handler_options.is_empty());
    }

    #[test]
    fn config_accepts_camel_case_aliases() {
        let cfg: Config = serde_json::from_str(
            r#"{"train": {"batchSize": 8, "learningRate": 0.5}, "serve": {"corsOrigins": ["http://x"]}}"#,
        )
        .unwrap();
        assert_eq!(cfg.train.batch_size, 8);
        assert_eq!(cfg.train.learning_rate, 0.5);
        assert_eq!(cfg.serve.cors_origins, vec!["http://x".to_string()]);
    }

    #[test]
    fn handlers_select_ids_and_handler_options_hold_objects() {
        let cfg: Config = serde_json::from_str(
            r#"{
                "handlers": {"train": "linear_train", "ocr": "linear_ocr"},
                "handler_options": {"linear_train": {"weight_decay": 0.01}}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.handlers.preprocess, "demo_preprocess");
        assert_eq!(cfg.handlers.train.as_deref(), Some("linear_train"));
        assert_eq!(cfg.handlers.infer.as_deref(), Some("linear_ocr"));
        assert_eq!(
            cfg.handler_options["linear_train"],
            serde_json::json!({"weight_decay": 0.01})
        );

        // Option objects under `handlers` are not a selection.
        let nested = serde_json::from_str::<Config>(
            r#"{"handlers": {"linear_train": {"weight_decay": 0.01}}}"#,
        );
        assert!(nested.map(|c| c.handlers.train.is_none()).unwrap_or(true));
    }

    #[test]
    fn load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"train": {"epochs": 3}}"#).unwrap();
        let cfg = Config::load(Some(&path)).unwrap();
        assert_eq!(cfg.train.epochs, 3);
        assert_eq!(cfg.train.batch_size, 32);
    }
}
