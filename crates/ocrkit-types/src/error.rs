//! Configuration error types.

use thiserror::Error;

/// Errors produced while building or loading configuration.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// A hyperparameter or context field failed validation.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A required field was never set on the builder.
    #[error("missing required field: {0}")]
    Missing(&'static str),

    /// A config file could not be read.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A config file was not valid JSON for the schema.
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
