//! Serializable handler metadata.
//!
//! [`HandlerInfo`] is the plain-data view of a handler's identity: what
//! the registry validates on registration and what `ocrkit handlers` and
//! `/api/v1/handlers/info` print.

use serde::{Deserialize, Serialize};

use crate::error::HandlerError;
use crate::traits::{Handler, HandlerKind};

/// Identity and version metadata for one registered handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerInfo {
    pub id: String,
    pub kind: HandlerKind,
    /// Declared semantic version.
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Semver requirement on the core, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_requirement: Option<String>,
    /// Alternative names accepted by registry lookups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl HandlerInfo {
    /// Snapshot the identity of `handler` registered under `kind`.
    pub fn of<H: Handler + ?Sized>(handler: &H, kind: HandlerKind) -> Self {
        Self {
            id: handler.id().to_string(),
            kind,
            version: handler.version().to_string(),
            description: handler.description().to_string(),
            core_requirement: handler.core_requirement().map(str::to_string),
            aliases: handler.aliases().iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Check the id is usable and the version parses as semver.
    pub fn validate(&self) -> Result<semver::Version, HandlerError> {
        if self.id.trim().is_empty() {
            return Err(HandlerError::InvalidInput("handler id is required".into()));
        }
        if self.id.chars().any(char::is_whitespace) {
            return Err(HandlerError::InvalidInput(format!(
                "handler id '{}' must not contain whitespace",
                self.id
            )));
        }
        if let Some(bad) = self
            .aliases
            .iter()
            .find(|a| a.trim().is_empty() || a.chars().any(char::is_whitespace))
        {
            return Err(HandlerError::InvalidInput(format!(
                "handler '{}': invalid alias '{bad}'",
                self.id
            )));
        }
        semver::Version::parse(&self.version).map_err(|e| {
            HandlerError::InvalidInput(format!(
                "handler '{}': invalid semver version '{}': {e}",
                self.id, self.version
            ))
        })
    }

    /// Parse the declared core requirement, if any.
    pub fn core_requirement(&self) -> Result<Option<semver::VersionReq>, HandlerError> {
        self.core_requirement
            .as_deref()
            .map(|req| {
                semver::VersionReq::parse(req).map_err(|e| {
                    HandlerError::InvalidInput(format!(
                        "handler '{}': invalid core requirement '{req}': {e}",
                        self.id
                    ))
                })
            })
            .transpose()
    }
}
