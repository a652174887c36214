//! Handler registry.
//!
//! Stores every registered handler under its `(id, kind)` pair together
//! with its parsed semantic version, and resolves handlers by id for the
//! orchestrators. The registry is built during startup, then frozen
//! behind an [`Arc`] (optionally installed process-wide with
//! [`install`]) before any orchestrator reads it. It is never mutated
//! while a pipeline is running.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use thiserror::Error;
use tracing::{debug, warn};

use ocrkit_plugin::{
    EvaluateHandler, HandlerInfo, HandlerKind, InferHandler, PreprocessHandler, TrainHandler,
};

use crate::CORE_VERSION;

/// Errors raised while registering or resolving handlers.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The same id is already registered for the same kind.
    #[error("handler '{id}' is already registered as a {kind} handler")]
    DuplicateHandler { id: String, kind: HandlerKind },

    /// No handler with this id exists under any kind.
    #[error("no {kind} handler named '{id}' is registered")]
    HandlerNotFound { id: String, kind: HandlerKind },

    /// The id exists, but only under other kinds.
    #[error(
        "handler '{id}' is registered as {}, not as {expected}",
        join_kinds(.registered)
    )]
    HandlerKindMismatch {
        id: String,
        expected: HandlerKind,
        registered: Vec<HandlerKind>,
    },

    /// The handler's declared identity failed validation.
    #[error("invalid handler: {0}")]
    InvalidHandler(String),

    /// The handler requires a different core version.
    #[error("handler '{id}' requires core {requirement}, running {core}")]
    IncompatibleHandler {
        id: String,
        requirement: String,
        core: String,
    },

    /// [`install`] was called more than once.
    #[error("a global handler registry is already installed")]
    AlreadyInstalled,
}

impl RegistryError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateHandler { .. } => "DUPLICATE_HANDLER",
            Self::HandlerNotFound { .. } => "HANDLER_NOT_FOUND",
            Self::HandlerKindMismatch { .. } => "HANDLER_KIND_MISMATCH",
            Self::InvalidHandler(_) => "INVALID_HANDLER",
            Self::IncompatibleHandler { .. } => "INCOMPATIBLE_HANDLER",
            Self::AlreadyInstalled => "REGISTRY_ALREADY_INSTALLED",
        }
    }
}

fn join_kinds(kinds: &[HandlerKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// AnyHandler / HandlerDescriptor
// ---------------------------------------------------------------------------

/// A handler of any kind, tagged with the capability it was registered for.
#[derive(Clone)]
pub enum AnyHandler {
    Preprocess(Arc<dyn PreprocessHandler>),
    Train(Arc<dyn TrainHandler>),
    Evaluate(Arc<dyn EvaluateHandler>),
    Infer(Arc<dyn InferHandler>),
}

impl AnyHandler {
    pub fn preprocess(handler: impl PreprocessHandler + 'static) -> Self {
        Self::Preprocess(Arc::new(handler))
    }

    pub fn train(handler: impl TrainHandler + 'static) -> Self {
        Self::Train(Arc::new(handler))
    }

    pub fn evaluate(handler: impl EvaluateHandler + 'static) -> Self {
        Self::Evaluate(Arc::new(handler))
    }

    pub fn infer(handler: impl InferHandler + 'static) -> Self {
        Self::Infer(Arc::new(handler))
    }

    pub fn kind(&self) -> HandlerKind {
        match self {
            Self::Preprocess(_) => HandlerKind::Preprocess,
            Self::Train(_) => HandlerKind::Train,
            Self::Evaluate(_) => HandlerKind::Evaluate,
            Self::Infer(_) => HandlerKind::Infer,
        }
    }

    /// Identity snapshot of the wrapped handler.
    pub fn info(&self) -> HandlerInfo {
        let kind = self.kind();
        match self {
            Self::Preprocess(h) => HandlerInfo::of(h.as_ref(), kind),
            Self::Train(h) => HandlerInfo::of(h.as_ref(), kind),
            Self::Evaluate(h) => HandlerInfo::of(h.as_ref(), kind),
            Self::Infer(h) => HandlerInfo::of(h.as_ref(), kind),
        }
    }
}

impl std::fmt::Debug for AnyHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let info = self.info();
        f.debug_struct("AnyHandler")
            .field("id", &info.id)
            .field("kind", &info.kind)
            .finish()
    }
}

/// A registered handler plus its validated metadata.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    info: HandlerInfo,
    version: semver::Version,
    handler: AnyHandler,
}

impl HandlerDescriptor {
    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn kind(&self) -> HandlerKind {
        self.info.kind
    }

    pub fn version(&self) -> &semver::Version {
        &self.version
    }

    pub fn info(&self) -> &HandlerInfo {
        &self.info
    }

    pub fn handler(&self) -> &AnyHandler {
        &self.handler
    }
}

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

/// Table of registered handlers keyed by `(id, kind)`.
///
/// Descriptors are kept in insertion order so listings are deterministic.
#[derive(Debug)]
pub struct HandlerRegistry {
    entries: Vec<HandlerDescriptor>,
    index: HashMap<(String, HandlerKind), usize>,
    aliases: HashMap<(String, HandlerKind), usize>,
    core_version: semver::Version,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    /// Create an empty registry checking compatibility against this
    /// crate's version.
    pub fn new() -> Self {
        let core = semver::Version::parse(CORE_VERSION)
            .unwrap_or_else(|_| semver::Version::new(0, 0, 0));
        Self::with_core_version(core)
    }

    /// Create an empty registry that checks handler requirements against
    /// `core_version` instead of the crate version.
    pub fn with_core_version(core_version: semver::Version) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            aliases: HashMap::new(),
            core_version,
        }
    }

    pub fn core_version(&self) -> &semver::Version {
        &self.core_version
    }

    /// Register a handler.
    ///
    /// Fails with [`RegistryError::DuplicateHandler`] if the same id is
    /// already registered for the same kind. The same id may be used for
    /// different kinds. Aliases share the id namespace of their kind, so
    /// an alias that collides with another id or alias is also a duplicate.
    pub fn register(&mut self, handler: AnyHandler) -> Result<(), RegistryError> {
        let descriptor = self.describe(handler)?;
        self.check_names(&descriptor, None)?;
        debug!(
            handler = %descriptor.info.id,
            kind = %descriptor.info.kind,
            version = %descriptor.version,
            "registering handler"
        );
        self.insert_at(self.entries.len(), &descriptor);
        self.entries.push(descriptor);
        Ok(())
    }

    /// Register a handler, replacing any existing one with the same id
    /// and kind. The replacement keeps the original listing position.
    ///
    /// Returns the displaced descriptor, if there was one.
    pub fn register_or_replace(
        &mut self,
        handler: AnyHandler,
    ) -> Result<Option<HandlerDescriptor>, RegistryError> {
        let descriptor = self.describe(handler)?;
        let kind = descriptor.info.kind;
        match self.index.get(&(descriptor.info.id.clone(), kind)).copied() {
            Some(pos) => {
                self.check_names(&descriptor, Some(pos))?;
                warn!(
                    handler = %descriptor.info.id,
                    kind = %kind,
                    old_version = %self.entries[pos].version,
                    new_version = %descriptor.version,
                    "replacing registered handler"
                );
                for alias in &self.entries[pos].info.aliases {
                    self.aliases.remove(&(alias.clone(), kind));
                }
                self.insert_at(pos, &descriptor);
                Ok(Some(std::mem::replace(&mut self.entries[pos], descriptor)))
            }
            None => {
                self.check_names(&descriptor, None)?;
                debug!(handler = %descriptor.info.id, kind = %kind, "registering handler");
                self.insert_at(self.entries.len(), &descriptor);
                self.entries.push(descriptor);
                Ok(None)
            }
        }
    }

    /// Fail if the id or any alias is already taken for this kind by an
    /// entry other than `replacing`.
    fn check_names(
        &self,
        descriptor: &HandlerDescriptor,
        replacing: Option<usize>,
    ) -> Result<(), RegistryError> {
        let kind = descriptor.info.kind;
        let names = std::iter::once(&descriptor.info.id).chain(&descriptor.info.aliases);
        for name in names {
            if let Some(pos) = self.position(name, kind)
                && Some(pos) != replacing
            {
                return Err(RegistryError::DuplicateHandler {
                    id: name.clone(),
                    kind,
                });
            }
        }
        Ok(())
    }

    fn insert_at(&mut self, pos: usize, descriptor: &HandlerDescriptor) {
        let kind = descriptor.info.kind;
        self.index.insert((descriptor.info.id.clone(), kind), pos);
        for alias in &descriptor.info.aliases {
            self.aliases.insert((alias.clone(), kind), pos);
        }
    }

    /// Entry position for an id or alias.
    fn position(&self, name: &str, kind: HandlerKind) -> Option<usize> {
        let key = (name.to_string(), kind);
        self.index
            .get(&key)
            .or_else(|| self.aliases.get(&key))
            .copied()
    }

    fn describe(&self, handler: AnyHandler) -> Result<HandlerDescriptor, RegistryError> {
        let info = handler.info();
        let version = info
            .validate()
            .map_err(|e| RegistryError::InvalidHandler(e.to_string()))?;
        let requirement = info
            .core_requirement()
            .map_err(|e| RegistryError::InvalidHandler(e.to_string()))?;
        if let Some(req) = requirement
            && !req.matches(&self.core_version)
        {
            return Err(RegistryError::IncompatibleHandler {
                id: info.id,
                requirement: req.to_string(),
                core: self.core_version.to_string(),
            });
        }
        Ok(HandlerDescriptor {
            info,
            version,
            handler,
        })
    }

    /// Look up the descriptor registered as `id` (or aliased as `id`) for
    /// `kind`.
    pub fn resolve(&self, id: &str, kind: HandlerKind) -> Result<&HandlerDescriptor, RegistryError> {
        if let Some(pos) = self.position(id, kind) {
            return Ok(&self.entries[pos]);
        }
        let registered = self.kinds_of(id);
        if registered.is_empty() {
            Err(RegistryError::HandlerNotFound {
                id: id.to_string(),
                kind,
            })
        } else {
            Err(RegistryError::HandlerKindMismatch {
                id: id.to_string(),
                expected: kind,
                registered,
            })
        }
    }

    pub fn resolve_preprocess(&self, id: &str) -> Result<Arc<dyn PreprocessHandler>, RegistryError> {
        match self.resolve(id, HandlerKind::Preprocess)?.handler() {
            AnyHandler::Preprocess(h) => Ok(Arc::clone(h)),
            other => Err(self.kind_drift(id, HandlerKind::Preprocess, other)),
        }
    }

    pub fn resolve_train(&self, id: &str) -> Result<Arc<dyn TrainHandler>, RegistryError> {
        match self.resolve(id, HandlerKind::Train)?.handler() {
            AnyHandler::Train(h) => Ok(Arc::clone(h)),
            other => Err(self.kind_drift(id, HandlerKind::Train, other)),
        }
    }

    pub fn resolve_evaluate(&self, id: &str) -> Result<Arc<dyn EvaluateHandler>, RegistryError> {
        match self.resolve(id, HandlerKind::Evaluate)?.handler() {
            AnyHandler::Evaluate(h) => Ok(Arc::clone(h)),
            other => Err(self.kind_drift(id, HandlerKind::Evaluate, other)),
        }
    }

    pub fn resolve_infer(&self, id: &str) -> Result<Arc<dyn InferHandler>, RegistryError> {
        match self.resolve(id, HandlerKind::Infer)?.handler() {
            AnyHandler::Infer(h) => Ok(Arc::clone(h)),
            other => Err(self.kind_drift(id, HandlerKind::Infer, other)),
        }
    }

    // The index key and the stored variant always agree; this only exists
    // so the typed resolvers stay total without panicking.
    fn kind_drift(&self, id: &str, expected: HandlerKind, found: &AnyHandler) -> RegistryError {
        RegistryError::HandlerKindMismatch {
            id: id.to_string(),
            expected,
            registered: vec![found.kind()],
        }
    }

    /// Kinds `id` is registered under (as id or alias), in pipeline order.
    pub fn kinds_of(&self, id: &str) -> Vec<HandlerKind> {
        HandlerKind::ALL
            .into_iter()
            .filter(|k| self.position(id, *k).is_some())
            .collect()
    }

    pub fn contains(&self, id: &str, kind: HandlerKind) -> bool {
        self.position(id, kind).is_some()
    }

    /// The registered id that `name` resolves to for `kind`.
    pub fn canonical_id(&self, name: &str, kind: HandlerKind) -> Option<&str> {
        self.position(name, kind).map(|pos| self.entries[pos].id())
    }

    /// Iterate descriptors in insertion order, optionally filtered by
    /// kind. Each call starts a fresh pass over the current table.
    pub fn list(&self, kind: Option<HandlerKind>) -> impl Iterator<Item = &HandlerDescriptor> + '_ {
        self.entries
            .iter()
            .filter(move |d| kind.is_none_or(|k| d.kind() == k))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Process-wide registry
// ---------------------------------------------------------------------------

static GLOBAL: OnceLock<Arc<HandlerRegistry>> = OnceLock::new();

/// Freeze `registry` and install it as the process-wide registry.
///
/// May be called once; later calls fail with
/// [`RegistryError::AlreadyInstalled`].
pub fn install(registry: HandlerRegistry) -> Result<Arc<HandlerRegistry>, RegistryError> {
    let frozen = Arc::new(registry);
    GLOBAL
        .set(Arc::clone(&frozen))
        .map_err(|_| RegistryError::AlreadyInstalled)?;
    debug!(handlers = frozen.len(), "installed global handler registry");
    Ok(frozen)
}

/// The process-wide registry, if one has been installed.
pub fn global() -> Option<Arc<HandlerRegistry>> {
    GLOBAL.get().cloned()
}
