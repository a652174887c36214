//! Training orchestration.
//!
//! A run moves through
//! `Initialized -> DatasetLoaded -> Training(1..=N) -> Finalized`, or to
//! `Aborted` from any non-terminal state. Each epoch trains once over the
//! training split, scores the validation split, and persists the model
//! only when validation accuracy strictly improves. Checkpoints are
//! written beside the target and renamed into place, so a failed or
//! diverged run never damages the best artifact already on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use ocrkit_plugin::{HandlerKind, PreprocessHandler, TrainHandler, TrainSession};
use ocrkit_types::report::{EpochReport, TrainingSummary};
use ocrkit_types::{PipelineContext, Sample};

use crate::CORE_VERSION;
use crate::error::PipelineError;
use crate::metrics;
use crate::registry::HandlerRegistry;

// ── State ────────────────────────────────────────────────────────────────

/// Where a training run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainState {
    Initialized,
    DatasetLoaded { samples: usize },
    Training { epoch: u32 },
    Finalized,
    Aborted,
}

impl TrainState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Aborted)
    }
}

/// Mutable bookkeeping for one training invocation.
///
/// Owned by the orchestrator for the duration of [`TrainOrchestrator::run_with`];
/// observers only ever see it by shared reference.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    state: TrainState,
    handler_id: String,
    handler_version: String,
    epochs: u32,
    epoch: u32,
    last_loss: Option<f64>,
    best_accuracy: Option<f64>,
    best_cer: Option<f64>,
    best_epoch: Option<u32>,
    artifact_path: PathBuf,
    checkpoint_path: Option<PathBuf>,
    train_samples: usize,
    validation_samples: usize,
    history: Vec<EpochReport>,
}

impl TrainingRun {
    fn new(handler_id: &str, handler_version: String, epochs: u32, artifact_path: &Path) -> Self {
        Self {
            state: TrainState::Initialized,
            handler_id: handler_id.to_string(),
            handler_version,
            epochs,
            epoch: 0,
            last_loss: None,
            best_accuracy: None,
            best_cer: None,
            best_epoch: None,
            artifact_path: artifact_path.to_path_buf(),
            checkpoint_path: None,
            train_samples: 0,
            validation_samples: 0,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> TrainState {
        self.state
    }
    pub fn handler_id(&self) -> &str {
        &self.handler_id
    }
    pub fn handler_version(&self) -> &str {
        &self.handler_version
    }
    pub fn epochs(&self) -> u32 {
        self.epochs
    }
    /// Current (or last completed) 1-based epoch; `0` before training.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }
    pub fn last_loss(&self) -> Option<f64> {
        self.last_loss
    }
    pub fn best_accuracy(&self) -> Option<f64> {
        self.best_accuracy
    }
    pub fn best_cer(&self) -> Option<f64> {
        self.best_cer
    }
    pub fn best_epoch(&self) -> Option<u32> {
        self.best_epoch
    }
    /// Path of the best checkpoint written so far.
    pub fn checkpoint_path(&self) -> Option<&Path> {
        self.checkpoint_path.as_deref()
    }
    pub fn history(&self) -> &[EpochReport] {
        &self.history
    }

    fn transition(&mut self, next: TrainState, observer: &mut dyn TrainingObserver) {
        debug!(from = ?self.state, to = ?next, "training state change");
        self.state = next;
        observer.on_state(self);
    }

    fn summary(&self) -> TrainingSummary {
        TrainingSummary {
            handler: self.handler_id.clone(),
            handler_version: self.handler_version.clone(),
            epochs_completed: self.history.len() as u32,
            best_epoch: self.best_epoch,
            best_accuracy: self.best_accuracy.unwrap_or(0.0),
            best_cer: self.best_cer.unwrap_or(1.0),
            final_loss: self.last_loss.unwrap_or(f64::NAN),
            artifact_path: self.checkpoint_path.clone(),
            train_samples: self.train_samples,
            validation_samples: self.validation_samples,
            history: self.history.clone(),
        }
    }
}

// ── Observers ────────────────────────────────────────────────────────────

/// Receives progress from a training run as it happens.
pub trait TrainingObserver {
    /// Called after every state transition.
    fn on_state(&mut self, _run: &TrainingRun) {}

    /// Called once per completed epoch, after any checkpoint.
    fn on_epoch(&mut self, _report: &EpochReport, _run: &TrainingRun) {}
}

/// Emits one `info` line per epoch through `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl TrainingObserver for TracingObserver {
    fn on_state(&mut self, run: &TrainingRun) {
        match run.state() {
            TrainState::DatasetLoaded { samples } => {
                info!(handler = %run.handler_id(), samples, "dataset loaded");
            }
            TrainState::Aborted => {
                warn!(handler = %run.handler_id(), epoch = run.epoch(), "training aborted");
            }
            TrainState::Finalized => {
                info!(
                    handler = %run.handler_id(),
                    best_epoch = ?run.best_epoch(),
                    best_accuracy = run.best_accuracy().unwrap_or(0.0),
                    "training finished"
                );
            }
            _ => {}
        }
    }

    fn on_epoch(&mut self, report: &EpochReport, run: &TrainingRun) {
        info!(
            core_version = CORE_VERSION,
            handler = %run.handler_id(),
            handler_version = %run.handler_version(),
            epoch = report.epoch,
            epochs = report.epochs,
            loss = report.loss,
            val_accuracy = report.val_accuracy,
            val_cer = report.val_cer,
            checkpoint = report.checkpointed,
            "epoch {}/{} complete",
            report.epoch,
            report.epochs
        );
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────

/// Drives a complete training run through the registered handlers.
pub struct TrainOrchestrator {
    registry: Arc<HandlerRegistry>,
}

impl TrainOrchestrator {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Train with per-epoch `tracing` output.
    pub fn run(&self, ctx: &PipelineContext) -> Result<TrainingSummary, PipelineError> {
        self.run_with(ctx, &mut TracingObserver)
    }

    /// Train, reporting progress to `observer`.
    pub fn run_with(
        &self,
        ctx: &PipelineContext,
        observer: &mut dyn TrainingObserver,
    ) -> Result<TrainingSummary, PipelineError> {
        let selection = ctx.handlers();
        let train_id = selection.train.as_deref().ok_or(PipelineError::MissingHandler {
            kind: HandlerKind::Train,
        })?;
        let preprocess = self.registry.resolve_preprocess(&selection.preprocess)?;
        let trainer = self.registry.resolve_train(train_id)?;
        let descriptor = self.registry.resolve(train_id, HandlerKind::Train)?;
        let root = ctx.dataset_root()?;

        let mut run = TrainingRun::new(
            descriptor.id(),
            descriptor.version().to_string(),
            ctx.hyperparameters().epochs,
            ctx.artifact_path(),
        );
        observer.on_state(&run);

        match drive(ctx, root, preprocess.as_ref(), trainer.as_ref(), &mut run, observer) {
            Ok(()) => {
                run.transition(TrainState::Finalized, observer);
                Ok(run.summary())
            }
            Err(err) => {
                run.transition(TrainState::Aborted, observer);
                Err(err)
            }
        }
    }
}

fn drive(
    ctx: &PipelineContext,
    root: &Path,
    preprocess: &dyn PreprocessHandler,
    trainer: &dyn TrainHandler,
    run: &mut TrainingRun,
    observer: &mut dyn TrainingObserver,
) -> Result<(), PipelineError> {
    let dataset = preprocess
        .load_dataset(root, ctx)
        .map_err(|e| PipelineError::DatasetLoad {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
    if dataset.is_empty() {
        return Err(PipelineError::DatasetLoad {
            path: root.to_path_buf(),
            reason: "no labelled images found".into(),
        });
    }
    run.transition(
        TrainState::DatasetLoaded {
            samples: dataset.len(),
        },
        observer,
    );

    let train_id = run.handler_id.clone();
    let mut session = trainer
        .start(ctx, &dataset)
        .map_err(|e| PipelineError::handler(&train_id, e))?;

    let hyper = ctx.hyperparameters();
    let (train, held_out) = dataset.split(hyper.validation_split, hyper.seed);
    let validation: &[Sample] = if held_out.is_empty() {
        debug!("no held-out samples, validating on the training split");
        &train
    } else {
        &held_out
    };
    run.train_samples = train.len();
    run.validation_samples = held_out.len();

    for epoch in 1..=hyper.epochs {
        run.epoch = epoch;
        run.transition(TrainState::Training { epoch }, observer);

        let loss = session
            .train_epoch(epoch, &train)
            .map_err(|e| PipelineError::handler(&train_id, e))?;
        run.last_loss = Some(loss);
        if !loss.is_finite() {
            return Err(PipelineError::TrainingDiverged { epoch, loss });
        }

        let scored = metrics::score(validation, false, |input| session.predict(input))
            .map_err(|e| PipelineError::handler(&train_id, e))?;

        let improved = run.best_accuracy.is_none_or(|best| scored.accuracy > best);
        if improved {
            checkpoint(session.as_ref(), &run.artifact_path)?;
            run.best_accuracy = Some(scored.accuracy);
            run.best_cer = Some(scored.cer);
            run.best_epoch = Some(epoch);
            run.checkpoint_path = Some(run.artifact_path.clone());
        }

        let report = EpochReport {
            epoch,
            epochs: hyper.epochs,
            loss,
            val_accuracy: scored.accuracy,
            val_cer: scored.cer,
            checkpointed: improved,
        };
        run.history.push(report.clone());
        observer.on_epoch(&report, run);
    }
    Ok(())
}

/// Sibling path a checkpoint is staged at before the rename.
pub fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn checkpoint(session: &dyn TrainSession, target: &Path) -> Result<(), PipelineError> {
    let fail = |reason: String| PipelineError::Checkpoint {
        path: target.to_path_buf(),
        reason,
    };

    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
    }

    let staged = staging_path(target);
    if let Err(e) = session.save(&staged) {
        let _ = std::fs::remove_file(&staged);
        return Err(fail(e.to_string()));
    }
    std::fs::rename(&staged, target).map_err(|e| fail(e.to_string()))?;
    debug!(path = %target.display(), "checkpoint written");
    Ok(())
}
