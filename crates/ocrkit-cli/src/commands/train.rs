//! `ocrkit train` -- train a model with the selected handlers.

use std::path::{Path, PathBuf};

use clap::Args;

use ocrkit_core::pipeline::TrainOrchestrator;
use ocrkit_plugin::HandlerKind;
use ocrkit_types::PipelineContext;
use ocrkit_types::report::TrainingSummary;

use super::{build_registry, canonical_id, load_config, pick_preprocess, read_handler_configs};

/// Default training handler when neither flag nor config names one.
pub const DEFAULT_TRAIN_HANDLER: &str = "demo_train";

/// Arguments for the `ocrkit train` subcommand.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory of labelled images (`<label>_<n>.png`).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where to write the trained model.
    #[arg(short, long, default_value = "model.json")]
    pub output: PathBuf,

    /// Training handler id.
    #[arg(long)]
    pub handler: Option<String>,

    /// Preprocess handler id (defaults to the training handler's family).
    #[arg(long)]
    pub preprocess_handler: Option<String>,

    #[arg(long)]
    pub epochs: Option<u32>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Fraction of samples held out for validation, in [0, 1).
    #[arg(long)]
    pub validation_split: Option<f64>,

    /// Seed for the train/validation shuffle.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Extra handler options as `<handler_id>=<path to JSON object>`.
    #[arg(long = "handler-config", value_name = "ID=PATH")]
    pub handler_config: Vec<String>,
}

/// Run the train subcommand.
pub async fn run(args: TrainArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let cfg = load_config(config_path)?;
    let registry = build_registry()?;

    let train_id = canonical_id(
        &registry,
        args.handler
            .or(cfg.handlers.train.clone())
            .unwrap_or_else(|| DEFAULT_TRAIN_HANDLER.to_string()),
        HandlerKind::Train,
    );
    let preprocess_id = pick_preprocess(
        args.preprocess_handler.as_deref(),
        &cfg.handlers.preprocess,
        &train_id,
        &registry,
    );

    let mut hyper = cfg.train.clone();
    if let Some(v) = args.epochs {
        hyper.epochs = v;
    }
    if let Some(v) = args.batch_size {
        hyper.batch_size = v;
    }
    if let Some(v) = args.learning_rate {
        hyper.learning_rate = v;
    }
    if let Some(v) = args.validation_split {
        hyper.validation_split = v;
    }
    if let Some(v) = args.seed {
        hyper.seed = v;
    }

    let mut builder = PipelineContext::builder()
        .dataset_root(&args.input)
        .artifact_path(&args.output)
        .hyperparameters(hyper)
        .handlers(cfg.handlers.clone())
        .preprocess_handler(&preprocess_id)
        .train_handler(&train_id)
        .merge_handler_options(&cfg.handler_options);
    for (id, options) in read_handler_configs(&args.handler_config)? {
        builder = builder.handler_options(id, options);
    }
    let ctx = builder.build()?;

    tracing::info!(
        handler = %train_id,
        preprocess = %preprocess_id,
        input = %args.input.display(),
        "starting training"
    );
    let orchestrator = TrainOrchestrator::new(registry);
    let summary = tokio::task::spawn_blocking(move || orchestrator.run(&ctx)).await??;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &TrainingSummary) {
    println!(
        "Training complete: {} v{} ({} train / {} validation samples)",
        summary.handler,
        summary.handler_version,
        summary.train_samples,
        summary.validation_samples
    );
    for epoch in &summary.history {
        println!(
            "  epoch {}/{}  loss {:.4}  val_accuracy {:.3}  val_cer {:.3}{}",
            epoch.epoch,
            epoch.epochs,
            epoch.loss,
            epoch.val_accuracy,
            epoch.val_cer,
            if epoch.checkpointed { "  [saved]" } else { "" }
        );
    }
    if let Some(best) = summary.best_epoch {
        println!(
            "Best epoch {best}: accuracy {:.3}, CER {:.3}",
            summary.best_accuracy, summary.best_cer
        );
    }
    if let Some(path) = &summary.artifact_path {
        println!("Model saved to {}", path.display());
    }
}
