//! `ocrkit evaluate` -- score a saved model against a labelled directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use comfy_table::{Table, presets};

use ocrkit_core::pipeline::EvaluateOrchestrator;
use ocrkit_plugin::HandlerKind;
use ocrkit_types::PipelineContext;
use ocrkit_types::report::EvaluationReport;

use super::{build_registry, canonical_id, load_config, pick_preprocess};

pub const DEFAULT_EVALUATE_HANDLER: &str = "demo_evaluate";

/// Most misrecognized samples listed after the summary.
const MISTAKES_SHOWN: usize = 10;

/// Arguments for the `ocrkit evaluate` subcommand.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Directory of labelled images to evaluate on.
    #[arg(short, long)]
    pub target: PathBuf,

    /// Model file produced by `ocrkit train`.
    #[arg(short, long, default_value = "model.json")]
    pub model: PathBuf,

    /// Evaluate handler id.
    #[arg(long)]
    pub handler: Option<String>,

    /// Preprocess handler id (defaults to the evaluate handler's family).
    #[arg(long)]
    pub preprocess_handler: Option<String>,

    /// Also write the full report as JSON to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Run the evaluate subcommand.
pub async fn run(args: EvaluateArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let cfg = load_config(config_path)?;
    let registry = build_registry()?;

    let eval_id = canonical_id(
        &registry,
        args.handler
            .or(cfg.handlers.evaluate.clone())
            .unwrap_or_else(|| DEFAULT_EVALUATE_HANDLER.to_string()),
        HandlerKind::Evaluate,
    );
    let preprocess_id = pick_preprocess(
        args.preprocess_handler.as_deref(),
        &cfg.handlers.preprocess,
        &eval_id,
        &registry,
    );

    let ctx = PipelineContext::builder()
        .dataset_root(&args.target)
        .artifact_path(&args.model)
        .hyperparameters(cfg.train.clone())
        .handlers(cfg.handlers.clone())
        .preprocess_handler(&preprocess_id)
        .evaluate_handler(&eval_id)
        .merge_handler_options(&cfg.handler_options)
        .build()?;

    let orchestrator = EvaluateOrchestrator::new(registry);
    let report = tokio::task::spawn_blocking(move || orchestrator.run(&ctx)).await??;

    // Results are program output and go to stdout; logs and errors use stderr.
    print!("{}", render_report(&report));

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn summary_table(report: &EvaluationReport) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec!["METRIC", "VALUE"]);
    table.add_row(vec!["Total samples".to_string(), report.total_samples.to_string()]);
    table.add_row(vec![
        "Correct predictions".to_string(),
        report.correct_predictions.to_string(),
    ]);
    table.add_row(vec![
        "Accuracy".to_string(),
        format!("{:.2}%", report.accuracy * 100.0),
    ]);
    table.add_row(vec!["CER".to_string(), format!("{:.4}", report.cer)]);
    table.add_row(vec![
        "Character accuracy".to_string(),
        format!("{:.2}%", report.character_accuracy * 100.0),
    ]);
    table
}

/// Summary table followed by up to [`MISTAKES_SHOWN`] misrecognized samples.
fn render_report(report: &EvaluationReport) -> String {
    let mut out = format!("{}\n", summary_table(report));
    let wrong: Vec<_> = report.details.iter().filter(|d| !d.correct).collect();
    if wrong.is_empty() {
        return out;
    }
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec!["FILE", "EXPECTED", "PREDICTED", "CER"]);
    for detail in wrong.iter().take(MISTAKES_SHOWN) {
        let file = detail
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        table.add_row(vec![
            file,
            detail.expected.clone(),
            detail.predicted.clone(),
            format!("{:.2}", detail.cer),
        ]);
    }
    out.push_str(&format!(
        "\nMisrecognized ({} of {}):\n{table}\n",
        wrong.len(),
        report.total_samples
    ));
    out
}
