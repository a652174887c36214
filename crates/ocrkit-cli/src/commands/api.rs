//! `ocrkit api` -- serve a saved model over HTTP.
//!
//! The model is loaded once before the listener binds, so a missing or
//! incompatible artifact fails the command instead of every request.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::info;

use ocrkit_core::pipeline::InferenceOrchestrator;
use ocrkit_plugin::HandlerKind;
use ocrkit_services::{ApiState, build_router};
use ocrkit_types::PipelineContext;

use super::{build_registry, canonical_id, load_config, pick_preprocess};

pub const DEFAULT_OCR_HANDLER: &str = "demo_ocr";

/// Arguments for the `ocrkit api` subcommand.
#[derive(Args, Debug)]
pub struct ApiArgs {
    /// Model file produced by `ocrkit train`.
    #[arg(short, long, env = "OCRKIT_MODEL_PATH", default_value = "model.json")]
    pub model: PathBuf,

    /// OCR (inference) handler id.
    #[arg(long, env = "OCRKIT_OCR_HANDLER")]
    pub handler: Option<String>,

    /// Preprocess handler id (defaults to the OCR handler's family).
    #[arg(long, env = "OCRKIT_PREPROCESS_HANDLER")]
    pub preprocess_handler: Option<String>,

    /// Bind address (default from config, else 127.0.0.1).
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (default from config, else 8000).
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Run the api subcommand until Ctrl-C.
pub async fn run(args: ApiArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let cfg = load_config(config_path)?;
    let registry = build_registry()?;

    let ocr_id = canonical_id(
        &registry,
        args.handler
            .or(cfg.handlers.infer.clone())
            .unwrap_or_else(|| DEFAULT_OCR_HANDLER.to_string()),
        HandlerKind::Infer,
    );
    let preprocess_id = pick_preprocess(
        args.preprocess_handler.as_deref(),
        &cfg.handlers.preprocess,
        &ocr_id,
        &registry,
    );

    let ctx = PipelineContext::builder()
        .artifact_path(&args.model)
        .handlers(cfg.handlers.clone())
        .preprocess_handler(&preprocess_id)
        .infer_handler(&ocr_id)
        .merge_handler_options(&cfg.handler_options)
        .build()?;
    let pipeline = InferenceOrchestrator::from_registry(&registry, &ctx)?;

    let state = ApiState::new(Arc::new(pipeline), registry, &args.model);
    let router = build_router(state, &cfg.serve.cors_origins);

    let host = args.host.unwrap_or(cfg.serve.host);
    let port = args.port.unwrap_or(cfg.serve.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        addr = %listener.local_addr()?,
        handler = %ocr_id,
        preprocess = %preprocess_id,
        model = %args.model.display(),
        "ocr api listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("ocr api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
