//! `ocrkit` -- CLI binary for the ocrkit CAPTCHA OCR toolkit.
//!
//! Provides the following subcommands:
//!
//! - `ocrkit init` -- Copy the bundled handlers, a README and helper scripts into a project.
//! - `ocrkit train` -- Train a model with the selected handlers.
//! - `ocrkit evaluate` -- Score a saved model against a labelled directory.
//! - `ocrkit api` -- Serve a saved model over HTTP.
//! - `ocrkit create-handler` -- Scaffold a new handler family.
//! - `ocrkit handlers` -- List registered handlers.
//! - `ocrkit generate` -- Render synthetic CAPTCHA images.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

/// Pluggable CAPTCHA OCR toolkit.
#[derive(Parser)]
#[command(name = "ocrkit", about = "Pluggable CAPTCHA OCR toolkit", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Copy the bundled handlers, a README and helper scripts into a project.
    Init(commands::init::InitArgs),

    /// Train a model.
    Train(commands::train::TrainArgs),

    /// Evaluate a saved model against a labelled image directory.
    Evaluate(commands::evaluate::EvaluateArgs),

    /// Serve a saved model over HTTP.
    Api(commands::api::ApiArgs),

    /// Scaffold a new handler family.
    CreateHandler(commands::create_handler::CreateHandlerArgs),

    /// List registered handlers.
    Handlers(commands::handlers_cmd::HandlersArgs),

    /// Render synthetic CAPTCHA images.
    Generate(commands::generate::GenerateArgs),
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Init(args) => commands::init::run(args)?,
        Commands::Train(args) => commands::train::run(args, config).await?,
        Commands::Evaluate(args) => commands::evaluate::run(args, config).await?,
        Commands::Api(args) => commands::api::run(args, config).await?,
        Commands::CreateHandler(args) => commands::create_handler::run(args)?,
        Commands::Handlers(args) => commands::handlers_cmd::run(args)?,
        Commands::Generate(args) => commands::generate::run(args)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", commands::render_error(&err));
            ExitCode::FAILURE
        }
    }
}
