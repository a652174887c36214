//! `ocrkit generate` -- render synthetic CAPTCHA images.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use ocrkit_core::synth::{self, SynthOptions};
use ocrkit_types::is_valid_label;

/// Arguments for the `ocrkit generate` subcommand.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Render exactly this 4-letter text as `<text>.png`.
    #[arg(long, conflicts_with = "count")]
    pub text: Option<String>,

    /// Number of random labelled images to render.
    #[arg(short = 'n', long, default_value_t = 10)]
    pub count: usize,

    /// Output directory.
    #[arg(short, long, default_value = "captchas")]
    pub output: PathBuf,

    /// Random seed; the same seed renders the same images.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

pub fn run(args: GenerateArgs) -> anyhow::Result<()> {
    let opts = SynthOptions {
        seed: args.seed,
        ..SynthOptions::default()
    };

    if let Some(text) = args.text {
        let text = text.to_ascii_lowercase();
        if !is_valid_label(&text) {
            anyhow::bail!("text must be exactly 4 letters a-z, got '{text}'");
        }
        std::fs::create_dir_all(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        let path = args.output.join(format!("{text}.png"));
        synth::render(&text, &opts)?
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let written = synth::write_dataset(&args.output, args.count, &opts)?;
    println!(
        "Wrote {} images to {}",
        written.len(),
        args.output.display()
    );
    Ok(())
}
