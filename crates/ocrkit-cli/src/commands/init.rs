//! `ocrkit init` -- copy the bundled handler sources and helper scripts
//! into a project directory.

use std::path::{Path, PathBuf};

use clap::Args;

use ocrkit_plugin::HandlerKind;

use super::scaffold::{self, PlannedFile};

const DEMO_SOURCE: &str = include_str!("../../../ocrkit-handlers/src/demo.rs");
const LINEAR_SOURCE: &str = include_str!("../../../ocrkit-handlers/src/linear.rs");
const README: &str = include_str!("../../templates/README.md");

/// Handler families shipped with ocrkit.
const BUNDLED_FAMILIES: [&str; 2] = ["demo", "linear"];

/// Arguments for the `ocrkit init` subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory receiving the handler sources.
    #[arg(long, default_value = "handlers")]
    pub output_dir: PathBuf,

    /// Directory receiving the train/evaluate/api scripts.
    #[arg(long, default_value = "scripts")]
    pub scripts_dir: PathBuf,

    /// Overwrite files that already exist.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> anyhow::Result<()> {
    let files = plan(&args.output_dir, &args.scripts_dir);
    scaffold::write_all(&files, args.force)?;

    println!("Initialized ocrkit project:");
    for file in &files {
        println!("  {}", file.path.display());
    }
    println!("\nNext: ocrkit generate --output data && ./scripts/train_demo.sh data");
    Ok(())
}

fn plan(output_dir: &Path, scripts_dir: &Path) -> Vec<PlannedFile> {
    let mut files = vec![
        PlannedFile::new(output_dir.join("demo.rs"), DEMO_SOURCE),
        PlannedFile::new(output_dir.join("linear.rs"), LINEAR_SOURCE),
        PlannedFile::new(output_dir.join("README.md"), README),
    ];
    for family in BUNDLED_FAMILIES {
        files.extend(scaffold::family_scripts(family, &HandlerKind::ALL, scripts_dir));
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(root: &Path, force: bool) -> InitArgs {
        InitArgs {
            output_dir: root.join("handlers"),
            scripts_dir: root.join("scripts"),
            force,
        }
    }

    #[test]
    fn writes_sources_readme_and_scripts() {
        let dir = tempfile::tempdir().unwrap();
        run(args(dir.path(), false)).unwrap();

        let demo = std::fs::read_to_string(dir.path().join("handlers/demo.rs")).unwrap();
        assert!(demo.contains("DemoPreprocess"));
        assert!(dir.path().join("handlers/linear.rs").is_file());
        assert!(dir.path().join("handlers/README.md").is_file());
        for name in [
            "train_demo.sh",
            "evaluate_demo.sh",
            "api_demo.sh",
            "train_linear.sh",
            "evaluate_linear.sh",
            "api_linear.sh",
        ] {
            assert!(dir.path().join("scripts").join(name).is_file(), "{name}");
        }
    }

    #[test]
    fn second_run_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        run(args(dir.path(), false)).unwrap();
        let readme = dir.path().join("handlers/README.md");
        std::fs::write(&readme, "edited").unwrap();

        let err = run(args(dir.path(), false)).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(std::fs::read_to_string(&readme).unwrap(), "edited");

        run(args(dir.path(), true)).unwrap();
        assert_ne!(std::fs::read_to_string(&readme).unwrap(), "edited");
    }
}
