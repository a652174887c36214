//! `ocrkit create-handler` -- scaffold a new handler family.
//!
//! Writes `<name>_handler.rs` with one stub per requested kind, a README,
//! an empty options file and the matching helper scripts.

use std::path::{Path, PathBuf};

use clap::Args;

use ocrkit_core::CORE_VERSION;
use ocrkit_plugin::HandlerKind;

use super::scaffold::{self, PlannedFile};

const HEADER: &str = include_str!("../../templates/handler/header.rs.tmpl");
const PREPROCESS: &str = include_str!("../../templates/handler/preprocess.rs.tmpl");
const TRAIN: &str = include_str!("../../templates/handler/train.rs.tmpl");
const EVALUATE: &str = include_str!("../../templates/handler/evaluate.rs.tmpl");
const INFER: &str = include_str!("../../templates/handler/infer.rs.tmpl");
const MODEL: &str = include_str!("../../templates/handler/model.rs.tmpl");
const README: &str = include_str!("../../templates/handler/README.md.tmpl");

const INITIAL_VERSION: &str = "0.1.0";

/// Arguments for the `ocrkit create-handler` subcommand.
#[derive(Args, Debug)]
pub struct CreateHandlerArgs {
    /// Family name: a lowercase letter followed by `[a-z0-9_]`.
    pub name: String,

    /// Handler kinds to generate, comma separated.
    #[arg(long, value_delimiter = ',', default_value = "preprocess,train,evaluate,ocr")]
    pub kinds: Vec<HandlerKind>,

    /// Directory receiving the handler source.
    #[arg(long, default_value = "handlers")]
    pub output_dir: PathBuf,

    /// Directory receiving the helper scripts.
    #[arg(long, default_value = "scripts")]
    pub scripts_dir: PathBuf,

    /// Overwrite files that already exist.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: CreateHandlerArgs) -> anyhow::Result<()> {
    validate_name(&args.name)?;
    let kinds = normalize_kinds(&args.kinds);
    if kinds.is_empty() {
        anyhow::bail!("--kinds must name at least one handler kind");
    }

    let files = plan(&args.name, &kinds, &args.output_dir, &args.scripts_dir);
    scaffold::write_all(&files, args.force)?;

    println!("Created handler family '{}':", args.name);
    for file in &files {
        println!("  {}", file.path.display());
    }
    Ok(())
}

/// Family names become Rust identifiers and handler id prefixes.
fn validate_name(name: &str) -> anyhow::Result<()> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        anyhow::bail!(
            "invalid handler name '{name}': use a lowercase letter followed by lowercase letters, digits or '_'"
        );
    }
    Ok(())
}

/// Deduplicate and put kinds in pipeline order.
fn normalize_kinds(kinds: &[HandlerKind]) -> Vec<HandlerKind> {
    let mut out = kinds.to_vec();
    out.sort();
    out.dedup();
    out
}

fn id_suffix(kind: HandlerKind) -> &'static str {
    match kind {
        HandlerKind::Infer => "ocr",
        other => other.as_str(),
    }
}

fn camel_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// `^major.minor` of the running core.
fn core_requirement() -> String {
    let major_minor: Vec<&str> = CORE_VERSION.split('.').take(2).collect();
    format!("^{}", major_minor.join("."))
}

fn render(template: &str, name: &str) -> String {
    template
        .replace("{{name}}", name)
        .replace("{{Name}}", &camel_case(name))
        .replace("{{NAME}}", &name.to_ascii_uppercase())
        .replace("{{version}}", INITIAL_VERSION)
        .replace("{{core}}", &core_requirement())
}

fn handler_source(name: &str, kinds: &[HandlerKind]) -> String {
    let mut src = render(HEADER, name);
    for kind in kinds {
        let template = match kind {
            HandlerKind::Preprocess => PREPROCESS,
            HandlerKind::Train => TRAIN,
            HandlerKind::Evaluate => EVALUATE,
            HandlerKind::Infer => INFER,
        };
        src.push_str(&render(template, name));
    }
    if kinds.contains(&HandlerKind::Evaluate) || kinds.contains(&HandlerKind::Infer) {
        src.push_str(&render(MODEL, name));
    }
    src.push_str(&register_fn(name, kinds));
    src
}

fn register_fn(name: &str, kinds: &[HandlerKind]) -> String {
    let camel = camel_case(name);
    let mut out = String::from(
        "\n// ── Registration ─────────────────────────────────────────────────────────\n\n\
         /// Register every handler in this family.\n\
         pub fn register(registry: &mut HandlerRegistry) -> Result<(), RegistryError> {\n",
    );
    for kind in kinds {
        let (ctor, ty) = match kind {
            HandlerKind::Preprocess => ("preprocess", "Preprocess"),
            HandlerKind::Train => ("train", "Train"),
            HandlerKind::Evaluate => ("evaluate", "Evaluate"),
            HandlerKind::Infer => ("infer", "Ocr"),
        };
        out.push_str(&format!(
            "    registry.register(AnyHandler::{ctor}({camel}{ty}))?;\n"
        ));
    }
    out.push_str("    Ok(())\n}\n");
    out
}

fn readme(name: &str, kinds: &[HandlerKind]) -> String {
    let rows: Vec<String> = kinds
        .iter()
        .map(|kind| format!("| {kind} | `{name}_{}` |", id_suffix(*kind)))
        .collect();
    render(README, name).replace("{{kind_rows}}", &rows.join("\n"))
}

fn plan(
    name: &str,
    kinds: &[HandlerKind],
    output_dir: &Path,
    scripts_dir: &Path,
) -> Vec<PlannedFile> {
    let mut files = vec![
        PlannedFile::new(
            output_dir.join(format!("{name}_handler.rs")),
            handler_source(name, kinds),
        ),
        PlannedFile::new(
            output_dir.join(format!("{name}_handler-README.md")),
            readme(name, kinds),
        ),
        PlannedFile::new(output_dir.join(format!("{name}_handler-config.json")), "{}\n"),
    ];
    files.extend(scaffold::family_scripts(name, kinds, scripts_dir));
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_validated() {
        assert!(validate_name("cnn").is_ok());
        assert!(validate_name("my_cnn2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("2cnn").is_err());
        assert!(validate_name("Cnn").is_err());
        assert!(validate_name("my-cnn").is_err());
    }

    #[test]
    fn camel_case_joins_parts() {
        assert_eq!(camel_case("cnn"), "Cnn");
        assert_eq!(camel_case("my_cnn_v2"), "MyCnnV2");
    }

    #[test]
    fn core_requirement_is_caret_major_minor() {
        let req = core_requirement();
        assert!(req.starts_with('^'));
        assert_eq!(req.matches('.').count(), 1);
    }

    #[test]
    fn source_contains_only_requested_kinds() {
        let src = handler_source("cnn", &[HandlerKind::Preprocess, HandlerKind::Infer]);
        assert!(src.contains("pub struct CnnPreprocess"));
        assert!(src.contains("pub struct CnnOcr"));
        assert!(src.contains("pub struct CnnModel"));
        assert!(!src.contains("pub struct CnnTrain"));
        assert!(!src.contains("pub struct CnnEvaluate"));
        assert!(src.contains("registry.register(AnyHandler::infer(CnnOcr))?;"));
        assert!(src.contains("pub const CNN_HANDLER_VERSION: &str = \"0.1.0\";"));
        assert!(!src.contains("{{"), "unrendered placeholder");
    }

    #[test]
    fn train_only_family_skips_model() {
        let src = handler_source("solo", &[HandlerKind::Train]);
        assert!(src.contains("SoloSession"));
        assert!(!src.contains("pub struct SoloModel"));
    }

    #[test]
    fn writes_family_files() {
        let dir = tempfile::tempdir().unwrap();
        let args = CreateHandlerArgs {
            name: "cnn".into(),
            kinds: vec![HandlerKind::Infer, HandlerKind::Train, HandlerKind::Train],
            output_dir: dir.path().join("handlers"),
            scripts_dir: dir.path().join("scripts"),
            force: false,
        };
        run(args).unwrap();

        let handlers = dir.path().join("handlers");
        assert!(handlers.join("cnn_handler.rs").is_file());
        let readme = std::fs::read_to_string(handlers.join("cnn_handler-README.md")).unwrap();
        assert!(readme.contains("| train | `cnn_train` |"));
        assert!(readme.contains("| infer | `cnn_ocr` |"));
        assert_eq!(
            std::fs::read_to_string(handlers.join("cnn_handler-config.json")).unwrap(),
            "{}\n"
        );
        assert!(dir.path().join("scripts/train_cnn.sh").is_file());
        assert!(dir.path().join("scripts/api_cnn.sh").is_file());
        assert!(!dir.path().join("scripts/evaluate_cnn.sh").exists());
    }

    #[test]
    fn invalid_name_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let args = CreateHandlerArgs {
            name: "Bad-Name".into(),
            kinds: HandlerKind::ALL.to_vec(),
            output_dir: dir.path().join("handlers"),
            scripts_dir: dir.path().join("scripts"),
            force: false,
        };
        assert!(run(args).is_err());
        assert!(!dir.path().join("handlers").exists());
    }
}
