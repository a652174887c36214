//! File writing shared by `init` and `create-handler`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use ocrkit_plugin::HandlerKind;

/// One file to be written.
#[derive(Debug, Clone)]
pub struct PlannedFile {
    pub path: PathBuf,
    pub contents: String,
    pub executable: bool,
}

impl PlannedFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            executable: false,
        }
    }

    pub fn script(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            executable: true,
            ..Self::new(path, contents)
        }
    }
}

/// Write every file, or none if any already exists and `force` is off.
pub fn write_all(files: &[PlannedFile], force: bool) -> anyhow::Result<()> {
    if !force {
        let existing: Vec<String> = files
            .iter()
            .filter(|f| f.path.exists())
            .map(|f| f.path.display().to_string())
            .collect();
        if !existing.is_empty() {
            anyhow::bail!(
                "refusing to overwrite existing files (use --force): {}",
                existing.join(", ")
            );
        }
    }

    for file in files {
        if let Some(parent) = file.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&file.path, &file.contents)
            .with_context(|| format!("failed to write {}", file.path.display()))?;
        if file.executable {
            make_executable(&file.path)?;
        }
        tracing::debug!(path = %file.path.display(), "wrote file");
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

/// Helper scripts for one handler family.
///
/// Only scripts whose handler kinds are present are produced: `train_`
/// needs a train handler, `evaluate_` an evaluate handler, `api_` an
/// infer handler.
pub fn family_scripts(family: &str, kinds: &[HandlerKind], scripts_dir: &Path) -> Vec<PlannedFile> {
    let preprocess = format!("{family}_preprocess");
    let mut out = Vec::new();
    if kinds.contains(&HandlerKind::Train) {
        out.push(PlannedFile::script(
            scripts_dir.join(format!("train_{family}.sh")),
            format!(
                "#!/usr/bin/env bash\n\
                 # Usage: train_{family}.sh [DATA_DIR] [MODEL] [extra ocrkit train flags]\n\
                 set -euo pipefail\n\
                 ocrkit train --input \"${{1:-./data}}\" --output \"${{2:-./{family}_model.json}}\" \\\n  \
                 --handler {family}_train --preprocess-handler {preprocess} \"${{@:3}}\"\n"
            ),
        ));
    }
    if kinds.contains(&HandlerKind::Evaluate) {
        out.push(PlannedFile::script(
            scripts_dir.join(format!("evaluate_{family}.sh")),
            format!(
                "#!/usr/bin/env bash\n\
                 # Usage: evaluate_{family}.sh [DATA_DIR] [MODEL] [extra ocrkit evaluate flags]\n\
                 set -euo pipefail\n\
                 ocrkit evaluate --target \"${{1:-./data}}\" --model \"${{2:-./{family}_model.json}}\" \\\n  \
                 --handler {family}_evaluate --preprocess-handler {preprocess} \"${{@:3}}\"\n"
            ),
        ));
    }
    if kinds.contains(&HandlerKind::Infer) {
        out.push(PlannedFile::script(
            scripts_dir.join(format!("api_{family}.sh")),
            format!(
                "#!/usr/bin/env bash\n\
                 # Usage: api_{family}.sh [MODEL] [extra ocrkit api flags]\n\
                 set -euo pipefail\n\
                 ocrkit api --model \"${{1:-./{family}_model.json}}\" \\\n  \
                 --handler {family}_ocr --preprocess-handler {preprocess} \"${{@:2}}\"\n"
            ),
        ));
    }
    out
}
