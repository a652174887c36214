//! Labelled image directory loading.
//!
//! Datasets are flat directories of images named `<label>_<anything>.<ext>`
//! or `<label>.<ext>`, where `<label>` is the 4-letter ground truth.
//! Files with an unusable label or that fail to decode are skipped with
//! a warning rather than failing the whole load.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use ocrkit_plugin::HandlerError;
use ocrkit_types::{Dataset, Sample, Tensor, is_valid_label};

/// File extensions treated as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// An image file and the label parsed from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledFile {
    pub path: PathBuf,
    pub label: String,
}

/// Parse the label out of a dataset file name.
pub fn label_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let label = stem.split('_').next()?.to_ascii_lowercase();
    is_valid_label(&label).then_some(label)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// List labelled image files under `root`, sorted by file name.
pub fn scan(root: &Path) -> Result<Vec<LabelledFile>, HandlerError> {
    if !root.exists() {
        return Err(HandlerError::Dataset(format!(
            "dataset directory not found: {}",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(HandlerError::Dataset(format!(
            "dataset path is not a directory: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_file() || !is_image(&path) {
            continue;
        }
        match label_from_path(&path) {
            Some(label) => files.push(LabelledFile { path, label }),
            None => warn!(file = %path.display(), "skipping image without a valid 4-letter label"),
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(root = %root.display(), files = files.len(), "scanned dataset");
    Ok(files)
}

/// Load every labelled image under `root`, converting each with `convert`.
pub fn load_with<F>(root: &Path, mut convert: F) -> Result<Dataset, HandlerError>
where
    F: FnMut(&image::DynamicImage) -> Result<Tensor, HandlerError>,
{
    let files = scan(root)?;
    let mut samples = Vec::with_capacity(files.len());
    for file in files {
        let image = match image::open(&file.path) {
            Ok(img) => img,
            Err(e) => {
                warn!(file = %file.path.display(), error = %e, "skipping undecodable image");
                continue;
            }
        };
        let input = convert(&image)?;
        samples.push(Sample {
            label: file.label,
            input,
            source: file.path,
        });
    }
    Ok(Dataset::new(root, samples))
}
