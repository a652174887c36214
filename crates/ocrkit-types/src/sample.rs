//! Labels, tensors and datasets.
//!
//! A CAPTCHA label is always [`LABEL_LENGTH`] characters drawn from
//! [`CHARSET`]. Preprocess handlers turn images into [`Tensor`]s of
//! whatever shape their paired train / infer handlers expect; the
//! orchestration core never inspects tensor contents.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Fixed number of characters in every label and prediction.
pub const LABEL_LENGTH: usize = 4;

/// Alphabet of valid label characters, in class-index order.
pub const CHARSET: &str = "abcdefghijklmnopqrstuvwxyz";

/// Dense n-dimensional array produced by preprocessing.
pub type Tensor = ndarray::ArrayD<f32>;

/// Returns `true` when `label` is exactly [`LABEL_LENGTH`] characters,
/// all in [`CHARSET`].
pub fn is_valid_label(label: &str) -> bool {
    label.len() == LABEL_LENGTH && label.bytes().all(|b| b.is_ascii_lowercase())
}

/// Class index of `c` within [`CHARSET`].
pub fn char_index(c: char) -> Option<usize> {
    c.is_ascii_lowercase().then(|| (c as u8 - b'a') as usize)
}

/// Character for class index `idx`.
pub fn index_char(idx: usize) -> Option<char> {
    CHARSET.as_bytes().get(idx).map(|b| *b as char)
}

/// One labelled, preprocessed example.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Ground-truth text.
    pub label: String,
    /// Preprocessed model input.
    pub input: Tensor,
    /// File the sample was loaded from.
    pub source: PathBuf,
}

/// An ordered collection of samples loaded from one dataset root.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    root: PathBuf,
    samples: Vec<Sample>,
}

impl Dataset {
    /// Create a dataset from already-loaded samples.
    pub fn new(root: impl Into<PathBuf>, samples: Vec<Sample>) -> Self {
        Self {
            root: root.into(),
            samples,
        }
    }

    /// Directory the samples were loaded from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Distinct labels in first-seen order.
    pub fn unique_labels(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.samples
            .iter()
            .map(|s| s.label.as_str())
            .filter(|l| seen.insert(*l))
            .collect()
    }

    /// Shuffle with `seed` and hold out `fraction` of the samples.
    ///
    /// Returns `(train, validation)`. The training side always keeps at
    /// least one sample when the dataset is non-empty, so a tiny dataset
    /// may produce an empty validation set.
    pub fn split(self, fraction: f64, seed: u64) -> (Vec<Sample>, Vec<Sample>) {
        let mut samples = self.samples;
        let total = samples.len();
        if total == 0 || fraction <= 0.0 {
            return (samples, Vec::new());
        }

        let mut rng = StdRng::seed_from_u64(seed);
        samples.shuffle(&mut rng);

        let held_out = ((total as f64) * fraction).round() as usize;
        let held_out = held_out.min(total - 1);
        let validation = samples.split_off(total - held_out);
        (samples, validation)
    }
}

impl IntoIterator for Dataset {
    type Item = Sample;
    type IntoIter = std::vec::IntoIter<Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}
