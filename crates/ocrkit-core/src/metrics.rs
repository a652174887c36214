//! Accuracy and character-error-rate scoring.
//!
//! Shared by training validation and the evaluate orchestrator so both
//! report identical numbers for the same predictions.

use ocrkit_plugin::HandlerError;
use ocrkit_types::report::{EvaluationReport, Prediction, SampleDetail};
use ocrkit_types::{Sample, Tensor};

/// Levenshtein distance between two strings, by `char`.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Edit distance normalized by the length of `truth`.
pub fn character_error_rate(predicted: &str, truth: &str) -> f64 {
    let len = truth.chars().count().max(1);
    edit_distance(predicted, truth) as f64 / len as f64
}

/// Number of positions where `predicted` and `truth` agree.
pub fn positional_matches(predicted: &str, truth: &str) -> usize {
    predicted
        .chars()
        .zip(truth.chars())
        .filter(|(p, t)| p == t)
        .count()
}

/// Run `predict` over every sample and aggregate the results.
///
/// `samples` must be non-empty; callers check for empty datasets first so
/// an empty set is never reported as 0% or 100%.
pub fn score<F>(
    samples: &[Sample],
    keep_details: bool,
    mut predict: F,
) -> Result<EvaluationReport, HandlerError>
where
    F: FnMut(&Tensor) -> Result<Prediction, HandlerError>,
{
    let mut correct = 0usize;
    let mut cer_sum = 0.0;
    let mut char_hits = 0usize;
    let mut char_total = 0usize;
    let mut details = Vec::new();

    for sample in samples {
        let prediction = predict(&sample.input)?;
        let is_correct = prediction.text == sample.label;
        let cer = character_error_rate(&prediction.text, &sample.label);

        correct += usize::from(is_correct);
        cer_sum += cer;
        char_hits += positional_matches(&prediction.text, &sample.label);
        char_total += sample.label.chars().count();

        if keep_details {
            details.push(SampleDetail {
                source: sample.source.clone(),
                expected: sample.label.clone(),
                predicted: prediction.text,
                correct: is_correct,
                cer,
            });
        }
    }

    let total = samples.len();
    let denom = total.max(1) as f64;
    Ok(EvaluationReport {
        total_samples: total,
        correct_predictions: correct,
        accuracy: correct as f64 / denom,
        cer: cer_sum / denom,
        character_accuracy: char_hits as f64 / char_total.max(1) as f64,
        details,
    })
}
