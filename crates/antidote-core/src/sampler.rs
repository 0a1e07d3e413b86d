//! Validation sampling for runs without ground truth.
//!
//! A bounded random sample of matched and unmatched files is sent to an
//! external judge; the judge's verdicts are extrapolated back to the whole
//! corpus by [`estimate`].

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::{FileId, Metrics};

/// Files selected for external confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationBatch {
    pub matched: Vec<FileId>,
    pub unmatched: Vec<FileId>,
}

impl ValidationBatch {
    pub fn len(&self) -> usize {
        self.matched.len() + self.unmatched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matched.is_empty() && self.unmatched.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = &FileId> {
        self.matched.iter().chain(self.unmatched.iter())
    }
}

/// Judge verdicts: `true` means the file was confirmed poisoned.
pub type Confirmations = BTreeMap<FileId, bool>;

/// Draw up to `k` matched and `k` unmatched ids uniformly at random. Sets
/// smaller than `k` are taken whole. Each side is returned sorted.
pub fn sample<R: Rng + ?Sized>(
    matched: &[FileId],
    unmatched: &[FileId],
    k: usize,
    rng: &mut R,
) -> ValidationBatch {
    ValidationBatch {
        matched: pick(matched, k, rng),
        unmatched: pick(unmatched, k, rng),
    }
}

fn pick<R: Rng + ?Sized>(from: &[FileId], k: usize, rng: &mut R) -> Vec<FileId> {
    let mut out: Vec<FileId> = from.choose_multiple(rng, k).cloned().collect();
    out.sort();
    out
}

/// Extrapolate precision and recall from judged samples.
///
/// Sample precision is applied to the full matched set to estimate true
/// positives; the sample miss rate is applied to the full unmatched set to
/// estimate false negatives. Files the judge gave no verdict for are
/// ignored. Stateless: the same inputs always give the same metrics.
pub fn estimate(
    batch: &ValidationBatch,
    confirmations: &Confirmations,
    matched_total: u64,
    unmatched_total: u64,
) -> Metrics {
    let precision = confirmed_rate(&batch.matched, confirmations);
    let miss_rate = confirmed_rate(&batch.unmatched, confirmations);

    let est_tp = precision * matched_total as f64;
    let est_fn = miss_rate * unmatched_total as f64;
    let recall = if est_tp + est_fn > 0.0 {
        est_tp / (est_tp + est_fn)
    } else {
        0.0
    };

    let tp = est_tp.round() as u64;
    Metrics::from_estimates(
        precision,
        recall,
        tp,
        matched_total.saturating_sub(tp),
        est_fn.round() as u64,
    )
}

fn confirmed_rate(files: &[FileId], confirmations: &Confirmations) -> f64 {
    let verdicts: Vec<bool> = files
        .iter()
        .filter_map(|f| confirmations.get(f).copied())
        .collect();
    if verdicts.is_empty() {
        return 0.0;
    }
    verdicts.iter().filter(|v| **v).count() as f64 / verdicts.len() as f64
}
