//! Run results and detection metrics.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::file::FileId;
use super::hypothesis::HypothesisId;
use super::outcome::ErrorBreakdown;

/// Ordinal run identifier. Lower ids ran earlier; the aggregator uses this
/// as its final tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Detection quality for one run.
///
/// # Invariants
///
/// `precision`, `recall` and `f1` are always finite and within `[0, 1]`.
/// Every zero denominator yields 0 rather than NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positive_count: u64,
    pub false_positive_count: u64,
    pub false_negative_count: u64,
}

impl Metrics {
    pub fn zero() -> Self {
        Self::from_counts(0, 0, 0)
    }

    /// Derive ratios from confusion counts.
    pub fn from_counts(tp: u64, fp: u64, fn_: u64) -> Self {
        let precision = ratio(tp as f64, (tp + fp) as f64);
        let recall = ratio(tp as f64, (tp + fn_) as f64);
        Self {
            precision,
            recall,
            f1: harmonic_mean(precision, recall),
            true_positive_count: tp,
            false_positive_count: fp,
            false_negative_count: fn_,
        }
    }

    /// Build metrics from already-estimated ratios (validation fallback).
    /// Inputs are clamped into `[0, 1]`; non-finite inputs become 0.
    pub fn from_estimates(precision: f64, recall: f64, tp: u64, fp: u64, fn_: u64) -> Self {
        let precision = clamp_unit(precision);
        let recall = clamp_unit(recall);
        Self {
            precision,
            recall,
            f1: harmonic_mean(precision, recall),
            true_positive_count: tp,
            false_positive_count: fp,
            false_negative_count: fn_,
        }
    }
}

pub(crate) fn ratio(num: f64, den: f64) -> f64 {
    if den <= 0.0 {
        0.0
    } else {
        clamp_unit(num / den)
    }
}

fn harmonic_mean(p: f64, r: f64) -> f64 {
    if p + r <= 0.0 {
        0.0
    } else {
        clamp_unit(2.0 * p * r / (p + r))
    }
}

fn clamp_unit(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// How much the reported metrics can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Computed against ground truth with a tolerable error rate.
    Exact,
    /// Extrapolated from a validation sample; no ground truth was available.
    Estimated,
    /// Too many files failed to evaluate for the metrics to be relied on.
    Degraded,
}

/// One completed corpus pass under a single compiled predicate.
///
/// Created once per completed run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub hypothesis_id: HypothesisId,
    pub matched_files: BTreeSet<FileId>,
    /// Number of files whose evaluation failed (counted as non-matches).
    pub errors: u64,
    pub error_breakdown: ErrorBreakdown,
    pub files_total: u64,
    pub metrics: Metrics,
    /// `true` when metrics come from validation-sample extrapolation.
    pub estimated: bool,
    pub confidence: Confidence,
    pub duration: Duration,
}

impl RunResult {
    pub fn matched_count(&self) -> usize {
        self.matched_files.len()
    }

    /// Fraction of files whose evaluation failed.
    pub fn error_rate(&self) -> f64 {
        ratio(self.errors as f64, self.files_total as f64)
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_metrics_are_defined() {
        let m = Metrics::zero();
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
    }

    #[test]
    fn perfect_detection() {
        let m = Metrics::from_counts(3, 0, 0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1, 1.0);
    }

    #[test]
    fn estimates_are_clamped() {
        let m = Metrics::from_estimates(1.7, f64::NAN, 0, 0, 0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
    }

    #[test]
    fn run_id_display() {
        assert_eq!(RunId(3).to_string(), "run-3");
    }
}
