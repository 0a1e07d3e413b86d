//! Metrics against ground truth.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{AttackType, Confidence, FileId, GroundTruthSet, Metrics};

/// Error rate above which a run's metrics are reported as degraded.
pub const DEGRADED_ERROR_RATE: f64 = 0.05;

/// Score a match set against ground truth.
///
/// Every matched file that is not labelled poisoned counts as a false
/// positive, including files the ground truth does not mention.
pub fn score(matched: &BTreeSet<FileId>, ground_truth: &GroundTruthSet) -> Metrics {
    let poisoned = ground_truth.poisoned();
    let tp = matched.intersection(poisoned).count() as u64;
    let fp = matched.len() as u64 - tp;
    let fn_ = poisoned.len() as u64 - tp;
    Metrics::from_counts(tp, fp, fn_)
}

/// Detection results for one attack type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackTypeScore {
    pub total: u64,
    pub detected: u64,
    pub detection_rate: f64,
}

/// Per-attack-type detection rate: the share of each type's poisoned files
/// that the match set caught.
pub fn score_by_attack_type(
    matched: &BTreeSet<FileId>,
    ground_truth: &GroundTruthSet,
) -> BTreeMap<AttackType, AttackTypeScore> {
    ground_truth
        .poisoned_by_attack_type()
        .into_iter()
        .map(|(attack, files)| {
            let total = files.len() as u64;
            let detected = files.intersection(matched).count() as u64;
            let detection_rate = if total == 0 {
                0.0
            } else {
                detected as f64 / total as f64
            };
            (
                attack,
                AttackTypeScore {
                    total,
                    detected,
                    detection_rate,
                },
            )
        })
        .collect()
}

/// How far the metrics of a run can be trusted.
pub fn confidence(errors: u64, files_total: u64, estimated: bool) -> Confidence {
    let error_rate = if files_total == 0 {
        0.0
    } else {
        errors as f64 / files_total as f64
    };
    if error_rate > DEGRADED_ERROR_RATE {
        Confidence::Degraded
    } else if estimated {
        Confidence::Estimated
    } else {
        Confidence::Exact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<FileId> {
        names.iter().map(|n| FileId::new(*n)).collect()
    }

    fn truth() -> GroundTruthSet {
        GroundTruthSet::new()
            .with_poisoned("a", AttackType::SpamLinks)
            .with_poisoned("b", AttackType::SpamLinks)
            .with_poisoned("c", AttackType::Homoglyphs)
            .with_clean("d")
    }

    #[test]
    fn counts_confusion_matrix() {
        let m = score(&set(&["a", "c", "d", "unlabelled"]), &truth());
        assert_eq!(m.true_positive_count, 2);
        assert_eq!(m.false_positive_count, 2);
        assert_eq!(m.false_negative_count, 1);
        assert!((m.precision - 0.5).abs() < 1e-9);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_match_set_scores_zero() {
        let m = score(&BTreeSet::new(), &truth());
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.f1, 0.0);
        assert_eq!(m.false_negative_count, 3);
    }

    #[test]
    fn per_attack_type_detection() {
        let by_type = score_by_attack_type(&set(&["a", "d"]), &truth());
        assert_eq!(by_type[&AttackType::SpamLinks].detected, 1);
        assert_eq!(by_type[&AttackType::SpamLinks].detection_rate, 0.5);
        assert_eq!(by_type[&AttackType::Homoglyphs].detection_rate, 0.0);
    }

    #[test]
    fn confidence_levels() {
        assert_eq!(confidence(5, 100, false), Confidence::Exact);
        assert_eq!(confidence(6, 100, false), Confidence::Degraded);
        assert_eq!(confidence(0, 100, true), Confidence::Estimated);
        assert_eq!(confidence(50, 100, true), Confidence::Degraded);
        assert_eq!(confidence(0, 0, false), Confidence::Exact);
    }
}
