//! Output records consumed by UIs and harnesses.
//!
//! One [`RunRecord`] per completed run plus a [`SessionReport`] summarising
//! the session. Both are written as pretty JSON; the best run's matched
//! files are also written one name per line.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AttackType, Confidence, FileId, Hypothesis, RunId, RunResult};
use crate::scoring::AttackTypeScore;

pub const SCHEMA_VERSION: &str = "1.0";

/// Corpus-level risk from the share of files the best predicate flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskVerdict {
    #[serde(rename = "HIGH RISK")]
    High,
    #[serde(rename = "MEDIUM RISK")]
    Medium,
    #[serde(rename = "LOW RISK")]
    Low,
    #[serde(rename = "CLEAN")]
    Clean,
}

impl RiskVerdict {
    /// `HIGH` from 10% flagged, `MEDIUM` from 3%, `LOW` for anything above
    /// zero.
    pub fn from_counts(matched: u64, corpus_size: u64) -> Self {
        if matched == 0 || corpus_size == 0 {
            return RiskVerdict::Clean;
        }
        let ratio = matched as f64 / corpus_size as f64;
        if ratio >= 0.10 {
            RiskVerdict::High
        } else if ratio >= 0.03 {
            RiskVerdict::Medium
        } else {
            RiskVerdict::Low
        }
    }
}

impl fmt::Display for RiskVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskVerdict::High => "HIGH RISK",
            RiskVerdict::Medium => "MEDIUM RISK",
            RiskVerdict::Low => "LOW RISK",
            RiskVerdict::Clean => "CLEAN",
        })
    }
}

/// Qualitative grade of a hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl Grade {
    /// Weighted score of precision (0.3), recall (0.3) and F1 (0.4).
    pub fn score(precision: f64, recall: f64, f1: f64) -> f64 {
        precision * 0.3 + recall * 0.3 + f1 * 0.4
    }

    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Grade::Excellent
        } else if score >= 0.6 {
            Grade::Good
        } else if score >= 0.4 {
            Grade::Fair
        } else if score >= 0.2 {
            Grade::Poor
        } else {
            Grade::VeryPoor
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Grade::Excellent => "Excellent - very effectively identifies bad data",
            Grade::Good => "Good - reliable at identifying bad data",
            Grade::Fair => "Fair - finds some bad data but with false positives",
            Grade::Poor => "Poor - unreliable, many false positives",
            Grade::VeryPoor => "Very Poor - fails to meaningfully identify bad data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisRecord {
    pub description: String,
    pub predicate_source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Output record for one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub hypothesis: HypothesisRecord,
    pub metrics: MetricsRecord,
    pub matched_count: usize,
    pub errors: u64,
    pub duration_ms: u64,
    pub estimated: bool,
    pub confidence: Confidence,
    pub grade: Grade,
    pub grade_score: f64,
}

impl RunRecord {
    pub fn new(result: &RunResult, hypothesis: &Hypothesis) -> Self {
        let m = &result.metrics;
        let grade_score = Grade::score(m.precision, m.recall, m.f1);
        Self {
            run_id: result.run_id,
            hypothesis: HypothesisRecord {
                description: hypothesis.description.clone(),
                predicate_source: hypothesis.predicate_source.clone(),
            },
            metrics: MetricsRecord {
                f1: m.f1,
                precision: m.precision,
                recall: m.recall,
            },
            matched_count: result.matched_count(),
            errors: result.errors,
            duration_ms: result.duration_ms(),
            estimated: result.estimated,
            confidence: result.confidence,
            grade: Grade::from_score(grade_score),
            grade_score: (grade_score * 100.0).round() / 100.0,
        }
    }
}

/// An iteration that produced no run, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedIteration {
    pub iteration: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub best: Option<RunRecord>,
    pub risk_verdict: RiskVerdict,
    /// `matched_count / corpus_size` of the best run.
    pub matched_ratio: f64,
    /// Detection rate per attack type for the best run, when ground truth
    /// was available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_types: Option<BTreeMap<AttackType, AttackTypeScore>>,
}

/// Whole-session output: runs in execution order plus a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub schema_version: String,
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub corpus: String,
    pub corpus_size: u64,
    pub iterations_requested: u32,
    pub cancelled: bool,
    pub runs: Vec<RunRecord>,
    pub skipped: Vec<SkippedIteration>,
    pub summary: SessionSummary,
}

/// Write the session report as pretty JSON.
pub fn write_session_json(path: &Path, report: &SessionReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize session report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Write one run record as pretty JSON.
pub fn write_run_json(path: &Path, record: &RunRecord) -> Result<()> {
    let content = serde_json::to_string_pretty(record).context("serialize run record")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Write matched file names, one per line.
pub fn write_matched_list<'a>(
    path: &Path,
    files: impl IntoIterator<Item = &'a FileId>,
) -> Result<()> {
    let mut out = String::new();
    for f in files {
        out.push_str(f.as_str());
        out.push('\n');
    }
    std::fs::write(path, out).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Plain-text summary for terminal output.
pub fn render_summary(report: &SessionReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Session {} over {} ({} files)\n",
        report.session_id, report.corpus, report.corpus_size
    ));
    out.push_str(&format!(
        "Runs completed: {} of {} iterations ({} skipped){}\n",
        report.runs.len(),
        report.iterations_requested,
        report.skipped.len(),
        if report.cancelled { ", cancelled" } else { "" }
    ));
    out.push_str(&format!("Verdict: {}\n", report.summary.risk_verdict));

    match &report.summary.best {
        Some(best) => {
            out.push_str(&format!(
                "\nBest hypothesis ({}): {}\n  predicate: {}\n",
                best.run_id, best.hypothesis.description, best.hypothesis.predicate_source
            ));
            out.push_str(&format!(
                "  f1 {:.3}  precision {:.3}  recall {:.3}{}\n",
                best.metrics.f1,
                best.metrics.precision,
                best.metrics.recall,
                if best.estimated { "  (estimated)" } else { "" }
            ));
            out.push_str(&format!(
                "  matched {} ({:.1}%), errors {}, grade: {}\n",
                best.matched_count,
                report.summary.matched_ratio * 100.0,
                best.errors,
                best.grade.describe()
            ));
        }
        None => out.push_str("\nNo hypothesis completed a run.\n"),
    }

    if let Some(types) = &report.summary.attack_types {
        out.push_str("\nDetection by attack type:\n");
        for (attack, s) in types {
            out.push_str(&format!(
                "  {:<22} {}/{} ({:.0}%)\n",
                attack.as_str(),
                s.detected,
                s.total,
                s.detection_rate * 100.0
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use super::*;
    use crate::domain::{ErrorBreakdown, HypothesisId, Metrics};

    fn sample_run() -> (RunResult, Hypothesis) {
        let result = RunResult {
            run_id: RunId(1),
            hypothesis_id: HypothesisId(1),
            matched_files: ["3.txt"].iter().map(|n| FileId::new(*n)).collect::<BTreeSet<_>>(),
            errors: 0,
            error_breakdown: ErrorBreakdown::default(),
            files_total: 5,
            metrics: Metrics::from_counts(1, 0, 0),
            estimated: false,
            confidence: Confidence::Exact,
            duration: Duration::from_millis(12),
        };
        let hypothesis = Hypothesis {
            id: HypothesisId(1),
            description: "empty files".into(),
            predicate_source: "len(content) == 0".into(),
            fingerprint: "f".into(),
            created_at: Utc::now(),
        };
        (result, hypothesis)
    }

    #[test]
    fn risk_thresholds() {
        assert_eq!(RiskVerdict::from_counts(0, 100), RiskVerdict::Clean);
        assert_eq!(RiskVerdict::from_counts(1, 100), RiskVerdict::Low);
        assert_eq!(RiskVerdict::from_counts(3, 100), RiskVerdict::Medium);
        assert_eq!(RiskVerdict::from_counts(10, 100), RiskVerdict::High);
        assert_eq!(RiskVerdict::High.to_string(), "HIGH RISK");
        assert_eq!(
            serde_json::to_value(RiskVerdict::Medium).unwrap(),
            serde_json::json!("MEDIUM RISK")
        );
    }

    #[test]
    fn grades() {
        assert_eq!(Grade::from_score(Grade::score(1.0, 1.0, 1.0)), Grade::Excellent);
        assert_eq!(Grade::from_score(Grade::score(0.2, 1.0, 1.0 / 3.0)), Grade::Fair);
        assert_eq!(Grade::from_score(0.0), Grade::VeryPoor);
    }

    #[test]
    fn run_record_has_expected_keys() {
        let (result, hypothesis) = sample_run();
        let raw = serde_json::to_value(RunRecord::new(&result, &hypothesis)).unwrap();
        assert_eq!(raw["run_id"], 1);
        assert_eq!(raw["hypothesis"]["predicate_source"], "len(content) == 0");
        assert_eq!(raw["metrics"]["f1"], 1.0);
        assert_eq!(raw["matched_count"], 1);
        assert_eq!(raw["duration_ms"], 12);
        assert_eq!(raw["confidence"], "exact");
        assert_eq!(raw["grade"], "excellent");
    }

    #[test]
    fn writes_matched_list_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matched.txt");
        let (result, _) = sample_run();
        write_matched_list(&path, &result.matched_files).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "3.txt\n");
    }
}
