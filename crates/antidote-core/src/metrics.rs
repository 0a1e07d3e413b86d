//! Global atomic counters for pipeline observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a session).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    files_evaluated: AtomicU64,
    evaluation_errors: AtomicU64,
    runs_completed: AtomicU64,
    hypotheses_rejected: AtomicU64,
    collaborator_retries: AtomicU64,
    evaluations_abandoned: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            files_evaluated: AtomicU64::new(0),
            evaluation_errors: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            hypotheses_rejected: AtomicU64::new(0),
            collaborator_retries: AtomicU64::new(0),
            evaluations_abandoned: AtomicU64::new(0),
        }
    }

    /// Add `n` to the files-evaluated counter.
    pub fn add_files_evaluated(&self, n: u64) {
        self.files_evaluated.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "files_evaluated", n, "counter incremented");
    }

    /// Add `n` to the evaluation-errors counter.
    pub fn add_evaluation_errors(&self, n: u64) {
        self.evaluation_errors.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "evaluation_errors", n, "counter incremented");
    }

    pub fn inc_runs_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_completed", "counter incremented");
    }

    pub fn inc_hypotheses_rejected(&self) {
        self.hypotheses_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "hypotheses_rejected", "counter incremented");
    }

    pub fn inc_collaborator_retries(&self) {
        self.collaborator_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "collaborator_retries", "counter incremented");
    }

    /// An evaluation outlived the watchdog and was given up on. Its
    /// blocking thread and worker slot stay busy until it returns.
    pub fn inc_evaluations_abandoned(&self) {
        self.evaluations_abandoned.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "evaluations_abandoned", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a session) rather than on
    /// every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            files_evaluated = self.files_evaluated(),
            evaluation_errors = self.evaluation_errors(),
            runs_completed = self.runs_completed(),
            hypotheses_rejected = self.hypotheses_rejected(),
            collaborator_retries = self.collaborator_retries(),
            evaluations_abandoned = self.evaluations_abandoned(),
        );
    }

    pub fn files_evaluated(&self) -> u64 {
        self.files_evaluated.load(Ordering::Relaxed)
    }

    pub fn evaluation_errors(&self) -> u64 {
        self.evaluation_errors.load(Ordering::Relaxed)
    }

    pub fn runs_completed(&self) -> u64 {
        self.runs_completed.load(Ordering::Relaxed)
    }

    pub fn hypotheses_rejected(&self) -> u64 {
        self.hypotheses_rejected.load(Ordering::Relaxed)
    }

    pub fn collaborator_retries(&self) -> u64 {
        self.collaborator_retries.load(Ordering::Relaxed)
    }

    pub fn evaluations_abandoned(&self) -> u64 {
        self.evaluations_abandoned.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.files_evaluated.store(0, Ordering::Relaxed);
        self.evaluation_errors.store(0, Ordering::Relaxed);
        self.runs_completed.store(0, Ordering::Relaxed);
        self.hypotheses_rejected.store(0, Ordering::Relaxed);
        self.collaborator_retries.store(0, Ordering::Relaxed);
        self.evaluations_abandoned.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.files_evaluated(), 0);
        m.add_files_evaluated(5);
        m.add_files_evaluated(2);
        assert_eq!(m.files_evaluated(), 7);

        m.add_evaluation_errors(1);
        assert_eq!(m.evaluation_errors(), 1);

        m.inc_runs_completed();
        m.inc_hypotheses_rejected();
        m.inc_hypotheses_rejected();
        m.inc_collaborator_retries();
        m.inc_evaluations_abandoned();
        assert_eq!(m.runs_completed(), 1);
        assert_eq!(m.hypotheses_rejected(), 2);
        assert_eq!(m.collaborator_retries(), 1);
        assert_eq!(m.evaluations_abandoned(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.add_files_evaluated(3);
        m.inc_runs_completed();
        m.inc_collaborator_retries();
        m.inc_evaluations_abandoned();
        m.reset();
        assert_eq!(m.files_evaluated(), 0);
        assert_eq!(m.runs_completed(), 0);
        assert_eq!(m.collaborator_retries(), 0);
        assert_eq!(m.evaluations_abandoned(), 0);
    }
}
