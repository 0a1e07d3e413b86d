//! Structured observability hooks for search-session lifecycle events.
//!
//! Emission functions for key lifecycle events: run start and finish,
//! hypothesis rejection, skipped iterations, collaborator retries and
//! evaluations abandoned by the batch watchdog. The session span itself
//! comes from `#[instrument]` on the session loop.
//!
//! Events are emitted at `info!` level unless noted (filter with `RUST_LOG`).

use std::time::Duration;

use tracing::{info, warn};

use crate::domain::{FileId, HypothesisId, RunResult};

/// Emit event: a corpus run started for a hypothesis.
pub fn emit_run_started(iteration: u32, hypothesis_id: HypothesisId, predicate: &str) {
    info!(
        event = "run.started",
        iteration,
        hypothesis_id = %hypothesis_id,
        predicate = %predicate,
    );
}

/// Emit event: a run finished and was scored.
pub fn emit_run_finished(result: &RunResult) {
    info!(
        event = "run.finished",
        run_id = %result.run_id,
        hypothesis_id = %result.hypothesis_id,
        matched = result.matched_count(),
        errors = result.errors,
        f1 = result.metrics.f1,
        precision = result.metrics.precision,
        recall = result.metrics.recall,
        estimated = result.estimated,
        duration_ms = result.duration_ms(),
    );
}

/// Emit event: the store refused a proposal.
pub fn emit_hypothesis_rejected(iteration: u32, reason: &dyn std::fmt::Display) {
    info!(event = "hypothesis.rejected", iteration, reason = %reason);
}

/// Emit event: an iteration produced no run (warning level).
pub fn emit_iteration_skipped(iteration: u32, reason: &dyn std::fmt::Display) {
    warn!(event = "iteration.skipped", iteration, reason = %reason);
}

/// Emit event: a collaborator call is being retried (warning level).
pub fn emit_collaborator_retry(
    operation: &str,
    attempt: u32,
    delay: Duration,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "collaborator.retry",
        operation = %operation,
        attempt,
        delay_ms = delay.as_millis() as u64,
        error = %error,
    );
}

/// Emit event: the batch watchdog gave up on an evaluation that is still
/// running on the blocking pool and still holds its worker slot (warning
/// level).
pub fn emit_evaluation_abandoned(file: &FileId, watchdog: Duration) {
    warn!(
        event = "evaluation.abandoned",
        file = %file,
        watchdog_ms = watchdog.as_millis() as u64,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        emit_iteration_skipped(1, &"no proposal");
        emit_hypothesis_rejected(2, &"duplicate of hypothesis h1");
        emit_collaborator_retry("propose", 1, Duration::from_millis(5), &"timeout");
        emit_evaluation_abandoned(&FileId::new("a.txt"), Duration::from_millis(500));
    }
}
