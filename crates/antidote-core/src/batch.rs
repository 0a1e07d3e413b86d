//! Batch execution of one compiled predicate over a whole corpus.
//!
//! Files are evaluated on tokio's blocking pool, bounded by a semaphore of
//! `workers` permits. Work is split into partitions; progress is reported
//! between partitions, and cancellation also interrupts a partition that is
//! waiting for permits. The accumulated match set and counters do not depend
//! on scheduling order.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::cancel::CancellationToken;
use crate::corpus::{Corpus, CorpusError};
use crate::domain::{ErrorBreakdown, EvalErrorKind, EvalOutcome, FileId};
use crate::metrics::METRICS;
use crate::obs;
use crate::predicate::CompiledPredicate;
use crate::sandbox::{self, Budget};

/// Partitions per worker. More partitions mean finer-grained progress and
/// cancellation at the cost of a short barrier between partitions.
const PARTITIONS_PER_WORKER: usize = 8;

/// Worker pool and per-file limits for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum files evaluated concurrently.
    pub workers: usize,
    /// Per-file evaluation budget.
    pub budget: Budget,
    /// The watchdog abandons an evaluation after `budget.deadline × grace`.
    pub watchdog_grace: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            budget: Budget::default(),
            watchdog_grace: 10,
        }
    }
}

impl BatchConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn watchdog(&self) -> Duration {
        self.budget.deadline.saturating_mul(self.watchdog_grace.max(1))
    }
}

/// Errors that abort a whole batch run. No partial result is produced.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    CorpusAccess(#[from] CorpusError),

    #[error("run cancelled after {processed} of {total} files")]
    Cancelled { processed: u64, total: u64 },

    #[error("worker pool failure: {0}")]
    Worker(String),
}

/// Receives `(processed, total)` checkpoints during a run.
pub trait ProgressSink: Send + Sync {
    fn checkpoint(&self, processed: u64, total: u64);
}

impl<F> ProgressSink for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn checkpoint(&self, processed: u64, total: u64) {
        self(processed, total)
    }
}

/// Progress sink that discards checkpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn checkpoint(&self, _processed: u64, _total: u64) {}
}

/// Raw result of one corpus pass, before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub matched_files: BTreeSet<FileId>,
    pub errors: u64,
    pub error_breakdown: ErrorBreakdown,
    pub files_total: u64,
    pub duration: Duration,
}

impl BatchOutcome {
    fn new(files_total: u64) -> Self {
        Self {
            matched_files: BTreeSet::new(),
            errors: 0,
            error_breakdown: ErrorBreakdown::default(),
            files_total,
            duration: Duration::ZERO,
        }
    }

    fn absorb(&mut self, outcome: EvalOutcome) {
        if let Some(kind) = outcome.error {
            self.errors += 1;
            self.error_breakdown.record(kind);
        } else if outcome.matched {
            self.matched_files.insert(outcome.file_id);
        }
    }

    /// Files in the corpus that did not match (including failed ones).
    pub fn unmatched<'a>(&'a self, all: &'a [FileId]) -> impl Iterator<Item = &'a FileId> + 'a {
        all.iter().filter(move |id| !self.matched_files.contains(*id))
    }
}

/// Evaluate `predicate` against every file in `corpus`.
///
/// Per-file faults are recorded and counted as non-matches. A corpus read
/// failure aborts the run with [`BatchError::CorpusAccess`]; cancellation
/// aborts it with [`BatchError::Cancelled`].
#[instrument(skip_all, fields(corpus = %corpus.describe(), workers = config.workers))]
pub async fn run_batch(
    predicate: Arc<CompiledPredicate>,
    corpus: Arc<dyn Corpus>,
    config: &BatchConfig,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<BatchOutcome, BatchError> {
    let started = Instant::now();
    let workers = config.workers.max(1);

    let listing = Arc::clone(&corpus);
    let entries = tokio::task::spawn_blocking(move || listing.entries())
        .await
        .map_err(|e| BatchError::Worker(e.to_string()))??;

    let total = entries.len() as u64;
    let mut result = BatchOutcome::new(total);
    let partition_len = partition_len(entries.len(), workers);
    let sem = Arc::new(Semaphore::new(workers));
    let watchdog = config.watchdog();
    let mut processed = 0u64;

    info!(files = total, partition_len, "batch started");

    for partition in entries.chunks(partition_len) {
        if cancel.is_cancelled() {
            info!(processed, total, "batch cancelled");
            return Err(BatchError::Cancelled { processed, total });
        }

        let mut tasks = JoinSet::new();
        for id in partition {
            tasks.spawn(evaluate_file(
                id.clone(),
                Arc::clone(&corpus),
                Arc::clone(&predicate),
                config.budget,
                watchdog,
                Arc::clone(&sem),
            ));
        }

        loop {
            let joined = tokio::select! {
                joined = tasks.join_next() => joined,
                _ = cancel.cancelled() => {
                    // Tasks still waiting for a permit are dropped here;
                    // evaluations already on the blocking pool run out.
                    tasks.abort_all();
                    info!(processed, total, "batch cancelled mid-partition");
                    return Err(BatchError::Cancelled { processed, total });
                }
            };
            let Some(joined) = joined else { break };
            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    tasks.abort_all();
                    warn!(error = %e, "batch aborted");
                    return Err(e);
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(BatchError::Worker(e.to_string()));
                }
            };
            processed += 1;
            result.absorb(outcome);
        }

        progress.checkpoint(processed, total);
    }

    result.duration = started.elapsed();
    METRICS.add_files_evaluated(processed);
    METRICS.add_evaluation_errors(result.errors);
    info!(
        matched = result.matched_files.len(),
        errors = result.errors,
        duration_ms = result.duration.as_millis() as u64,
        "batch finished"
    );
    Ok(result)
}

fn partition_len(files: usize, workers: usize) -> usize {
    let partitions = workers.saturating_mul(PARTITIONS_PER_WORKER).max(1);
    files.div_ceil(partitions).max(workers)
}

async fn evaluate_file(
    id: FileId,
    corpus: Arc<dyn Corpus>,
    predicate: Arc<CompiledPredicate>,
    budget: Budget,
    watchdog: Duration,
    sem: Arc<Semaphore>,
) -> Result<EvalOutcome, BatchError> {
    let permit = sem
        .acquire_owned()
        .await
        .map_err(|e| BatchError::Worker(e.to_string()))?;

    let read_id = id.clone();
    let record = tokio::task::spawn_blocking(move || corpus.read(&read_id))
        .await
        .map_err(|e| BatchError::Worker(e.to_string()))??;

    let started = Instant::now();
    // The permit travels with the blocking task so an abandoned evaluation
    // keeps its worker slot until it actually returns.
    let handle = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        sandbox::evaluate(&predicate, &record, &budget)
    });

    match tokio::time::timeout(watchdog, handle).await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => {
            warn!(file = %id, error = %e, "evaluation task failed");
            Ok(EvalOutcome::failed(
                id,
                EvalErrorKind::RuntimeTypeError,
                started.elapsed(),
            ))
        }
        Err(_) => {
            METRICS.inc_evaluations_abandoned();
            obs::emit_evaluation_abandoned(&id, watchdog);
            Ok(EvalOutcome::failed(id, EvalErrorKind::Timeout, watchdog))
        }
    }
}
