//! The hypothesis search loop.
//!
//! Each iteration: sample files, ask the generator for a hypothesis, gate
//! it through the store, run it over the corpus, score it, and record the
//! result. Iterations are strictly sequential; only the batch run inside
//! an iteration is parallel.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::aggregator::RunAggregator;
use crate::batch::{run_batch, BatchError, BatchOutcome, ProgressSink};
use crate::cancel::CancellationToken;
use crate::collaborator::{
    with_retry, Excerpt, FallbackPolicy, GenerationRequest, HypothesisGenerator, NoFallback,
    Proposal, RoundRobinPool, ValidationJudge, ValidationRequest,
};
use crate::config::SessionConfig;
use crate::corpus::{self, Corpus, CorpusError};
use crate::domain::{
    AntidoteError, FileId, GroundTruthSet, Hypothesis, HypothesisId, Metrics, Result, RunId,
    RunResult,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::predicate::{compile, CompiledPredicate};
use crate::reporting::{
    self, RiskVerdict, RunRecord, SessionReport, SessionSummary, SkippedIteration,
};
use crate::sampler;
use crate::scoring;
use crate::store::{HypothesisStore, Rejected};

/// What one iteration produced.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    Completed(RunId),
    Skipped(String),
}

/// A search session: owns the hypothesis store and the run aggregator,
/// borrows its collaborators.
pub struct SearchSession {
    config: SessionConfig,
    corpus: Arc<dyn Corpus>,
    ground_truth: Option<GroundTruthSet>,
    generator: Arc<dyn HypothesisGenerator>,
    judge: Option<Arc<dyn ValidationJudge>>,
    fallback: Box<dyn FallbackPolicy>,
    store: HypothesisStore,
    aggregator: RunAggregator,
    rng: StdRng,
    session_id: Uuid,
    next_run: u64,
    skipped: Vec<SkippedIteration>,
}

impl SearchSession {
    pub fn new(
        config: SessionConfig,
        corpus: Arc<dyn Corpus>,
        generator: Arc<dyn HypothesisGenerator>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let fallback: Box<dyn FallbackPolicy> = if config.use_fallbacks {
            Box::new(RoundRobinPool::standard())
        } else {
            Box::new(NoFallback)
        };
        Self {
            config,
            corpus,
            ground_truth: None,
            generator,
            judge: None,
            fallback,
            store: HypothesisStore::new(),
            aggregator: RunAggregator::new(),
            rng,
            session_id: Uuid::new_v4(),
            next_run: 1,
            skipped: Vec::new(),
        }
    }

    pub fn with_ground_truth(mut self, ground_truth: GroundTruthSet) -> Self {
        self.ground_truth = Some(ground_truth);
        self
    }

    pub fn with_judge(mut self, judge: Arc<dyn ValidationJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn with_fallback(mut self, fallback: Box<dyn FallbackPolicy>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Continue from a previously persisted hypothesis log.
    pub fn with_store(mut self, store: HypothesisStore) -> Self {
        self.store = store;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn store(&self) -> &HypothesisStore {
        &self.store
    }

    pub fn aggregator(&self) -> &RunAggregator {
        &self.aggregator
    }

    /// Run all configured iterations and build the session report.
    ///
    /// Cancellation stops the session after discarding the in-flight run;
    /// the report then covers the runs completed so far. Corpus access
    /// failures abort the session.
    #[instrument(skip_all, fields(session_id = %self.session_id))]
    pub async fn run(
        &mut self,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        info!(
            corpus = %self.corpus.describe(),
            iterations = self.config.iterations,
            "session started"
        );

        let mut cancelled = false;
        for iteration in 1..=self.config.iterations {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            match self.run_iteration(iteration, progress, cancel).await {
                Ok(IterationOutcome::Completed(_)) => {}
                Ok(IterationOutcome::Skipped(reason)) => {
                    obs::emit_iteration_skipped(iteration, &reason);
                    self.skipped.push(SkippedIteration { iteration, reason });
                }
                Err(AntidoteError::Batch(BatchError::Cancelled { .. })) => {
                    cancelled = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let report = self.report(cancelled).await?;
        METRICS.flush();
        Ok(report)
    }

    /// One search iteration. Returns `Skipped` when no usable hypothesis
    /// could be obtained; errors are fatal for the session.
    pub async fn run_iteration(
        &mut self,
        iteration: u32,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<IterationOutcome> {
        let n = self.config.prompt_samples;
        let rng = self.rng.clone();
        let (samples, rng) = self
            .with_corpus(move |corpus| {
                let mut rng = rng;
                corpus::sample_files(corpus, n, &mut rng).map(|files| (files, rng))
            })
            .await?;
        self.rng = rng;
        let samples: Vec<Excerpt> = samples.iter().map(Excerpt::of).collect();

        let (hypothesis_id, predicate) = match self.obtain_hypothesis(iteration, samples).await {
            Some(accepted) => accepted,
            None => {
                return Ok(IterationOutcome::Skipped(
                    "no acceptable hypothesis".to_string(),
                ))
            }
        };
        obs::emit_run_started(iteration, hypothesis_id, predicate.source());

        let predicate = Arc::new(predicate);
        let outcome = run_batch(
            Arc::clone(&predicate),
            Arc::clone(&self.corpus),
            &self.config.batch,
            progress,
            cancel,
        )
        .await?;

        let description = self
            .store
            .get(hypothesis_id)
            .map(|h| h.description.clone())
            .unwrap_or_default();
        let (metrics, estimated) = self.score(&description, &outcome).await?;

        let run_id = RunId(self.next_run);
        self.next_run += 1;
        let result = RunResult {
            run_id,
            hypothesis_id,
            confidence: scoring::confidence(outcome.errors, outcome.files_total, estimated),
            matched_files: outcome.matched_files,
            errors: outcome.errors,
            error_breakdown: outcome.error_breakdown,
            files_total: outcome.files_total,
            metrics,
            estimated,
            duration: outcome.duration,
        };
        obs::emit_run_finished(&result);
        METRICS.inc_runs_completed();
        self.aggregator.record(result);
        Ok(IterationOutcome::Completed(run_id))
    }

    /// Ask the generator (with retries) for a proposal the store accepts,
    /// then fall back to the fallback policy.
    async fn obtain_hypothesis(
        &mut self,
        iteration: u32,
        samples: Vec<Excerpt>,
    ) -> Option<(HypothesisId, CompiledPredicate)> {
        let generator = Arc::clone(&self.generator);
        let mut request = GenerationRequest {
            iteration,
            samples,
            history: self.store.history_for_prompt(self.config.history_len),
            feedback: None,
        };

        for _ in 0..self.config.max_proposal_attempts {
            let proposed = with_retry(&self.config.retry, "propose", || {
                generator.propose(&request)
            })
            .await;
            let proposal = match proposed {
                Ok(p) => p,
                Err(e) => {
                    warn!(iteration, error = %e, "hypothesis generation failed");
                    break;
                }
            };
            match self.admit(iteration, &proposal) {
                Ok(accepted) => return Some(accepted),
                Err(rejected) => {
                    request.feedback = Some(format!(
                        "Your previous suggestion `{}` was rejected: {rejected}. Propose something substantially different.",
                        proposal.predicate_source
                    ));
                }
            }
        }

        for _ in 0..self.fallback.capacity() {
            let Some(proposal) = self.fallback.next_fallback() else {
                break;
            };
            if let Ok(accepted) = self.admit(iteration, &proposal) {
                info!(iteration, predicate = %proposal.predicate_source, "using fallback hypothesis");
                return Some(accepted);
            }
        }
        None
    }

    fn admit(
        &mut self,
        iteration: u32,
        proposal: &Proposal,
    ) -> std::result::Result<(HypothesisId, CompiledPredicate), Rejected> {
        let outcome = compile(&proposal.predicate_source)
            .map_err(Rejected::from)
            .and_then(|predicate| {
                self.store
                    .submit_compiled(&proposal.description, &predicate)
                    .map(|id| (id, predicate))
            });
        if let Err(rejected) = &outcome {
            obs::emit_hypothesis_rejected(iteration, rejected);
            METRICS.inc_hypotheses_rejected();
        }
        outcome
    }

    /// Exact metrics against ground truth, or validation estimates.
    async fn score(&mut self, description: &str, outcome: &BatchOutcome) -> Result<(Metrics, bool)> {
        if let Some(gt) = &self.ground_truth {
            return Ok((scoring::score(&outcome.matched_files, gt), false));
        }
        let Some(judge) = self.judge.clone() else {
            return Ok((Metrics::zero(), true));
        };

        let entries = self.with_corpus(|corpus| corpus.entries()).await?;
        let matched: Vec<FileId> = outcome.matched_files.iter().cloned().collect();
        let unmatched: Vec<FileId> = outcome.unmatched(&entries).cloned().collect();
        let batch = sampler::sample(
            &matched,
            &unmatched,
            self.config.validation_sample,
            &mut self.rng,
        );
        if batch.is_empty() {
            return Ok((Metrics::zero(), true));
        }

        let ids: Vec<FileId> = batch.files().cloned().collect();
        let files = self
            .with_corpus(move |corpus| {
                ids.iter()
                    .map(|id| corpus.read(id).map(|rec| Excerpt::of(&rec)))
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .await?;
        let request = ValidationRequest {
            hypothesis: description.to_string(),
            files,
        };
        let confirmations =
            match with_retry(&self.config.retry, "confirm", || judge.confirm(&request)).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "validation failed; reporting zero metrics");
                    return Ok((Metrics::zero(), true));
                }
            };

        let metrics = sampler::estimate(
            &batch,
            &confirmations,
            matched.len() as u64,
            unmatched.len() as u64,
        );
        Ok((metrics, true))
    }

    /// Run corpus I/O on the blocking pool.
    async fn with_corpus<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Corpus) -> std::result::Result<T, CorpusError> + Send + 'static,
        T: Send + 'static,
    {
        let corpus = Arc::clone(&self.corpus);
        let out = tokio::task::spawn_blocking(move || f(corpus.as_ref()))
            .await
            .map_err(|e| AntidoteError::Batch(BatchError::Worker(e.to_string())))??;
        Ok(out)
    }

    async fn report(&self, cancelled: bool) -> Result<SessionReport> {
        let corpus_size = self.with_corpus(|corpus| corpus.entries()).await?.len() as u64;

        let record = |r: &RunResult| self.store.get(r.hypothesis_id).map(|h| RunRecord::new(r, h));
        let runs: Vec<RunRecord> = self.aggregator.runs().iter().filter_map(record).collect();

        let best = self.aggregator.best(1).next();
        let summary = match best {
            Some(best) => SessionSummary {
                best: record(best),
                risk_verdict: RiskVerdict::from_counts(best.matched_count() as u64, corpus_size),
                matched_ratio: if corpus_size == 0 {
                    0.0
                } else {
                    best.matched_count() as f64 / corpus_size as f64
                },
                attack_types: self
                    .ground_truth
                    .as_ref()
                    .map(|gt| scoring::score_by_attack_type(&best.matched_files, gt)),
            },
            None => SessionSummary {
                best: None,
                risk_verdict: RiskVerdict::Clean,
                matched_ratio: 0.0,
                attack_types: None,
            },
        };

        Ok(SessionReport {
            schema_version: reporting::SCHEMA_VERSION.to_string(),
            session_id: self.session_id,
            generated_at: Utc::now(),
            corpus: self.corpus.describe(),
            corpus_size,
            iterations_requested: self.config.iterations,
            cancelled,
            runs,
            skipped: self.skipped.clone(),
            summary,
        })
    }

    /// Write the hypothesis log and report artifacts to the configured
    /// locations: one JSON record per run, `session.json`, and the best
    /// run's matched files in `matched_files.txt`.
    pub fn persist(&self, report: &SessionReport) -> anyhow::Result<()> {
        if let Some(path) = &self.config.store_path {
            self.store
                .save(path)
                .with_context(|| format!("save hypothesis log {:?}", path))?;
        }
        let Some(dir) = &self.config.output_dir else {
            return Ok(());
        };
        std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;
        for run in &report.runs {
            reporting::write_run_json(&dir.join(format!("{}.json", run.run_id)), run)?;
        }
        reporting::write_session_json(&dir.join("session.json"), report)?;
        if let Some(best) = self.aggregator.best(1).next() {
            reporting::write_matched_list(&dir.join("matched_files.txt"), &best.matched_files)?;
        }
        Ok(())
    }
}

/// Evaluate one predicate over a corpus and score it, outside a session.
/// Used by the CLI `eval` command and by harnesses.
pub async fn evaluate_once(
    source: &str,
    corpus: Arc<dyn Corpus>,
    config: &SessionConfig,
    ground_truth: Option<&GroundTruthSet>,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<(BatchOutcome, Option<Metrics>)> {
    let predicate = Arc::new(compile(source)?);
    let started = Instant::now();
    let outcome = run_batch(predicate, corpus, &config.batch, progress, cancel).await?;
    let metrics = ground_truth.map(|gt| scoring::score(&outcome.matched_files, gt));
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "evaluation finished");
    Ok((outcome, metrics))
}

/// Hypotheses of the best `n` runs, best first.
pub fn best_hypotheses(session: &SearchSession, n: usize) -> Vec<(&RunResult, &Hypothesis)> {
    session
        .aggregator
        .best(n)
        .filter_map(|r| session.store.get(r.hypothesis_id).map(|h| (r, h)))
        .collect()
}
