//! The search loop with scripted collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use antidote_core::reporting::RiskVerdict;
use antidote_core::{
    AttackType, BatchConfig, CancellationToken, CollaboratorError, Confidence, Confirmations,
    Corpus, CorpusError, FileId, FileRecord, GenerationRequest, GroundTruthSet, HypothesisGenerator, InMemoryCorpus, NoProgress,
    Proposal, RetryPolicy, SearchSession, SessionConfig, ValidationJudge, ValidationRequest,
};
use async_trait::async_trait;

type Script = VecDeque<Result<Proposal, CollaboratorError>>;

/// Replays a fixed script of answers and records every request it sees.
#[derive(Default)]
struct ScriptedGenerator {
    script: Mutex<Script>,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn new(script: Vec<Result<Proposal, CollaboratorError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<GenerationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HypothesisGenerator for ScriptedGenerator {
    async fn propose(&self, request: &GenerationRequest) -> Result<Proposal, CollaboratorError> {
        self.seen.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CollaboratorError::MalformedResponse("script empty".into())))
    }
}

/// Confirms a file as poisoned when its excerpt mentions a link.
struct LinkJudge;

#[async_trait]
impl ValidationJudge for LinkJudge {
    async fn confirm(&self, request: &ValidationRequest) -> Result<Confirmations, CollaboratorError> {
        Ok(request
            .files
            .iter()
            .map(|f| (f.name.as_str().into(), f.content.contains("http")))
            .collect())
    }
}

fn corpus() -> Arc<dyn Corpus> {
    Arc::new(InMemoryCorpus::from_pairs([
        ("1.txt", "hello there"),
        ("2.txt", "visit http://spam.example now"),
        ("3.txt", ""),
        ("4.txt", "a perfectly normal sentence"),
        ("5.txt", "more at https://x.example"),
    ]))
}

fn ground_truth() -> GroundTruthSet {
    GroundTruthSet::new()
        .with_clean("1.txt")
        .with_poisoned("2.txt", AttackType::SpamLinks)
        .with_clean("3.txt")
        .with_clean("4.txt")
        .with_poisoned("5.txt", AttackType::SpamLinks)
}

fn config(iterations: u32) -> SessionConfig {
    SessionConfig {
        iterations,
        seed: Some(7),
        use_fallbacks: false,
        max_proposal_attempts: 2,
        batch: BatchConfig::default().with_workers(2),
        retry: RetryPolicy {
            attempt_timeout_ms: 1_000,
            max_retries: 1,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
        },
        ..SessionConfig::default()
    }
}

fn ok(description: &str, src: &str) -> Result<Proposal, CollaboratorError> {
    Ok(Proposal::new(description, src))
}

#[tokio::test]
async fn loop_dedups_skips_and_ranks() {
    let generator = ScriptedGenerator::new(vec![
        // iteration 1
        ok("empty files", "len(content) == 0"),
        // iteration 2: duplicate, then a new idea
        ok("empty again", "0 == len( content )"),
        ok("links", "'http' in content"),
        // iteration 3: two uncompilable proposals
        ok("disk", "open('x') is None"),
        ok("dunder", "content.__len__() == 0"),
        // iteration 4: transport failures exhaust the retries
        Err(CollaboratorError::Transport("reset".into())),
        Err(CollaboratorError::Transport("reset".into())),
    ]);

    let mut session = SearchSession::new(config(4), corpus(), generator.clone())
        .with_ground_truth(ground_truth());
    let report = session
        .run(&NoProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.runs.len(), 2);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(
        report.skipped.iter().map(|s| s.iteration).collect::<Vec<_>>(),
        vec![3, 4]
    );
    assert_eq!(session.store().len(), 2);

    let best = report.summary.best.as_ref().unwrap();
    assert_eq!(best.hypothesis.predicate_source, "'http' in content");
    assert_eq!(best.metrics.f1, 1.0);
    assert_eq!(best.matched_count, 2);
    assert_eq!(report.summary.risk_verdict, RiskVerdict::High);
    let spam = &report.summary.attack_types.as_ref().unwrap()[&AttackType::SpamLinks];
    assert_eq!(spam.detected, 2);

    let requests = generator.requests();
    // 1 + 2 + 2, then one call retried once before giving up.
    assert_eq!(requests.len(), 7);
    assert!(requests[0].history.is_empty());
    assert!(requests[1].history.contains("empty files"));
    let feedback = requests[2].feedback.as_deref().unwrap();
    assert!(feedback.contains("duplicate"));
    assert!(requests.iter().all(|r| r.samples.len() == 5));
}

#[tokio::test]
async fn fallback_pool_keeps_the_loop_going() {
    let generator = ScriptedGenerator::new(vec![]);
    let cfg = SessionConfig {
        use_fallbacks: true,
        ..config(2)
    };
    let mut session =
        SearchSession::new(cfg, corpus(), generator).with_ground_truth(ground_truth());
    let report = session
        .run(&NoProgress, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.runs.len(), 2);
    assert!(report.skipped.is_empty());
    assert_ne!(
        report.runs[0].hypothesis.predicate_source,
        report.runs[1].hypothesis.predicate_source
    );
}

#[tokio::test]
async fn without_ground_truth_metrics_are_estimated() {
    let generator = ScriptedGenerator::new(vec![ok("links", "'://' in content")]);
    let mut session =
        SearchSession::new(config(1), corpus(), generator).with_judge(Arc::new(LinkJudge));
    let report = session
        .run(&NoProgress, &CancellationToken::new())
        .await
        .unwrap();
    let run = &report.runs[0];
    assert!(run.estimated);
    assert_eq!(run.confidence, Confidence::Estimated);
    assert_eq!(run.metrics.precision, 1.0);
    assert_eq!(run.metrics.recall, 1.0);
    assert!(report.summary.attack_types.is_none());
}

#[tokio::test]
async fn cancelled_session_reports_no_runs() {
    let generator = ScriptedGenerator::new(vec![ok("empty", "len(content) == 0")]);
    let token = CancellationToken::new();
    token.cancel();
    let mut session = SearchSession::new(config(3), corpus(), generator);
    let report = session.run(&NoProgress, &token).await.unwrap();
    assert!(report.cancelled);
    assert!(report.runs.is_empty());
    assert_eq!(report.summary.risk_verdict, RiskVerdict::Clean);
}

#[tokio::test]
async fn artifacts_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let generator = ScriptedGenerator::new(vec![ok("links", "'http' in content")]);
    let cfg = SessionConfig {
        output_dir: Some(dir.path().join("out")),
        store_path: Some(dir.path().join("hypotheses.json")),
        ..config(1)
    };
    let mut session =
        SearchSession::new(cfg, corpus(), generator).with_ground_truth(ground_truth());
    let report = session
        .run(&NoProgress, &CancellationToken::new())
        .await
        .unwrap();
    session.persist(&report).unwrap();

    let out = dir.path().join("out");
    assert!(out.join("session.json").exists());
    assert!(out.join("run-1.json").exists());
    assert_eq!(
        std::fs::read_to_string(out.join("matched_files.txt")).unwrap(),
        "2.txt\n5.txt\n"
    );
    let stored = antidote_core::HypothesisStore::load(&dir.path().join("hypotheses.json")).unwrap();
    assert_eq!(stored.len(), 1);
}

/// Listing waits for a flag that only an async task sets. On a
/// single-threaded runtime that task can run only if the listing itself is
/// off the runtime thread.
struct WaitsForRuntime {
    inner: InMemoryCorpus,
    ready: Arc<(Mutex<bool>, Condvar)>,
}

impl Corpus for WaitsForRuntime {
    fn entries(&self) -> Result<Vec<FileId>, CorpusError> {
        let (lock, cvar) = &*self.ready;
        let (ready, _) = cvar
            .wait_timeout_while(lock.lock().unwrap(), Duration::from_secs(5), |ready| !*ready)
            .unwrap();
        if !*ready {
            return Err(CorpusError::NotFound {
                path: "listing stalled".into(),
            });
        }
        drop(ready);
        self.inner.entries()
    }

    fn read(&self, id: &FileId) -> Result<FileRecord, CorpusError> {
        self.inner.read(id)
    }

    fn describe(&self) -> String {
        "waits-for-runtime".into()
    }
}

#[tokio::test]
async fn corpus_io_leaves_the_runtime_free() {
    let ready = Arc::new((Mutex::new(false), Condvar::new()));
    let opener = {
        let ready = Arc::clone(&ready);
        tokio::spawn(async move {
            *ready.0.lock().unwrap() = true;
            ready.1.notify_all();
        })
    };
    let corpus = Arc::new(WaitsForRuntime {
        inner: InMemoryCorpus::from_pairs([
            ("1.txt", "hello"),
            ("2.txt", "see http://a.example"),
            ("3.txt", "plain"),
        ]),
        ready,
    });
    let generator = ScriptedGenerator::new(vec![ok("links", "'://' in content")]);
    let mut session =
        SearchSession::new(config(1), corpus, generator).with_judge(Arc::new(LinkJudge));
    let report = session
        .run(&NoProgress, &CancellationToken::new())
        .await
        .unwrap();
    opener.await.unwrap();
    assert_eq!(report.runs.len(), 1);
    assert!(report.runs[0].estimated);
}
