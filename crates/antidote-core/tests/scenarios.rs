//! End-to-end scoring scenarios: compile, run over a corpus, score against
//! ground truth.

use std::sync::Arc;

use antidote_core::{
    evaluate_once, AttackType, CancellationToken, CompileErrorKind, Corpus, GroundTruthSet,
    HypothesisStore, InMemoryCorpus, Metrics, NoProgress, Rejected, SessionConfig,
};

fn five_files() -> Arc<dyn Corpus> {
    Arc::new(InMemoryCorpus::from_pairs([
        ("1.txt", "the quick brown fox"),
        ("2.txt", "jumps over"),
        ("3.txt", ""),
        ("4.txt", "the lazy dog"),
        ("5.txt", "and keeps running"),
    ]))
}

fn third_is_poisoned() -> GroundTruthSet {
    GroundTruthSet::new()
        .with_clean("1.txt")
        .with_clean("2.txt")
        .with_poisoned("3.txt", AttackType::Other("empty".into()))
        .with_clean("4.txt")
        .with_clean("5.txt")
}

async fn score(src: &str) -> Metrics {
    let gt = third_is_poisoned();
    let (_, metrics) = evaluate_once(
        src,
        five_files(),
        &SessionConfig::default(),
        Some(&gt),
        &NoProgress,
        &CancellationToken::new(),
    )
    .await
    .expect("evaluation succeeds");
    metrics.expect("ground truth supplied")
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-3
}

#[tokio::test]
async fn scenario_exact_detector() {
    let m = score("len(content) == 0").await;
    assert_eq!((m.precision, m.recall, m.f1), (1.0, 1.0, 1.0));
    assert_eq!(m.true_positive_count, 1);
}

#[tokio::test]
async fn scenario_everything_matches() {
    let m = score("len(content) >= 0").await;
    assert!(approx(m.precision, 0.2));
    assert!(approx(m.recall, 1.0));
    assert!(approx(m.f1, 0.333));
    assert_eq!(m.false_positive_count, 4);
}

#[tokio::test]
async fn scenario_nothing_matches() {
    let m = score("'zebra' in content").await;
    assert_eq!((m.precision, m.recall, m.f1), (0.0, 0.0, 0.0));
    assert_eq!(m.false_negative_count, 1);
}

#[test]
fn scenario_disallowed_construct_is_not_recorded() {
    let mut store = HypothesisStore::new();
    let err = store
        .submit("reads the disk", "open('/etc/passwd').read() != ''")
        .unwrap_err();
    match err {
        Rejected::Invalid(e) => assert_eq!(e.kind, CompileErrorKind::DisallowedConstruct),
        other => panic!("expected Invalid, got {other:?}"),
    }
    assert!(store.is_empty());
}

#[test]
fn duplicate_submission_is_rejected() {
    let mut store = HypothesisStore::new();
    let id = store.submit("empty files", "len(content) == 0").unwrap();
    for variant in ["len(content) == 0", "len( content )==0", "0 == len(content)"] {
        assert_eq!(
            store.submit("empty again", variant),
            Err(Rejected::Duplicate { matching_id: id })
        );
    }
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn same_predicate_same_corpus_same_result() {
    let src = "any(w in content for w in ['fox', 'dog']) or len(name) > 5";
    let gt = third_is_poisoned();
    let mut previous = None;
    for workers in [1, 2, 8] {
        let config = SessionConfig {
            batch: antidote_core::BatchConfig::default().with_workers(workers),
            ..SessionConfig::default()
        };
        let (outcome, metrics) = evaluate_once(
            src,
            five_files(),
            &config,
            Some(&gt),
            &NoProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        let current = (outcome.matched_files, outcome.errors, metrics);
        if let Some(prev) = &previous {
            assert_eq!(prev, &current);
        }
        previous = Some(current);
    }
}
