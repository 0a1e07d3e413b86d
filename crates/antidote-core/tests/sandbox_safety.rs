//! Untrusted predicates and pathological content must be contained.

use std::sync::Arc;
use std::time::{Duration, Instant};

use antidote_core::predicate::MAX_DEPTH;
use antidote_core::{
    compile, evaluate, run_batch, BatchConfig, Budget, CancellationToken, CompileErrorKind,
    Corpus, EvalErrorKind, FileRecord, InMemoryCorpus, NoProgress,
};

#[test]
fn host_access_is_rejected_at_compile_time() {
    let attempts = [
        "__import__('os').system('rm -rf /')",
        "open('/etc/passwd')",
        "eval('1')",
        "exec('x = 1')",
        "content.__class__",
        "().__class__.__bases__[0].__subclasses__()",
        "globals()",
        "getattr(content, 'upper')",
        "lambda: 1",
        "(x := 1)",
        "import os",
        "re.compile('a')",
        "os.system('ls')",
        "re.search(content, name)",
        "type(content)",
        "content.encode()",
    ];
    for src in attempts {
        let err = compile(src).expect_err(src);
        assert!(
            matches!(
                err.kind,
                CompileErrorKind::DisallowedConstruct | CompileErrorKind::SyntaxError
            ),
            "{src}: {err}"
        );
    }
}

#[test]
fn deep_nesting_is_rejected() {
    let deep = format!("{}1{}", "(".repeat(MAX_DEPTH + 8), ")".repeat(MAX_DEPTH + 8));
    let err = compile(&format!("len(content) > {deep}")).unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::DepthExceeded);

    let nots = format!("{}True", "not ".repeat(200));
    assert_eq!(compile(&nots).unwrap_err().kind, CompileErrorKind::DepthExceeded);
}

#[test]
fn ten_megabytes_of_symbols_stay_within_budget() {
    let content = "{[(<".repeat(10 * 1024 * 1024 / 4);
    let file = FileRecord::from_text("bomb.txt", content);
    let budget = Budget::default();

    for src in [
        "sum(1 for c in content if c == '{') > 10",
        "len([c for c in content if c in '{[']) > 0",
        "content.count('{[') > 0 and content.lower() == content",
        "len(re.findall('[{]', content)) > 0",
        "content * 3 == content",
        "len(content.split('(')) > 1",
    ] {
        let p = compile(src).unwrap();
        let started = Instant::now();
        let outcome = evaluate(&p, &file, &budget);
        // Generous bound: a small constant factor of the 50 ms budget even
        // on a loaded debug build.
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "{src} took {:?}",
            started.elapsed()
        );
        if outcome.error.is_none() {
            continue;
        }
        assert!(!outcome.matched, "{src}");
    }
}

#[test]
fn deeply_nested_brackets_in_content_are_just_data() {
    let content = format!("{}{}", "[".repeat(100_000), "]".repeat(100_000));
    let file = FileRecord::from_text("nested.txt", content);
    let p = compile("content.startswith('[[[') and content.endswith(']]]')").unwrap();
    let outcome = evaluate(&p, &file, &Budget::default());
    assert_eq!(outcome.error, None);
    assert!(outcome.matched);
}

#[test]
fn exhausted_budget_is_a_timeout_not_a_crash() {
    let file = FileRecord::from_text("f.txt", "ab".repeat(100_000));
    let p = compile("all(any(a == b for b in content) for a in content)").unwrap();
    let outcome = evaluate(&p, &file, &Budget::default());
    assert_eq!(outcome.error, Some(EvalErrorKind::Timeout));
    assert!(!outcome.matched);
}

#[tokio::test]
async fn one_bad_file_does_not_spoil_the_batch() {
    let mut corpus = InMemoryCorpus::from_pairs((0..20).map(|i| (format!("{i}.txt"), "ok")));
    corpus.insert(FileRecord::from_text("bomb.txt", "x".repeat(4_000_000)));
    let corpus: Arc<dyn Corpus> = Arc::new(corpus);

    let p = Arc::new(compile("len([c for c in content]) < 10").unwrap());
    let out = run_batch(
        p,
        corpus,
        &BatchConfig::default().with_workers(4),
        &NoProgress,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(out.files_total, 21);
    assert_eq!(out.matched_files.len(), 20);
    assert_eq!(out.errors, 1);
}

#[tokio::test]
async fn repeating_an_empty_list_finishes_the_batch() {
    let corpus: Arc<dyn Corpus> = Arc::new(InMemoryCorpus::from_pairs(
        (0..6).map(|i| (format!("{i}.txt"), "text")),
    ));
    let p = Arc::new(compile("len([] * 9223372036854775807) == 0").unwrap());
    let cfg = BatchConfig::default().with_workers(1);
    let cancel = CancellationToken::new();
    let run = run_batch(p, corpus, &cfg, &NoProgress, &cancel);
    let out = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("batch did not finish")
        .unwrap();
    assert_eq!(out.files_total, 6);
    assert_eq!(out.errors, 0);
    assert_eq!(out.matched_files.len(), 6);
}

#[test]
fn repeated_lists_are_charged_per_copy() {
    let file = FileRecord::from_text("f.txt", "abc");
    let budget = Budget::default();
    for (src, expected) in [
        ("len([1] * 10000000) > 0", EvalErrorKind::ResourceExceeded),
        ("len([[]] * 9223372036854775807) > 0", EvalErrorKind::ResourceExceeded),
    ] {
        let started = Instant::now();
        let outcome = evaluate(&compile(src).unwrap(), &file, &budget);
        assert_eq!(outcome.error, Some(expected), "{src}");
        assert!(started.elapsed() < Duration::from_secs(2), "{src}");
    }
}

#[test]
fn rendering_a_large_list_hits_the_ceiling_first() {
    let file = FileRecord::from_text("big.txt", "x".repeat(100_000));
    let p = compile("len(str([content] * 2000)) > 0").unwrap();
    let started = Instant::now();
    let outcome = evaluate(&p, &file, &Budget::default());
    assert_eq!(outcome.error, Some(EvalErrorKind::ResourceExceeded));
    assert!(!outcome.matched);
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "took {:?}",
        started.elapsed()
    );
}

#[test]
fn failed_conversions_of_large_strings_stay_cheap() {
    let file = FileRecord::from_text("big.txt", "z".repeat(2_000_000));
    for src in ["int(content) > 0", "float(content) > 0"] {
        let outcome = evaluate(&compile(src).unwrap(), &file, &Budget::default());
        assert_eq!(outcome.error, Some(EvalErrorKind::RuntimeTypeError), "{src}");
    }
}
