//! Property tests: metric bounds and evaluator robustness.

use std::collections::BTreeSet;

use antidote_core::scoring::score;
use antidote_core::{compile, evaluate, AttackType, Budget, FileId, FileRecord, GroundTruthSet};
use proptest::prelude::*;

fn unit(x: f64) -> bool {
    x.is_finite() && (0.0..=1.0).contains(&x)
}

proptest! {
    #[test]
    fn metrics_stay_in_unit_interval(
        matched in proptest::collection::btree_set(0u16..200, 0..120),
        poisoned in proptest::collection::btree_set(0u16..200, 0..120),
    ) {
        let matched: BTreeSet<FileId> = matched.iter().map(|i| FileId(format!("{i}"))).collect();
        let mut gt = GroundTruthSet::new();
        for i in &poisoned {
            gt = gt.with_poisoned(FileId(format!("{i}")), AttackType::SpamLinks);
        }
        let m = score(&matched, &gt);
        prop_assert!(unit(m.precision));
        prop_assert!(unit(m.recall));
        prop_assert!(unit(m.f1));
        prop_assert!(m.f1 <= m.precision.max(m.recall) + 1e-12);
        if matched.is_empty() {
            prop_assert_eq!(m.precision, 0.0);
            prop_assert_eq!(m.f1, 0.0);
        }
    }

    #[test]
    fn evaluation_never_panics_on_arbitrary_content(content in ".{0,400}", name in "[a-z0-9._-]{1,20}") {
        let predicates = [
            "len(content) > 3 and content[0] == content[-1]",
            "int(content) > 0",
            "sum(ord(c) for c in content) % 7 == 0",
            "content.split()[1] in name",
            "re.search('[A-Z]{2,}', content)",
            "max(content) > 'm'",
            "float(name) < 1",
        ];
        let file = FileRecord::from_text(name, content);
        for src in predicates {
            let p = compile(src).unwrap();
            let a = evaluate(&p, &file, &Budget::default());
            let b = evaluate(&p, &file, &Budget::default());
            prop_assert_eq!(a.matched, b.matched);
            prop_assert_eq!(a.error, b.error);
            if a.error.is_some() {
                prop_assert!(!a.matched);
            }
        }
    }

    #[test]
    fn compiler_never_panics(src in "\\PC{0,80}") {
        let _ = compile(&src);
    }
}
