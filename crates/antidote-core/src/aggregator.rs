//! Ranking of completed runs across a session.

use std::cmp::Ordering;

use crate::domain::{RunId, RunResult};

/// Collects run results and ranks them by F1, then recall, then run id.
///
/// The ranking is kept incrementally on [`record`](Self::record), so
/// [`best`](Self::best) never sorts and never mutates.
#[derive(Debug, Default, Clone)]
pub struct RunAggregator {
    results: Vec<RunResult>,
    ranked: Vec<usize>,
}

fn rank_order(a: &RunResult, b: &RunResult) -> Ordering {
    b.metrics
        .f1
        .total_cmp(&a.metrics.f1)
        .then_with(|| b.metrics.recall.total_cmp(&a.metrics.recall))
        .then_with(|| a.run_id.cmp(&b.run_id))
}

impl RunAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: RunResult) {
        let index = self.results.len();
        let slot = self
            .ranked
            .partition_point(|&i| rank_order(&self.results[i], &result) == Ordering::Less);
        self.results.push(result);
        self.ranked.insert(slot, index);
    }

    /// The top `n` runs, best first. The iterator is lazy and can be
    /// cloned to restart from the current position.
    pub fn best(&self, n: usize) -> Best<'_> {
        Best {
            results: &self.results,
            order: self.ranked.iter().take(n),
        }
    }

    /// All runs in the order they were recorded.
    pub fn runs(&self) -> &[RunResult] {
        &self.results
    }

    pub fn get(&self, run_id: RunId) -> Option<&RunResult> {
        self.results.iter().find(|r| r.run_id == run_id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Iterator returned by [`RunAggregator::best`].
#[derive(Debug, Clone)]
pub struct Best<'a> {
    results: &'a [RunResult],
    order: std::iter::Take<std::slice::Iter<'a, usize>>,
}

impl<'a> Iterator for Best<'a> {
    type Item = &'a RunResult;

    fn next(&mut self) -> Option<Self::Item> {
        self.order.next().map(|&i| &self.results[i])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl ExactSizeIterator for Best<'_> {}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use super::*;
    use crate::domain::{Confidence, ErrorBreakdown, HypothesisId, Metrics};

    fn run(id: u64, tp: u64, fp: u64, fn_: u64) -> RunResult {
        RunResult {
            run_id: RunId(id),
            hypothesis_id: HypothesisId(id),
            matched_files: BTreeSet::new(),
            errors: 0,
            error_breakdown: ErrorBreakdown::default(),
            files_total: 10,
            metrics: Metrics::from_counts(tp, fp, fn_),
            estimated: false,
            confidence: Confidence::Exact,
            duration: Duration::ZERO,
        }
    }

    fn ids(agg: &RunAggregator, n: usize) -> Vec<u64> {
        agg.best(n).map(|r| r.run_id.0).collect()
    }

    #[test]
    fn ranks_by_f1_then_recall_then_run_id() {
        let mut agg = RunAggregator::new();
        agg.record(run(1, 1, 1, 1)); // p .5 r .5
        agg.record(run(2, 2, 0, 0)); // perfect
        agg.record(run(3, 1, 0, 3)); // p 1 r .25 f1 .4
        agg.record(run(4, 1, 1, 1)); // ties with 1
        agg.record(run(5, 0, 3, 2)); // zero
        assert_eq!(ids(&agg, 10), vec![2, 1, 4, 3, 5]);
    }

    #[test]
    fn best_is_bounded_and_restartable() {
        let mut agg = RunAggregator::new();
        for i in 1..=5 {
            agg.record(run(i, i, 5 - i, 0));
        }
        let mut top = agg.best(3);
        assert_eq!(top.len(), 3);
        let first = top.next().unwrap().run_id;
        let rest = top.clone();
        assert_eq!(rest.count(), 2);
        assert_eq!(top.count(), 2);
        assert_eq!(first, RunId(5));
        assert_eq!(agg.best(0).count(), 0);
    }
}
