//! Fallback hypotheses used when the generator cannot deliver one.

use super::Proposal;

/// Supplies a replacement proposal when generation is exhausted.
pub trait FallbackPolicy: Send + Sync {
    fn next_fallback(&mut self) -> Option<Proposal>;

    /// Upper bound on how many distinct proposals this policy can yield.
    fn capacity(&self) -> usize;
}

/// Never falls back; a failed iteration is simply skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

impl FallbackPolicy for NoFallback {
    fn next_fallback(&mut self) -> Option<Proposal> {
        None
    }

    fn capacity(&self) -> usize {
        0
    }
}

/// Cycles through a fixed pool of proposals.
#[derive(Debug, Clone)]
pub struct RoundRobinPool {
    pool: Vec<Proposal>,
    next: usize,
}

impl RoundRobinPool {
    pub fn new(pool: Vec<Proposal>) -> Self {
        Self { pool, next: 0 }
    }

    /// Simple structural heuristics over file names and content.
    pub fn standard() -> Self {
        Self::new(vec![
            Proposal::new(
                "files with an even number as their name",
                "name.split('.')[0].isdigit() and int(name.split('.')[0]) % 2 == 0",
            ),
            Proposal::new(
                "files with an odd number as their name",
                "name.split('.')[0].isdigit() and int(name.split('.')[0]) % 2 == 1",
            ),
            Proposal::new(
                "file names containing unusual punctuation",
                "any(not c.isalnum() and c not in '._-' for c in name)",
            ),
            Proposal::new(
                "files containing non-ASCII characters",
                "not content.isascii()",
            ),
            Proposal::new(
                "files that are empty or whitespace only",
                "len(content.strip()) == 0",
            ),
            Proposal::new(
                "files containing links",
                "'http://' in content or 'https://' in content",
            ),
        ])
    }
}

impl FallbackPolicy for RoundRobinPool {
    fn next_fallback(&mut self) -> Option<Proposal> {
        if self.pool.is_empty() {
            return None;
        }
        let proposal = self.pool[self.next % self.pool.len()].clone();
        self.next = self.next.wrapping_add(1);
        Some(proposal)
    }

    fn capacity(&self) -> usize {
        self.pool.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::compile;

    #[test]
    fn round_robin_cycles() {
        let mut pool = RoundRobinPool::new(vec![Proposal::new("a", "True"), Proposal::new("b", "False")]);
        let seq: Vec<_> = (0..3)
            .filter_map(|_| pool.next_fallback())
            .map(|p| p.description)
            .collect();
        assert_eq!(seq, vec!["a", "b", "a"]);
        assert_eq!(NoFallback.next_fallback(), None);
        assert_eq!(RoundRobinPool::new(vec![]).next_fallback(), None);
    }

    #[test]
    fn standard_pool_compiles() {
        let pool = RoundRobinPool::standard();
        for p in &pool.pool {
            compile(&p.predicate_source).unwrap_or_else(|e| panic!("{}: {e}", p.predicate_source));
        }
    }
}
