//! Per-file evaluation outcomes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::file::FileId;

/// Recoverable, file-scoped evaluation failure. Always treated as a
/// non-match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalErrorKind {
    /// The wall-clock deadline or step allowance ran out.
    Timeout,
    /// Type mismatch or other runtime fault (bad conversion, division by
    /// zero, index out of range).
    RuntimeTypeError,
    /// Derived allocations exceeded the memory ceiling.
    ResourceExceeded,
}

impl std::fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EvalErrorKind::Timeout => "timeout",
            EvalErrorKind::RuntimeTypeError => "runtime_type_error",
            EvalErrorKind::ResourceExceeded => "resource_exceeded",
        };
        f.write_str(s)
    }
}

/// Result of evaluating one predicate against one file.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    pub file_id: FileId,
    pub matched: bool,
    pub error: Option<EvalErrorKind>,
    pub elapsed: Duration,
}

impl EvalOutcome {
    pub fn matched(file_id: FileId, matched: bool, elapsed: Duration) -> Self {
        Self {
            file_id,
            matched,
            error: None,
            elapsed,
        }
    }

    pub fn failed(file_id: FileId, kind: EvalErrorKind, elapsed: Duration) -> Self {
        Self {
            file_id,
            matched: false,
            error: Some(kind),
            elapsed,
        }
    }
}

/// Error counts per kind for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBreakdown {
    pub timeout: u64,
    pub runtime_type_error: u64,
    pub resource_exceeded: u64,
}

impl ErrorBreakdown {
    pub fn record(&mut self, kind: EvalErrorKind) {
        match kind {
            EvalErrorKind::Timeout => self.timeout += 1,
            EvalErrorKind::RuntimeTypeError => self.runtime_type_error += 1,
            EvalErrorKind::ResourceExceeded => self.resource_exceeded += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.timeout + self.runtime_type_error + self.resource_exceeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_is_never_a_match() {
        let o = EvalOutcome::failed("a.txt".into(), EvalErrorKind::Timeout, Duration::ZERO);
        assert!(!o.matched);
        assert_eq!(o.error, Some(EvalErrorKind::Timeout));
    }

    #[test]
    fn breakdown_totals() {
        let mut b = ErrorBreakdown::default();
        b.record(EvalErrorKind::Timeout);
        b.record(EvalErrorKind::RuntimeTypeError);
        b.record(EvalErrorKind::RuntimeTypeError);
        assert_eq!(b.runtime_type_error, 2);
        assert_eq!(b.total(), 3);
    }
}
