//! Hypothesis records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordinal identifier assigned by the hypothesis store, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HypothesisId(pub u64);

impl fmt::Display for HypothesisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// A natural-language theory plus the predicate that tests it.
///
/// Immutable once stored: the store only ever appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: HypothesisId,

    /// Human-readable theory, e.g. "files containing zero-width characters".
    pub description: String,

    /// Predicate source exactly as submitted.
    pub predicate_source: String,

    /// SHA-256 hex digest of the canonical predicate form.
    pub fingerprint: String,

    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hypothesis_id_display() {
        assert_eq!(HypothesisId(7).to_string(), "h7");
    }

    #[test]
    fn test_hypothesis_serde_roundtrip() {
        let h = Hypothesis {
            id: HypothesisId(1),
            description: "empty files".into(),
            predicate_source: "len(content) == 0".into(),
            fingerprint: "abc".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&h).expect("serialize");
        let back: Hypothesis = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(h, back);
    }
}
