//! Append-only record of every hypothesis tried in a session.
//!
//! Submissions are normalized by compiling the predicate and fingerprinting
//! its canonical form, so resubmitting the same predicate with different
//! whitespace, operand order or description is rejected as a duplicate.
//! Duplicate detection is a best-effort heuristic: semantically equal
//! predicates with different shapes are not caught.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Hypothesis, HypothesisId};
use crate::predicate::{compile, CompileError, CompiledPredicate};

/// Why a submission was not recorded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejected {
    #[error("duplicate of hypothesis {matching_id}")]
    Duplicate { matching_id: HypothesisId },

    #[error("invalid predicate: {0}")]
    Invalid(#[from] CompileError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access hypothesis log {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed hypothesis log: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct StoreFile {
    hypotheses: Vec<Hypothesis>,
}

/// Session-owned hypothesis log. Mutation requires `&mut self`, so there is
/// a single writer by construction.
#[derive(Debug, Default)]
pub struct HypothesisStore {
    hypotheses: Vec<Hypothesis>,
    by_fingerprint: HashMap<String, HypothesisId>,
}

impl HypothesisStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and record a hypothesis. Invalid predicates are not recorded.
    pub fn submit(
        &mut self,
        description: &str,
        predicate_source: &str,
    ) -> Result<HypothesisId, Rejected> {
        let compiled = compile(predicate_source)?;
        self.submit_compiled(description, &compiled)
    }

    /// Record a hypothesis whose predicate the caller already compiled.
    pub fn submit_compiled(
        &mut self,
        description: &str,
        predicate: &CompiledPredicate,
    ) -> Result<HypothesisId, Rejected> {
        let fingerprint = predicate.fingerprint();
        if let Some(&matching_id) = self.by_fingerprint.get(&fingerprint) {
            debug!(%matching_id, canonical = predicate.canonical(), "duplicate hypothesis");
            return Err(Rejected::Duplicate { matching_id });
        }

        let id = HypothesisId(self.hypotheses.len() as u64 + 1);
        self.by_fingerprint.insert(fingerprint.clone(), id);
        self.hypotheses.push(Hypothesis {
            id,
            description: description.trim().to_string(),
            predicate_source: predicate.source().to_string(),
            fingerprint,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    /// Whether an equivalent predicate has already been recorded.
    pub fn contains(&self, predicate: &CompiledPredicate) -> Option<HypothesisId> {
        self.by_fingerprint.get(&predicate.fingerprint()).copied()
    }

    pub fn get(&self, id: HypothesisId) -> Option<&Hypothesis> {
        let index = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.hypotheses.get(index)
    }

    pub fn all(&self) -> &[Hypothesis] {
        &self.hypotheses
    }

    pub fn len(&self) -> usize {
        self.hypotheses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hypotheses.is_empty()
    }

    /// The most recent `max` hypotheses formatted for a generator prompt,
    /// oldest first. Empty when nothing has been tried.
    pub fn history_for_prompt(&self, max: usize) -> String {
        if self.hypotheses.is_empty() || max == 0 {
            return String::new();
        }
        let start = self.hypotheses.len().saturating_sub(max);
        let mut out = String::from("Previous hypotheses (do not repeat these):\n");
        for (i, h) in self.hypotheses[start..].iter().enumerate() {
            out.push_str(&format!(
                "{}. {}\n   predicate: {}\n",
                i + 1,
                h.description,
                h.predicate_source
            ));
        }
        out
    }

    /// Load a log written by [`save`](Self::save). A missing file yields an
    /// empty store. Fingerprints are taken from the file as written.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let file: StoreFile = serde_json::from_str(&raw)?;
        let mut store = Self::new();
        for h in file.hypotheses {
            store.by_fingerprint.entry(h.fingerprint.clone()).or_insert(h.id);
            store.hypotheses.push(h);
        }
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let file = StoreFile {
            hypotheses: self.hypotheses.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, json).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::CompileErrorKind;

    #[test]
    fn ids_are_ordinal() {
        let mut store = HypothesisStore::new();
        assert_eq!(store.submit("empty", "len(content) == 0").unwrap(), HypothesisId(1));
        assert_eq!(store.submit("big", "len(content) > 100").unwrap(), HypothesisId(2));
        assert_eq!(store.get(HypothesisId(2)).unwrap().description, "big");
        assert!(store.get(HypothesisId(0)).is_none());
    }

    #[test]
    fn trivially_equivalent_resubmission_is_a_duplicate() {
        let mut store = HypothesisStore::new();
        let first = store
            .submit("spam", "'http' in content and len(content) > 10")
            .unwrap();
        let err = store
            .submit("same idea", "len(content)>10 and 'http' in content")
            .unwrap_err();
        assert_eq!(err, Rejected::Duplicate { matching_id: first });
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn invalid_predicates_are_not_recorded() {
        let mut store = HypothesisStore::new();
        let err = store.submit("sneaky", "__import__('os')").unwrap_err();
        match err {
            Rejected::Invalid(e) => assert_eq!(e.kind, CompileErrorKind::DisallowedConstruct),
            other => panic!("unexpected {other:?}"),
        }
        assert!(store.is_empty());
    }

    #[test]
    fn history_lists_most_recent_first_to_last() {
        let mut store = HypothesisStore::new();
        for (i, src) in ["len(content) == 0", "len(content) == 1", "len(content) == 2"]
            .iter()
            .enumerate()
        {
            store.submit(&format!("theory {i}"), src).unwrap();
        }
        let history = store.history_for_prompt(2);
        assert!(!history.contains("theory 0"));
        let a = history.find("theory 1").unwrap();
        let b = history.find("theory 2").unwrap();
        assert!(a < b);
        assert_eq!(HypothesisStore::new().history_for_prompt(5), "");
    }

    #[test]
    fn save_and_load_preserve_duplicate_detection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hypotheses.json");
        let mut store = HypothesisStore::new();
        store.submit("empty", "len(content) == 0").unwrap();
        store.save(&path).unwrap();

        let mut loaded = HypothesisStore::load(&path).unwrap();
        assert_eq!(loaded.all(), store.all());
        assert!(matches!(
            loaded.submit("again", "0 == len(content)"),
            Err(Rejected::Duplicate { .. })
        ));
        assert_eq!(loaded.submit("new", "len(name) > 3").unwrap(), HypothesisId(2));
    }

    #[test]
    fn missing_log_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HypothesisStore::load(&dir.path().join("absent.json")).unwrap();
        assert!(store.is_empty());
    }
}
