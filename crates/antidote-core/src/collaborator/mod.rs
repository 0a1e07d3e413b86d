//! Ports to the external collaborators of the search loop.
//!
//! Hypothesis text generation and validation judgement are delegated to an
//! external model invoked as a black box. The pipeline only sees these
//! traits; `antidote-llm` provides the HTTP implementation and tests use
//! scripted mocks.

mod fallback;
mod retry;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use fallback::{FallbackPolicy, NoFallback, RoundRobinPool};
pub use retry::{with_retry, RetryPolicy};

use crate::domain::FileRecord;
use crate::sampler::Confirmations;

/// Excerpt length, in characters, of file content shown to collaborators.
pub const EXCERPT_CHARS: usize = 1000;

/// A `(name, content excerpt)` pair shown to a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Excerpt {
    pub name: String,
    pub content: String,
}

impl Excerpt {
    /// Excerpt of `record`, truncated to [`EXCERPT_CHARS`] with a `...`
    /// marker.
    pub fn of(record: &FileRecord) -> Self {
        Self {
            name: record.name.to_string(),
            content: record.excerpt(EXCERPT_CHARS),
        }
    }
}

/// Everything a generator is told for one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// 1-based iteration number.
    pub iteration: u32,
    pub samples: Vec<Excerpt>,
    /// Recent hypotheses, already formatted for the prompt.
    pub history: String,
    /// Feedback on the previous attempt in this iteration, if it was
    /// rejected (duplicate or uncompilable).
    pub feedback: Option<String>,
}

/// A generator's answer: a theory and the predicate that tests it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub description: String,
    pub predicate_source: String,
}

impl Proposal {
    pub fn new(description: impl Into<String>, predicate_source: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            predicate_source: predicate_source.into(),
        }
    }
}

/// Files a judge is asked to confirm as poisoned or clean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub hypothesis: String,
    pub files: Vec<Excerpt>,
}

/// Failure talking to an external collaborator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("collaborator timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<CollaboratorError>,
    },
}

impl CollaboratorError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CollaboratorError::Exhausted { .. })
    }
}

/// Proposes the next hypothesis.
#[async_trait]
pub trait HypothesisGenerator: Send + Sync {
    async fn propose(&self, request: &GenerationRequest) -> Result<Proposal, CollaboratorError>;
}

/// Confirms whether sampled files are actually poisoned.
#[async_trait]
pub trait ValidationJudge: Send + Sync {
    /// Verdict per file; files missing from the answer are treated as
    /// unjudged.
    async fn confirm(&self, request: &ValidationRequest)
        -> Result<Confirmations, CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_is_truncated_with_marker() {
        let rec = FileRecord::from_text("long.txt", "a".repeat(EXCERPT_CHARS + 5));
        let ex = Excerpt::of(&rec);
        assert_eq!(ex.content.len(), EXCERPT_CHARS + 3);
        assert!(ex.content.ends_with("..."));
    }

    #[test]
    fn exhausted_is_terminal() {
        let err = CollaboratorError::Exhausted {
            attempts: 3,
            last: Box::new(CollaboratorError::Timeout),
        };
        assert!(!err.is_retryable());
        assert!(CollaboratorError::Transport("reset".into()).is_retryable());
        assert!(err.to_string().contains("3 attempts"));
    }
}
