//! Crate-level error taxonomy for Antidote.
//!
//! Per-file evaluation faults never surface here; they are folded into
//! [`EvalOutcome`](super::outcome::EvalOutcome) and only reported as counts.

use crate::batch::BatchError;
use crate::collaborator::CollaboratorError;
use crate::config::ConfigError;
use crate::corpus::CorpusError;
use crate::predicate::CompileError;
use crate::store::StoreError;

/// Antidote domain errors.
#[derive(Debug, thiserror::Error)]
pub enum AntidoteError {
    #[error("predicate rejected: {0}")]
    Compile(#[from] CompileError),

    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("batch run failed: {0}")]
    Batch(#[from] BatchError),

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("hypothesis store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid ground truth: {0}")]
    GroundTruth(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Antidote domain operations.
pub type Result<T> = std::result::Result<T, AntidoteError>;
