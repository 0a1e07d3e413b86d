//! Domain models for Antidote.
//!
//! Canonical definitions for the core entities:
//! - `Hypothesis`: an immutable theory plus its predicate source
//! - `FileRecord`: a read-only snapshot of one corpus entry
//! - `EvalOutcome`: the per-file result of one predicate evaluation
//! - `RunResult`: one full corpus pass, scored
//! - `GroundTruthSet`: authoritative poisoned/clean labels

pub mod error;
pub mod file;
pub mod ground_truth;
pub mod hypothesis;
pub mod outcome;
pub mod run;

// Re-export main types and errors
pub use error::{AntidoteError, Result};
pub use file::{FileId, FileRecord};
pub use ground_truth::{AttackType, GroundTruthLabel, GroundTruthSet};
pub use hypothesis::{Hypothesis, HypothesisId};
pub use outcome::{ErrorBreakdown, EvalErrorKind, EvalOutcome};
pub use run::{Confidence, Metrics, RunId, RunResult};
