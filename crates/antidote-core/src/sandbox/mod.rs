//! Sandboxed evaluator.
//!
//! Evaluates a [`CompiledPredicate`] against one file under a [`Budget`].
//! The interpreter only implements allow-listed operations, so there is no
//! path from a predicate to host I/O, processes or the network. Every fault
//! is contained and reported as an [`EvalOutcome`] with `matched = false`.

mod budget;
mod builtins;
mod error;
mod interpreter;
mod value;

use std::time::Instant;

pub use budget::Budget;
pub use error::Fault;
pub use value::Value;

use crate::domain::{EvalOutcome, FileRecord};
use crate::predicate::CompiledPredicate;

/// Evaluate `predicate` against `file`. Deterministic for a given input,
/// apart from which budget check trips first under load.
pub fn evaluate(predicate: &CompiledPredicate, file: &FileRecord, budget: &Budget) -> EvalOutcome {
    let started = Instant::now();
    let result = evaluate_value(predicate, file, budget, started);
    let elapsed = started.elapsed();
    match result {
        Ok(value) => EvalOutcome::matched(file.id(), value.truthy(), elapsed),
        Err(fault) => {
            tracing::debug!(file = %file.name, error = %fault, "evaluation fault");
            EvalOutcome::failed(file.id(), fault.kind(), elapsed)
        }
    }
}

/// Evaluate and return the raw result value instead of its truthiness.
/// Used by the CLI to show what a predicate computes.
pub fn evaluate_value(
    predicate: &CompiledPredicate,
    file: &FileRecord,
    budget: &Budget,
    started: Instant,
) -> Result<Value, Fault> {
    interpreter::run(predicate.root(), file, budget, started)
}
