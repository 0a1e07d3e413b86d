//! Predicate compiler.
//!
//! Turns externally generated filter expressions into a typed, side-effect
//! free AST over the two bound variables `name` and `content`. Everything
//! the evaluator can do is enumerated by [`ast::ExprKind`]; anything else
//! is rejected here with a positioned [`CompileError`].

pub mod ast;
mod canonical;
mod error;
mod lexer;
mod parser;

pub use error::{CompileError, CompileErrorKind, CompileResult};

use ast::Expr;

/// Maximum expression nesting depth.
pub const MAX_DEPTH: usize = 32;

/// Maximum predicate source length, in bytes.
pub const MAX_SOURCE_LEN: usize = 4096;

/// A validated predicate, ready for evaluation.
///
/// Immutable and `Send + Sync`; the batch executor shares one instance
/// between all workers behind an `Arc`.
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    root: Expr,
    source: String,
    canonical: String,
}

impl CompiledPredicate {
    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Source text exactly as submitted.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whitespace- and ordering-insensitive rendering, used for
    /// duplicate detection.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Hex SHA-256 of [`canonical`](Self::canonical).
    pub fn fingerprint(&self) -> String {
        canonical::fingerprint(&self.canonical)
    }
}

/// Compile a predicate source. Pure; never touches the host.
pub fn compile(source: &str) -> CompileResult<CompiledPredicate> {
    if source.len() > MAX_SOURCE_LEN {
        return Err(CompileError::disallowed(
            MAX_SOURCE_LEN,
            format!(
                "predicate is {} bytes, longer than the {MAX_SOURCE_LEN}-byte limit",
                source.len()
            ),
        ));
    }
    let root = parser::parse(source)?;
    let canonical = canonical::render(&root);
    tracing::trace!(canonical = %canonical, "predicate compiled");
    Ok(CompiledPredicate {
        root,
        source: source.to_string(),
        canonical,
    })
}
