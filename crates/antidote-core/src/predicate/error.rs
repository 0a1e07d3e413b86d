//! Error types for the predicate compiler.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a predicate source was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileErrorKind {
    /// The source is not a well-formed expression.
    SyntaxError,
    /// The source is well-formed but uses something outside the allow list.
    DisallowedConstruct,
    /// Expression nesting exceeds [`MAX_DEPTH`](super::MAX_DEPTH).
    DepthExceeded,
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompileErrorKind::SyntaxError => "syntax error",
            CompileErrorKind::DisallowedConstruct => "disallowed construct",
            CompileErrorKind::DepthExceeded => "nesting depth exceeded",
        };
        f.write_str(s)
    }
}

/// A rejected predicate, with the byte offset where the problem was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} at byte {position}: {message}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub position: usize,
    pub message: String,
}

impl CompileError {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self {
            kind: CompileErrorKind::SyntaxError,
            position,
            message: message.into(),
        }
    }

    pub fn disallowed(position: usize, message: impl Into<String>) -> Self {
        Self {
            kind: CompileErrorKind::DisallowedConstruct,
            position,
            message: message.into(),
        }
    }

    pub fn depth(position: usize, limit: usize) -> Self {
        Self {
            kind: CompileErrorKind::DepthExceeded,
            position,
            message: format!("expression nests deeper than {limit} levels"),
        }
    }

    /// Render the source line with a caret under the error position.
    pub fn render(&self, source: &str) -> String {
        let pos = self.position.min(source.len());
        let line_start = source[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = source[pos..]
            .find('\n')
            .map(|i| pos + i)
            .unwrap_or(source.len());
        let column = source[line_start..pos].chars().count();
        format!(
            "{}\n{}^ {}",
            &source[line_start..line_end],
            " ".repeat(column),
            self
        )
    }
}

/// Result type for compilation.
pub type CompileResult<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_position() {
        let err = CompileError::disallowed(4, "unknown identifier `open`");
        let msg = err.to_string();
        assert!(msg.contains("disallowed construct"));
        assert!(msg.contains("byte 4"));
        assert!(msg.contains("open"));
    }

    #[test]
    fn test_render_points_at_column() {
        let err = CompileError::syntax(6, "unexpected token");
        let rendered = err.render("len(x) ==");
        let caret_line = rendered.lines().nth(1).unwrap();
        assert!(caret_line.starts_with("      ^"));
    }
}
