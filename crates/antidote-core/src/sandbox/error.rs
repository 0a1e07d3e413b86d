use crate::domain::EvalErrorKind;

/// Why an evaluation stopped early. Never escapes the sandbox: the
/// evaluator folds it into an [`EvalOutcome`](crate::domain::EvalOutcome).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Fault {
    #[error("evaluation budget exhausted")]
    Timeout,

    #[error("derived allocations exceeded the {ceiling}-byte ceiling")]
    ResourceExceeded { ceiling: u64 },

    #[error("{0}")]
    Runtime(String),
}

impl Fault {
    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Fault::Runtime(message.into())
    }

    pub fn kind(&self) -> EvalErrorKind {
        match self {
            Fault::Timeout => EvalErrorKind::Timeout,
            Fault::ResourceExceeded { .. } => EvalErrorKind::ResourceExceeded,
            Fault::Runtime(_) => EvalErrorKind::RuntimeTypeError,
        }
    }
}
