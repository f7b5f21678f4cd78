//! Error types and the tri-modal error policy shared across the engine.

use thiserror::Error;

/// Controls how the engine reacts to non-fatal (per-result, per-template)
/// errors encountered while parsing a document. Ordered so policy
/// escalation is a single comparison: `policy >= ErrorPolicy::LogError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorPolicy {
    Ignore,
    LogError,
    AbortProcess,
}

/// Reports a non-fatal error according to the active `ErrorPolicy`.
pub(crate) struct ErrorReporter {
    policy: ErrorPolicy,
}

impl ErrorReporter {
    pub fn new(policy: ErrorPolicy) -> Self {
        ErrorReporter { policy }
    }

    /// Under `Ignore`, does nothing. Under `LogError`, writes to stderr.
    /// Under `AbortProcess`, returns `Err` so the caller can unwind via `?`.
    pub fn report(&self, msg: impl Into<String>) -> Result<(), RuntimeError> {
        match self.policy {
            ErrorPolicy::Ignore => Ok(()),
            ErrorPolicy::LogError => {
                eprintln!("error: {}", msg.into());
                Ok(())
            }
            ErrorPolicy::AbortProcess => Err(RuntimeError::Aborted(msg.into())),
        }
    }
}

/// Errors raised while compiling a `ParserDef`. All compile-time errors are
/// fatal — compilation is all-or-nothing.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid name `{0}`: must match [A-Za-z_]+")]
    InvalidName(String),

    #[error("duplicate query name `{0}`")]
    DuplicateName(String),

    #[error("reserved post-processing op `{0}` is not implemented")]
    ReservedOp(&'static str),

    #[error("malformed reference `{0}`")]
    MalformedReference(String),

    #[error("unresolved reference `{0}`")]
    UnresolvedReference(String),

    #[error("query group `{0}` has no subqueries")]
    EmptyQueryGroup(String),

    #[error("invalid regular expression `{0}`: {1}")]
    InvalidRegex(String, String),

    #[error("duplicate parser name `{0}`")]
    DuplicateParserName(String),
}

/// Errors raised while parsing a document under `ErrorPolicy::AbortProcess`,
/// or surfacing an otherwise-unrecoverable inconsistency.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{0}")]
    Aborted(String),

    #[error(transparent)]
    Dom(#[from] crate::dom::DomError),
}
