use thiserror::Error;

/// Misuse of enter/exit, e.g. exiting a workflow that is not on the stack.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("workflow `{0}` is not active")]
    NotActive(String),
}

/// Raised when task code reads or mutates the current workflow outside of one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no workflow is active in the current task")]
pub struct ContextLookupError;
