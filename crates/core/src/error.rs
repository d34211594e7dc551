use std::path::PathBuf;

/// Domain-level errors raised by `codesys_core`.
///
/// Only the precondition variants ever escape [`ScriptInvoker::invoke`];
/// everything that happens after a process could have been spawned is folded
/// into an [`InvocationResult`] instead.
///
/// [`ScriptInvoker::invoke`]: crate::scripting::executor::ScriptInvoker::invoke
/// [`InvocationResult`]: crate::scripting::executor::InvocationResult
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Missing parameter: {0} was not provided")]
    MissingParameter(&'static str),

    #[error("CODESYS executable not found at provided path: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Failed to load script template '{name}': {message}")]
    Template { name: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// True for errors raised before any process was spawned because the
    /// caller supplied unusable invocation parameters.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::MissingParameter(_) | Self::ExecutableNotFound(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
