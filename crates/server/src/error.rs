use codesys_core::error::CoreError;
use serde::Serialize;

/// Application-level error type for request handling.
///
/// Wraps [`CoreError`] for domain errors and adds protocol-specific
/// variants. [`AppError::to_body`] produces the `{ "error", "code" }` object
/// sent back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `codesys_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A request line that could not be understood.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A request naming a tool that does not exist.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Reading requests or writing responses failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// Error payload returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl AppError {
    /// Map this error to its wire representation. Internal details are
    /// logged, not returned.
    pub fn to_body(&self) -> ErrorBody {
        let (code, message) = match self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::MissingParameter(_) | CoreError::ExecutableNotFound(_) => {
                    ("PRECONDITION_FAILED", core.to_string())
                }
                CoreError::Validation(msg) => ("VALIDATION_ERROR", msg.clone()),
                CoreError::Template { .. } => {
                    tracing::error!(error = %core, "Script template error");
                    ("TEMPLATE_ERROR", core.to_string())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    ("INTERNAL_ERROR", "An internal error occurred".to_string())
                }
            },

            // --- Protocol errors ---
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg.clone()),
            AppError::UnknownTool(name) => ("UNKNOWN_TOOL", format!("Unknown tool: {name}")),
            AppError::Io(err) => {
                tracing::error!(error = %err, "I/O error");
                ("INTERNAL_ERROR", "An internal error occurred".to_string())
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ("INTERNAL_ERROR", "An internal error occurred".to_string())
            }
        };

        ErrorBody {
            error: message,
            code,
        }
    }
}
