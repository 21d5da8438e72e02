//! Result type alias for chat operations.

use super::chat_error::ChatError;

/// Type alias for Results using ChatError.
pub type ChatResult<T> = Result<T, ChatError>;

/// Extension for logging and discarding an error where the caller can keep going.
pub trait LogErrorExt<T> {
    /// Log the error at `warn` under `operation` and convert to an `Option`.
    fn log_warn(self, operation: &'static str) -> Option<T>;
}

impl<T, E: std::fmt::Display> LogErrorExt<T> for Result<T, E> {
    fn log_warn(self, operation: &'static str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(operation, error = %err, "operation failed, continuing");
                None
            }
        }
    }
}
