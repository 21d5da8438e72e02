//! Unified error type for the chat client core.

use thiserror::Error;

use super::category::ErrorCategory;
use super::config::ConfigError;
use super::store::StoreError;
use super::stream::StreamError;

/// Every failure the controller can surface to a caller.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Opening or consuming the inference stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// A document store mutation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ChatError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ChatError::Stream(err) => match err {
                StreamError::ConnectionLost { .. } | StreamError::Timeout { .. } => {
                    ErrorCategory::Network
                }
                StreamError::HttpStatus { status, .. } if *status < 500 => ErrorCategory::Client,
                StreamError::InvalidUtf8
                | StreamError::Protocol { .. }
                | StreamError::Request { .. } => ErrorCategory::Client,
                _ => ErrorCategory::Server,
            },
            ChatError::Store(StoreError::Unavailable { .. }) => ErrorCategory::Network,
            ChatError::Store(_) => ErrorCategory::Server,
            ChatError::Config(_) => ErrorCategory::Configuration,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Stream(err) => err.is_retryable(),
            ChatError::Store(err) => err.is_retryable(),
            ChatError::Config(_) => false,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Stream(err) => err.user_message(),
            ChatError::Store(err) => err.user_message(),
            ChatError::Config(err) => format!("Configuration problem: {}", err),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ChatError::Stream(err) => err.error_code(),
            ChatError::Store(err) => err.error_code(),
            ChatError::Config(err) => err.error_code(),
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        self.category().recovery_hint()
    }
}
