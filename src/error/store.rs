//! Errors returned by the document store contract.

use thiserror::Error;

/// Failure of a store mutation or subscription.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The store refused the mutation (validation, permissions).
    #[error("{operation} rejected: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    /// The store could not be reached.
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }

    pub fn user_message(&self) -> String {
        match self {
            StoreError::NotFound { kind, .. } => format!("The {} no longer exists.", kind),
            StoreError::Rejected { .. } => "Your change could not be saved.".to_string(),
            StoreError::Unavailable { .. } => {
                "Could not reach the server to save your conversation.".to_string()
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "E_STORE_NOT_FOUND",
            StoreError::Rejected { .. } => "E_STORE_REJECTED",
            StoreError::Unavailable { .. } => "E_STORE_UNAVAILABLE",
        }
    }
}
