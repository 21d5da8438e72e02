//! Errors raised while opening or consuming an inference stream.

use thiserror::Error;

use crate::traits::HttpError;

/// Stream-specific error variants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// The endpoint answered with a non-2xx status.
    #[error("Inference request failed ({status}): {message}")]
    HttpStatus { status: u16, message: String },

    /// The connection could not be established or dropped mid-stream.
    #[error("Stream connection lost: {message}")]
    ConnectionLost { message: String },

    /// No data within the transport's timeout.
    #[error("Stream timeout: {message}")]
    Timeout { message: String },

    /// The body was not valid UTF-8.
    #[error("Stream body is not valid UTF-8")]
    InvalidUtf8,

    /// A line of the data-stream protocol could not be parsed.
    #[error("Malformed stream part '{line}': {message}")]
    Protocol { line: String, message: String },

    /// The provider reported an error inside the stream.
    #[error("Provider error: {message}")]
    Provider { message: String },

    /// The request body could not be encoded.
    #[error("Failed to encode request: {message}")]
    Request { message: String },
}

impl StreamError {
    /// Check if this error is likely transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::ConnectionLost { .. } | StreamError::Timeout { .. } => true,
            StreamError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            StreamError::HttpStatus { status, .. } if *status >= 500 => {
                "The AI service is having trouble right now.".to_string()
            }
            StreamError::HttpStatus { status, .. } => {
                format!("The AI service rejected the request ({}).", status)
            }
            StreamError::ConnectionLost { .. } => "The connection was interrupted.".to_string(),
            StreamError::Timeout { .. } => "The AI service did not respond in time.".to_string(),
            StreamError::InvalidUtf8 | StreamError::Protocol { .. } => {
                "Received an unreadable response from the AI service.".to_string()
            }
            StreamError::Provider { message } => format!("The model reported an error: {}", message),
            StreamError::Request { .. } => "The request could not be prepared.".to_string(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::HttpStatus { .. } => "E_STREAM_STATUS",
            StreamError::ConnectionLost { .. } => "E_STREAM_CONN",
            StreamError::Timeout { .. } => "E_STREAM_TIMEOUT",
            StreamError::InvalidUtf8 => "E_STREAM_UTF8",
            StreamError::Protocol { .. } => "E_STREAM_PARSE",
            StreamError::Provider { .. } => "E_STREAM_PROVIDER",
            StreamError::Request { .. } => "E_STREAM_REQUEST",
        }
    }
}

impl From<HttpError> for StreamError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::ServerError { status, message } => StreamError::HttpStatus { status, message },
            HttpError::Timeout(message) => StreamError::Timeout { message },
            HttpError::ConnectionFailed(message)
            | HttpError::Io(message)
            | HttpError::InvalidUrl(message)
            | HttpError::Other(message) => StreamError::ConnectionLost { message },
            HttpError::Cancelled => StreamError::ConnectionLost {
                message: "request cancelled".to_string(),
            },
        }
    }
}
