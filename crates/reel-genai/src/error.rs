//! Generation client error types.

use std::time::Duration;

use thiserror::Error;

pub type GenAiResult<T> = Result<T, GenAiError>;

#[derive(Debug, Error)]
pub enum GenAiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Request rejected ({status}): {message}")]
    ClientError { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Operation {operation} failed (code {code}): {message}")]
    OperationFailed {
        operation: String,
        code: i32,
        message: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Polling cancelled for operation {0}")]
    Cancelled(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GenAiError {
    /// Map a non-success HTTP status and body to an error.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            401 | 403 => GenAiError::Auth(format!("HTTP {}: {}", status, message)),
            429 => GenAiError::RateLimited {
                message,
                retry_after: None,
            },
            500..=599 => GenAiError::ServerError { status, message },
            _ => GenAiError::ClientError { status, message },
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        GenAiError::Config(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        GenAiError::InvalidResponse(message.into())
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenAiError::Network(_) | GenAiError::ServerError { .. } | GenAiError::RateLimited { .. }
        )
    }

    /// Server-requested wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GenAiError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GenAiError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => GenAiError::from_http_status(status.as_u16(), e.to_string()),
            None if e.is_decode() => GenAiError::InvalidResponse(e.to_string()),
            None => GenAiError::Network(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for GenAiError {
    fn from(e: serde_json::Error) -> Self {
        GenAiError::InvalidResponse(e.to_string())
    }
}
