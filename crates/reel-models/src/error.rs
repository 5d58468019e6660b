//! Model error types.

use thiserror::Error;

/// Result type for model parsing and validation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while parsing or validating model values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Malformed reference '{reference}': {reason}")]
    MalformedReference { reference: String, reason: String },

    #[error("Unknown mood: {0}")]
    UnknownMood(String),

    #[error("No music track mapped for mood '{0}'")]
    UnmappedMood(String),

    #[error("Invalid audio segment: {0}")]
    InvalidSegment(String),
}

impl ModelError {
    /// Create a malformed reference error.
    pub fn malformed(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid segment error.
    pub fn invalid_segment(message: impl Into<String>) -> Self {
        Self::InvalidSegment(message.into())
    }
}
