//! Pipeline error types.
//!
//! Every variant's `Display` carries the underlying cause, so the message a
//! caller sees always names the root failure.

use thiserror::Error;

use reel_genai::GenAiError;
use reel_media::MediaError;
use reel_models::ModelError;
use reel_storage::StorageError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to fetch clip for scene {index}: {source}")]
    ClipFetch {
        index: usize,
        #[source]
        source: StorageError,
    },

    #[error("Scene {index} has no clip: {reason}")]
    MissingClip { index: usize, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Generation error: {0}")]
    GenAi(#[from] GenAiError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Short stage label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "config",
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::ClipFetch { .. } => "clip_fetch",
            PipelineError::MissingClip { .. } => "missing_clip",
            PipelineError::Storage(_) => "storage",
            PipelineError::Media(_) => "media",
            PipelineError::GenAi(_) => "generation",
            PipelineError::Model(_) => "reference",
            PipelineError::Io(_) => "io",
        }
    }
}
