//! Generation service seams.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use reel_models::LongRunningOperation;

use crate::error::GenAiResult;

/// Video generation submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRequest {
    pub prompt: String,
    /// Base64-encoded PNG used as the first frame
    pub seed_image_base64: Option<String>,
}

impl VideoRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            seed_image_base64: None,
        }
    }

    pub fn with_seed_image(mut self, image_base64: impl Into<String>) -> Self {
        self.seed_image_base64 = Some(image_base64.into());
        self
    }
}

/// Speech synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    /// BCP-47 language code, e.g. "en-US"
    pub language_code: String,
    /// Voice name suffix, e.g. "Algenib"
    pub voice: Option<String>,
}

/// Reads the state of a long-running operation.
#[async_trait]
pub trait OperationSource: Send + Sync {
    /// Current snapshot of the operation named `name`.
    async fn operation_status(&self, name: &str) -> GenAiResult<LongRunningOperation>;
}

/// Remote generation backend.
///
/// Every call is a single attempt; callers wrap them in
/// [`retry_with_backoff`](crate::retry_with_backoff).
#[async_trait]
pub trait GenerationClient: OperationSource {
    /// Submit a video job and return its operation name.
    async fn submit_video(&self, request: &VideoRequest) -> GenAiResult<String>;

    /// Generate a still image, returning encoded image bytes.
    async fn generate_image(&self, prompt: &str) -> GenAiResult<Vec<u8>>;

    /// Generate a music track, returning WAV bytes.
    async fn generate_music(&self, prompt: &str) -> GenAiResult<Vec<u8>>;

    /// Synthesize speech, returning MP3 bytes.
    async fn synthesize_speech(&self, request: &SpeechRequest) -> GenAiResult<Vec<u8>>;
}
