//! Vertex AI REST client.
//!
//! Veo video jobs go through `predictLongRunning` and are read back with
//! `fetchPredictOperation`. Imagen and Lyria use `predict`, and speech goes
//! through Cloud Text-to-Speech `text:synthesize`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use reel_models::{ClipReference, LongRunningOperation, OperationError};

use crate::auth::{AccessTokenSource, GcpTokenSource};
use crate::client::{GenerationClient, OperationSource, SpeechRequest, VideoRequest};
use crate::error::{GenAiError, GenAiResult};
use crate::metrics::record_request;

/// Vertex AI client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexConfig {
    pub project_id: String,
    pub location: String,
    pub video_model: String,
    pub image_model: String,
    pub music_model: String,
    /// Bucket prefix where Veo writes its samples
    pub storage_uri: Option<String>,
    pub aspect_ratio: String,
    /// Overrides `https://{location}-aiplatform.googleapis.com`
    pub api_base: Option<String>,
    pub tts_base: String,
    pub timeout: Duration,
}

impl VertexConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            location: "us-central1".to_string(),
            video_model: "veo-2.0-generate-001".to_string(),
            image_model: "imagen-3.0-generate-001".to_string(),
            music_model: "lyria-002".to_string(),
            storage_uri: None,
            aspect_ratio: "16:9".to_string(),
            api_base: None,
            tts_base: "https://texttospeech.googleapis.com".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_storage_uri(mut self, uri: impl Into<String>) -> Self {
        self.storage_uri = Some(uri.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn with_tts_base(mut self, base: impl Into<String>) -> Self {
        self.tts_base = base.into();
        self
    }

    pub fn with_video_model(mut self, model: impl Into<String>) -> Self {
        self.video_model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from environment. `PROJECT_ID` is required.
    pub fn from_env() -> GenAiResult<Self> {
        let project_id = std::env::var("PROJECT_ID")
            .map_err(|_| GenAiError::config("PROJECT_ID is not set"))?;

        let mut config = Self::new(project_id);
        if let Ok(location) = std::env::var("LOCATION") {
            config.location = location;
        }
        config.storage_uri = std::env::var("GCS_VIDEOS_STORAGE_URI").ok().filter(|s| !s.is_empty());
        config.api_base = std::env::var("VERTEX_API_BASE").ok();
        if let Ok(base) = std::env::var("TTS_API_BASE") {
            config.tts_base = base;
        }
        if let Ok(model) = std::env::var("VEO_MODEL") {
            config.video_model = model;
        }
        if let Ok(model) = std::env::var("IMAGEN_MODEL") {
            config.image_model = model;
        }
        if let Ok(model) = std::env::var("LYRIA_MODEL") {
            config.music_model = model;
        }
        config.timeout = std::env::var("GENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(config.timeout);

        Ok(config)
    }

    /// Endpoint for `method` on a publisher model.
    pub fn model_url(&self, model: &str, method: &str) -> String {
        let base = self
            .api_base
            .clone()
            .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", self.location));
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:{}",
            base.trim_end_matches('/'),
            self.project_id,
            self.location,
            model,
            method
        )
    }

    pub fn speech_url(&self) -> String {
        format!("{}/v1/text:synthesize", self.tts_base.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    response: Option<VideoResult>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResult {
    #[serde(default)]
    videos: Vec<VideoEntry>,
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoEntry {
    gcs_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: Option<SampleVideo>,
}

#[derive(Debug, Deserialize)]
struct SampleVideo {
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

fn parse_operation(name: &str, body: OperationResponse) -> GenAiResult<LongRunningOperation> {
    if !body.done {
        return Ok(LongRunningOperation::pending(name));
    }
    if let Some(err) = body.error {
        return Ok(LongRunningOperation::failed(name, err.code, err.message));
    }

    let result = body.response.unwrap_or_default();
    let uris = result
        .videos
        .into_iter()
        .filter_map(|v| v.gcs_uri)
        .chain(
            result
                .generated_samples
                .into_iter()
                .filter_map(|s| s.video.and_then(|v| v.uri)),
        );

    let outputs = uris
        .map(|uri| {
            ClipReference::parse(&uri)
                .map_err(|e| GenAiError::invalid_response(format!("bad output locator from {name}: {e}")))
        })
        .collect::<GenAiResult<Vec<_>>>()?;

    Ok(LongRunningOperation::succeeded(name, outputs))
}

fn decode_base64(field: &str, data: Option<String>) -> GenAiResult<Vec<u8>> {
    let data = data.ok_or_else(|| GenAiError::invalid_response(format!("response has no {field}")))?;
    BASE64
        .decode(data.as_bytes())
        .map_err(|e| GenAiError::invalid_response(format!("{field} is not valid base64: {e}")))
}

fn first_prediction(body: PredictResponse) -> GenAiResult<Vec<u8>> {
    let prediction = body
        .predictions
        .into_iter()
        .next()
        .ok_or_else(|| GenAiError::invalid_response("response has no predictions"))?;
    decode_base64("bytesBase64Encoded", prediction.bytes_base64_encoded)
}

/// Vertex AI generation client.
#[derive(Clone)]
pub struct VertexClient {
    http: Client,
    config: VertexConfig,
    tokens: Arc<dyn AccessTokenSource>,
}

impl VertexClient {
    pub fn new(config: VertexConfig, tokens: Arc<dyn AccessTokenSource>) -> GenAiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("reel-genai/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenAiError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config, tokens })
    }

    /// Config and credentials from the environment.
    pub async fn from_env() -> GenAiResult<Self> {
        let config = VertexConfig::from_env()?;
        let tokens = GcpTokenSource::from_env().await?;
        Self::new(config, Arc::new(tokens))
    }

    pub fn config(&self) -> &VertexConfig {
        &self.config
    }

    async fn post<T: DeserializeOwned>(&self, operation: &str, url: &str, body: &Value) -> GenAiResult<T> {
        let token = self.tokens.access_token().await?;
        let start = Instant::now();

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| GenAiError::Network(e.to_string()))?;

        let status = response.status();
        record_request(operation, status.as_u16(), start.elapsed().as_secs_f64() * 1000.0);

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let text = response.text().await.unwrap_or_default();

            let mut err = GenAiError::from_http_status(status.as_u16(), text);
            if let GenAiError::RateLimited { retry_after: slot, .. } = &mut err {
                *slot = retry_after;
            }
            return Err(err);
        }

        let bytes = response.bytes().await.map_err(|e| GenAiError::Network(e.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl OperationSource for VertexClient {
    async fn operation_status(&self, name: &str) -> GenAiResult<LongRunningOperation> {
        let url = self.config.model_url(&self.config.video_model, "fetchPredictOperation");
        let body: OperationResponse = self
            .post("fetch_operation", &url, &json!({ "operationName": name }))
            .await?;
        parse_operation(name, body)
    }
}

#[async_trait]
impl GenerationClient for VertexClient {
    async fn submit_video(&self, request: &VideoRequest) -> GenAiResult<String> {
        let mut instance = json!({ "prompt": request.prompt });
        if let Some(image) = &request.seed_image_base64 {
            instance["image"] = json!({ "bytesBase64Encoded": image, "mimeType": "png" });
        }

        let mut parameters = json!({
            "sampleCount": 1,
            "aspectRatio": self.config.aspect_ratio,
        });
        if let Some(uri) = &self.config.storage_uri {
            parameters["storageUri"] = json!(uri);
        }

        let url = self.config.model_url(&self.config.video_model, "predictLongRunning");
        let body = json!({ "instances": [instance], "parameters": parameters });
        let submitted: SubmitResponse = self.post("submit_video", &url, &body).await?;

        info!(operation = %submitted.name, "Submitted video generation");
        Ok(submitted.name)
    }

    async fn generate_image(&self, prompt: &str) -> GenAiResult<Vec<u8>> {
        let url = self.config.model_url(&self.config.image_model, "predict");
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": self.config.aspect_ratio,
                "safetySetting": "block_only_high",
            },
        });
        let bytes = first_prediction(self.post("generate_image", &url, &body).await?)?;
        debug!(size = bytes.len(), "Generated image");
        Ok(bytes)
    }

    async fn generate_music(&self, prompt: &str) -> GenAiResult<Vec<u8>> {
        let url = self.config.model_url(&self.config.music_model, "predict");
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1 },
        });
        let bytes = first_prediction(self.post("generate_music", &url, &body).await?)?;
        debug!(size = bytes.len(), "Generated music");
        Ok(bytes)
    }

    async fn synthesize_speech(&self, request: &SpeechRequest) -> GenAiResult<Vec<u8>> {
        let mut voice = json!({ "languageCode": request.language_code });
        if let Some(name) = &request.voice {
            voice["name"] = json!(format!("{}-Chirp3-HD-{}", request.language_code, name));
        }
        let body = json!({
            "input": { "text": request.text },
            "voice": voice,
            "audioConfig": { "audioEncoding": "MP3" },
        });

        let url = self.config.speech_url();
        let response: SynthesizeResponse = self.post("synthesize_speech", &url, &body).await?;
        decode_base64("audioContent", response.audio_content)
    }
}
