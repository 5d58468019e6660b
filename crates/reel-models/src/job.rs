//! Assembly requests, composition job identity and published results.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clip::ClipReference;
use crate::locator::ObjectLocator;
use crate::mood::Mood;

/// Unique identifier for one assembly run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CompositionJobId(pub String);

impl CompositionJobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CompositionJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CompositionJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the final video is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Upload to the object store and hand out a signed URL
    #[default]
    SignedUrl,
    /// Copy into a local output directory and hand out its path
    LocalPath,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::SignedUrl => "signed_url",
            OutputMode::LocalPath => "local_path",
        }
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "signed_url" | "signedurl" => Ok(OutputMode::SignedUrl),
            "local_path" | "localpath" => Ok(OutputMode::LocalPath),
            other => Err(format!("unknown output mode: {other}")),
        }
    }
}

/// Speech language for voiceover synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Language {
    /// Display name, e.g. "English (United States)"
    pub name: String,
    /// BCP-47 code, e.g. "en-US"
    pub code: String,
}

impl Default for Language {
    fn default() -> Self {
        Self {
            name: "English (United States)".to_string(),
            code: "en-US".to_string(),
        }
    }
}

/// One storyboard scene as submitted for assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SceneInput {
    /// Already generated clip for the scene
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub video_uri: Option<ClipReference>,
    /// Prompt used when the clip still has to be generated
    #[serde(default)]
    pub video_prompt: Option<String>,
    /// Base64-encoded seed image for video generation
    #[serde(default)]
    pub image_base64: Option<String>,
    /// Voiceover text for the scene
    #[serde(default)]
    pub voiceover: String,
}

/// Request to assemble one final video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyRequest {
    /// Scenes in playback order
    pub scenes: Vec<SceneInput>,
    /// Mood selecting the background music
    pub mood: Mood,
    /// Whether to synthesise and mix voiceovers
    #[serde(default = "default_with_voiceover")]
    pub with_voice_over: bool,
    /// Voiceover language
    #[serde(default)]
    pub language: Language,
    /// Voice name suffix for synthesis
    #[serde(default)]
    pub voice: Option<String>,
    /// Optional logo image composited over the video
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub logo_overlay: Option<ClipReference>,
}

fn default_with_voiceover() -> bool {
    true
}

/// Result of a successful assembly run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishedVideo {
    /// Composition job that produced the video
    pub job_id: CompositionJobId,
    /// Address handed to the caller (signed URL or local path)
    pub address: String,
    /// Canonical remote locator when published to the object store
    pub locator: Option<ObjectLocator>,
    /// Measured duration of the final video (seconds)
    pub duration_secs: f64,
    /// Publication timestamp
    pub published_at: DateTime<Utc>,
}
