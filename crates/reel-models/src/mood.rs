//! Moods and the background music lookup.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Scenario mood, used to pick the background music track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Mood {
    Angry,
    Calm,
    Dark,
    Dramatic,
    Happy,
    Inspirational,
    Melancholic,
    Mysterious,
    Romantic,
    Suspenseful,
}

impl Mood {
    /// Every mood, in catalogue order.
    pub const ALL: [Mood; 10] = [
        Mood::Angry,
        Mood::Calm,
        Mood::Dark,
        Mood::Dramatic,
        Mood::Happy,
        Mood::Inspirational,
        Mood::Melancholic,
        Mood::Mysterious,
        Mood::Romantic,
        Mood::Suspenseful,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Angry => "angry",
            Mood::Calm => "calm",
            Mood::Dark => "dark",
            Mood::Dramatic => "dramatic",
            Mood::Happy => "happy",
            Mood::Inspirational => "inspirational",
            Mood::Melancholic => "melancholic",
            Mood::Mysterious => "mysterious",
            Mood::Romantic => "romantic",
            Mood::Suspenseful => "suspenseful",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mood {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str() == needle)
            .ok_or_else(|| ModelError::UnknownMood(s.to_string()))
    }
}

impl TryFrom<String> for Mood {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Static mood to music asset mapping.
#[derive(Debug, Clone, Default)]
pub struct MoodTrackMap {
    tracks: HashMap<Mood, PathBuf>,
}

impl MoodTrackMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every mood to `<music_dir>/<mood>.mp3`.
    pub fn standard(music_dir: impl AsRef<Path>) -> Self {
        let dir = music_dir.as_ref();
        let tracks = Mood::ALL
            .into_iter()
            .map(|m| (m, dir.join(format!("{}.mp3", m.as_str()))))
            .collect();
        Self { tracks }
    }

    /// Add or replace the track for a mood.
    pub fn with_track(mut self, mood: Mood, path: impl Into<PathBuf>) -> Self {
        self.tracks.insert(mood, path.into());
        self
    }

    /// Music asset for a mood. A missing entry is a configuration error.
    pub fn track_for(&self, mood: Mood) -> ModelResult<&Path> {
        self.tracks
            .get(&mood)
            .map(PathBuf::as_path)
            .ok_or_else(|| ModelError::UnmappedMood(mood.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
