//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use reel_genai::{PollerConfig, RetryConfig};
use reel_media::{ComposerConfig, DuckingConfig, FfmpegRunner, OverlayConfig, OverlayCorner};
use reel_models::{ClipReference, MoodTrackMap, OutputMode, StoragePrefix};

use crate::error::{PipelineError, PipelineResult};

/// Assembly pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where final videos go
    pub output_mode: OutputMode,
    /// `gs://bucket/prefix` for published videos (signed URL mode)
    pub output_base_uri: Option<String>,
    /// Destination directory in local path mode
    pub local_output_dir: PathBuf,
    /// Lifetime of published signed URLs
    pub signed_url_ttl: Duration,
    /// Audio fade-out at the end of the video (seconds)
    pub fade_out_seconds: f64,
    /// Logo width as a fraction of the video width
    pub overlay_scale: f64,
    /// Logo distance from the video edges (pixels)
    pub overlay_margin: u32,
    pub overlay_corner: OverlayCorner,
    /// Music gain under an active voiceover
    pub ducking_attenuation: f64,
    /// Spacing between consecutive voiceover start offsets (seconds)
    pub voiceover_interval_seconds: f64,
    /// Total attempts for each remote generation call
    pub max_retries: u32,
    /// Long-running operation poll cadence
    pub poll_interval: Duration,
    /// Parent of per-job scratch directories
    pub work_dir: PathBuf,
    /// Directory holding `<mood>.mp3` music tracks
    pub music_dir: PathBuf,
    /// Clip substituted for a scene whose generation failed
    pub placeholder_clip: Option<ClipReference>,
    /// Maximum scenes fetched or generated at once
    pub max_scene_parallel: usize,
    /// Serve the object store from this directory instead of S3
    pub local_store_root: Option<PathBuf>,
    /// Kill an FFmpeg step that runs longer than this (seconds)
    pub ffmpeg_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_mode: OutputMode::SignedUrl,
            output_base_uri: None,
            local_output_dir: PathBuf::from("./output"),
            signed_url_ttl: Duration::from_secs(3600),
            fade_out_seconds: 3.0,
            overlay_scale: 0.15,
            overlay_margin: 20,
            overlay_corner: OverlayCorner::TopRight,
            ducking_attenuation: 0.65,
            voiceover_interval_seconds: 8.0,
            max_retries: 3,
            poll_interval: Duration::from_millis(2000),
            work_dir: std::env::temp_dir(),
            music_dir: PathBuf::from("./assets/music"),
            placeholder_clip: None,
            max_scene_parallel: 8,
            local_store_root: None,
            ffmpeg_timeout_secs: Some(1800),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl PipelineConfig {
    /// Create config from environment variables.
    ///
    /// Numeric values that fail to parse fall back to their defaults;
    /// unknown enum labels are errors.
    pub fn from_env() -> PipelineResult<Self> {
        let defaults = Self::default();

        let output_mode = match std::env::var("OUTPUT_MODE") {
            Ok(raw) => raw.parse().map_err(PipelineError::Config)?,
            Err(_) => defaults.output_mode,
        };
        let overlay_corner = match std::env::var("OVERLAY_CORNER") {
            Ok(raw) => raw.parse().map_err(|e| PipelineError::config(format!("{}", e)))?,
            Err(_) => defaults.overlay_corner,
        };
        let placeholder_clip = match std::env::var("PLACEHOLDER_CLIP") {
            Ok(raw) if !raw.trim().is_empty() => Some(ClipReference::parse(&raw)?),
            _ => None,
        };

        let config = Self {
            output_mode,
            output_base_uri: std::env::var("OUTPUT_BASE_URI").ok().filter(|s| !s.is_empty()),
            local_output_dir: std::env::var("LOCAL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_output_dir),
            signed_url_ttl: env_parse("SIGNED_URL_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.signed_url_ttl),
            fade_out_seconds: env_parse("FADE_OUT_SECONDS").unwrap_or(defaults.fade_out_seconds),
            overlay_scale: env_parse("OVERLAY_SCALE").unwrap_or(defaults.overlay_scale),
            overlay_margin: env_parse("OVERLAY_MARGIN_PX").unwrap_or(defaults.overlay_margin),
            overlay_corner,
            ducking_attenuation: env_parse("DUCKING_ATTENUATION").unwrap_or(defaults.ducking_attenuation),
            voiceover_interval_seconds: env_parse("VOICEOVER_INTERVAL_SECS")
                .unwrap_or(defaults.voiceover_interval_seconds),
            max_retries: env_parse("GENAI_MAX_RETRIES").unwrap_or(defaults.max_retries),
            poll_interval: env_parse("GENAI_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            work_dir: std::env::var("WORK_DIR").map(PathBuf::from).unwrap_or(defaults.work_dir),
            music_dir: std::env::var("MUSIC_DIR").map(PathBuf::from).unwrap_or(defaults.music_dir),
            placeholder_clip,
            max_scene_parallel: env_parse("MAX_SCENE_PARALLEL").unwrap_or(defaults.max_scene_parallel),
            local_store_root: std::env::var("LOCAL_STORE_ROOT").ok().map(PathBuf::from),
            // 0 disables the limit
            ffmpeg_timeout_secs: match env_parse::<u64>("FFMPEG_TIMEOUT_SECS") {
                Some(0) => None,
                Some(secs) => Some(secs),
                None => defaults.ffmpeg_timeout_secs,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and mode requirements.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.output_mode == OutputMode::SignedUrl {
            let uri = self.output_base_uri.as_deref().ok_or_else(|| {
                PipelineError::config("OUTPUT_BASE_URI is required in signed_url output mode")
            })?;
            StoragePrefix::parse(uri)?;
        }
        if !(self.voiceover_interval_seconds.is_finite() && self.voiceover_interval_seconds > 0.0) {
            return Err(PipelineError::config(format!(
                "voiceover interval must be positive, got {}",
                self.voiceover_interval_seconds
            )));
        }
        if self.max_scene_parallel == 0 {
            return Err(PipelineError::config("max_scene_parallel must be at least 1"));
        }
        if self.poll_interval.is_zero() {
            return Err(PipelineError::config("poll interval must be non-zero"));
        }
        self.ducking_config().validate()?;
        self.overlay_config().validate()?;
        Ok(())
    }

    /// Parsed output prefix, if configured.
    pub fn output_prefix(&self) -> PipelineResult<Option<StoragePrefix>> {
        self.output_base_uri
            .as_deref()
            .map(StoragePrefix::parse)
            .transpose()
            .map_err(PipelineError::from)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default().with_max_attempts(self.max_retries)
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig::default().with_interval(self.poll_interval)
    }

    pub fn ducking_config(&self) -> DuckingConfig {
        DuckingConfig::default().with_attenuation(self.ducking_attenuation)
    }

    pub fn overlay_config(&self) -> OverlayConfig {
        OverlayConfig::default()
            .with_scale(self.overlay_scale)
            .with_margin(self.overlay_margin)
            .with_corner(self.overlay_corner)
    }

    pub fn composer_config(&self) -> ComposerConfig {
        ComposerConfig::default()
            .with_fade_out(self.fade_out_seconds)
            .with_overlay(self.overlay_config())
    }

    /// FFmpeg runner carrying the configured step timeout.
    pub fn ffmpeg_runner(&self) -> FfmpegRunner {
        match self.ffmpeg_timeout_secs {
            Some(secs) => FfmpegRunner::new().with_timeout(secs),
            None => FfmpegRunner::new(),
        }
    }

    pub fn mood_tracks(&self) -> MoodTrackMap {
        MoodTrackMap::standard(&self.music_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_url_config() -> PipelineConfig {
        PipelineConfig {
            output_base_uri: Some("gs://renders/final".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.output_mode, OutputMode::SignedUrl);
        assert_eq!(config.fade_out_seconds, 3.0);
        assert_eq!(config.overlay_scale, 0.15);
        assert_eq!(config.overlay_margin, 20);
        assert_eq!(config.voiceover_interval_seconds, 8.0);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.retry_config().max_attempts, 3);
    }

    #[test]
    fn test_signed_url_mode_needs_base_uri() {
        assert!(matches!(PipelineConfig::default().validate(), Err(PipelineError::Config(_))));
        assert!(signed_url_config().validate().is_ok());

        let bad = PipelineConfig {
            output_base_uri: Some("s3://renders".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(PipelineError::Model(_))));

        let local = PipelineConfig {
            output_mode: OutputMode::LocalPath,
            ..Default::default()
        };
        assert!(local.validate().is_ok());
    }

    #[test]
    fn test_component_configs() {
        let config = PipelineConfig {
            ducking_attenuation: 0.5,
            overlay_corner: OverlayCorner::BottomLeft,
            fade_out_seconds: 2.0,
            ..signed_url_config()
        };
        assert_eq!(config.ducking_config().attenuation, 0.5);
        assert_eq!(config.composer_config().overlay.corner, OverlayCorner::BottomLeft);
        assert_eq!(config.composer_config().fade_out_secs, 2.0);
        assert_eq!(config.output_prefix().unwrap().unwrap().bucket, "renders");
    }

    #[test]
    fn test_ffmpeg_runner_timeout() {
        assert_eq!(PipelineConfig::default().ffmpeg_runner().timeout_secs(), Some(1800));

        let config = PipelineConfig {
            ffmpeg_timeout_secs: Some(90),
            ..signed_url_config()
        };
        assert_eq!(config.ffmpeg_runner().timeout_secs(), Some(90));

        let unlimited = PipelineConfig {
            ffmpeg_timeout_secs: None,
            ..signed_url_config()
        };
        assert_eq!(unlimited.ffmpeg_runner().timeout_secs(), None);
        assert!(!unlimited.ffmpeg_runner().has_cancel());
    }

    #[test]
    fn test_rejects_out_of_range() {
        let config = PipelineConfig {
            ducking_attenuation: 1.5,
            ..signed_url_config()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            voiceover_interval_seconds: 0.0,
            ..signed_url_config()
        };
        assert!(config.validate().is_err());
    }
}
