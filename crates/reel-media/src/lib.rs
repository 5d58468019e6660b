#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for storyboard video assembly.
//!
//! This crate provides:
//! - Multi-input FFmpeg command building and a cancellable runner
//! - FFprobe media inspection
//! - The audio ducking mixer (music under time-offset voiceovers)
//! - The video composer (concat, audio attach with fade-out, logo overlay)

pub mod command;
pub mod composer;
pub mod encoding;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod mixer;
pub mod overlay;
pub mod pipeline;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use composer::{fade_out_start, ComposedVideo, ComposerConfig, VideoComposer};
pub use encoding::EncodingConfig;
pub use error::{MediaError, MediaResult};
pub use filters::LoudnessTarget;
pub use fs_utils::move_file;
pub use mixer::{AudioMixer, DuckingConfig, MixOutcome, MixPlan, VoiceoverTrack};
pub use overlay::{OverlayConfig, OverlayCorner};
pub use pipeline::{FfmpegPipeline, MediaPipeline};
pub use probe::{probe_duration, probe_media, AudioStreamInfo, MediaInfo, VideoStreamInfo};
pub use progress::{FfmpegProgress, ProgressReporter};
