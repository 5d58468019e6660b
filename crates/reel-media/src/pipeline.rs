//! Media engine seam used by the orchestrator.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::composer::{ComposedVideo, VideoComposer};
use crate::error::MediaResult;
use crate::mixer::{AudioMixer, MixOutcome, VoiceoverTrack};
use crate::probe::probe_duration;

/// Operations an assembly run needs from the media engine.
#[async_trait]
pub trait MediaPipeline: Send + Sync {
    /// Duck `music` under `tracks` and write the mix into `out_dir`.
    async fn mix_audio(
        &self,
        music: &Path,
        tracks: &[VoiceoverTrack],
        out_dir: &Path,
    ) -> MediaResult<MixOutcome>;

    /// Concatenate `clips`, attach `audio` and optionally overlay `logo`.
    async fn compose(
        &self,
        clips: &[PathBuf],
        audio: &Path,
        logo: Option<&Path>,
        out_dir: &Path,
    ) -> MediaResult<ComposedVideo>;

    /// Measured duration of a media file.
    async fn duration(&self, path: &Path) -> MediaResult<f64>;
}

/// FFmpeg implementation.
#[derive(Debug, Clone, Default)]
pub struct FfmpegPipeline {
    mixer: AudioMixer,
    composer: VideoComposer,
}

impl FfmpegPipeline {
    pub fn new(mixer: AudioMixer, composer: VideoComposer) -> Self {
        Self { mixer, composer }
    }

    pub fn mixer(&self) -> &AudioMixer {
        &self.mixer
    }

    pub fn composer(&self) -> &VideoComposer {
        &self.composer
    }
}

#[async_trait]
impl MediaPipeline for FfmpegPipeline {
    async fn mix_audio(
        &self,
        music: &Path,
        tracks: &[VoiceoverTrack],
        out_dir: &Path,
    ) -> MediaResult<MixOutcome> {
        self.mixer.mix(music, tracks, out_dir).await
    }

    async fn compose(
        &self,
        clips: &[PathBuf],
        audio: &Path,
        logo: Option<&Path>,
        out_dir: &Path,
    ) -> MediaResult<ComposedVideo> {
        self.composer.compose(clips, audio, logo, out_dir).await
    }

    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        probe_duration(path).await
    }
}
