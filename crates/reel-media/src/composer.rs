//! Video composer.
//!
//! Steps run strictly in order, each consuming the previous step's file:
//! concatenate (stream copy), attach the mixed audio with a tail fade-out,
//! then optionally composite a logo (re-encode).

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::encoding::EncodingConfig;
use crate::error::{MediaError, MediaResult};
use crate::filters::{afade_out_filter, concat_list_entry};
use crate::overlay::{apply_overlay, OverlayConfig};
use crate::probe::{probe_duration, probe_media, MediaInfo};

/// Composer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerConfig {
    /// Audio fade-out length, ending at the video's last frame (seconds)
    pub fade_out_secs: f64,
    pub overlay: OverlayConfig,
    /// Used only by the overlay step
    pub encoding: EncodingConfig,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            fade_out_secs: 3.0,
            overlay: OverlayConfig::default(),
            encoding: EncodingConfig::default(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl ComposerConfig {
    pub fn with_fade_out(mut self, secs: f64) -> Self {
        self.fade_out_secs = secs;
        self
    }

    pub fn with_overlay(mut self, overlay: OverlayConfig) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Start of a fade-out of length `fade` that ends at `video_duration`.
///
/// A video shorter than the fade is an error rather than a negative start.
pub fn fade_out_start(video_duration: f64, fade: f64) -> MediaResult<f64> {
    if !fade.is_finite() || fade < 0.0 {
        return Err(MediaError::invalid_config(format!(
            "fade-out duration must be non-negative, got {fade}"
        )));
    }
    if video_duration < fade {
        return Err(MediaError::FadeLongerThanVideo {
            video: video_duration,
            fade,
        });
    }
    Ok(video_duration - fade)
}

/// The composed deliverable.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedVideo {
    pub path: PathBuf,
    /// Measured duration (seconds)
    pub duration: f64,
}

/// FFmpeg-backed composer.
#[derive(Debug, Clone, Default)]
pub struct VideoComposer {
    config: ComposerConfig,
    runner: FfmpegRunner,
}

impl VideoComposer {
    pub fn new(config: ComposerConfig) -> Self {
        Self {
            config,
            runner: FfmpegRunner::new(),
        }
    }

    pub fn with_runner(mut self, runner: FfmpegRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Join `clips` in order into `<out_dir>/concat.mp4` without re-encoding.
    pub async fn concat(&self, clips: &[PathBuf], out_dir: &Path) -> MediaResult<PathBuf> {
        if clips.is_empty() {
            return Err(MediaError::NoClips);
        }

        let mut infos = Vec::with_capacity(clips.len());
        for clip in clips {
            infos.push(probe_media(clip).await?);
        }
        check_concat_compatible(clips, &infos)?;

        let mut list = String::new();
        for clip in clips {
            let absolute = fs::canonicalize(clip).await?;
            list.push_str(&concat_list_entry(&absolute.to_string_lossy()));
            list.push('\n');
        }
        let list_path = out_dir.join("concat-list.txt");
        fs::write(&list_path, list).await?;

        let output = out_dir.join("concat.mp4");
        let cmd = FfmpegCommand::new(&output)
            .label("concat")
            .input_with_args(["-f", "concat", "-safe", "0"], &list_path)
            .stream_copy();
        self.runner.run(&cmd).await?;

        info!(clips = clips.len(), "Concatenated clips");
        Ok(output)
    }

    /// Replace the video's audio with `audio`, fading out over the last
    /// `fade_out_secs` of the video. Returns the video duration.
    pub async fn attach_audio(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<f64> {
        let duration = probe_duration(video).await?;
        let fade_start = fade_out_start(duration, self.config.fade_out_secs)?;

        // apad keeps a short music track from ending the video early.
        let filter = format!(
            "[1:a]{},apad[aout]",
            afade_out_filter(fade_start, self.config.fade_out_secs)
        );

        let cmd = FfmpegCommand::new(output)
            .label("attach-audio")
            .input(video)
            .input(audio)
            .filter_complex(filter)
            .map("0:v")
            .map("[aout]")
            .video_codec("copy")
            .audio_codec(&self.config.audio_codec)
            .audio_bitrate(&self.config.audio_bitrate)
            .shortest();
        self.runner.run_timed(&cmd, duration).await?;

        debug!(duration, fade_start, "Attached audio");
        Ok(duration)
    }

    /// Composite `logo` over `video` using the configured corner and scale.
    pub async fn apply_overlay(&self, video: &Path, logo: &Path, output: &Path) -> MediaResult<()> {
        let width = probe_media(video)
            .await?
            .video
            .map(|v| v.width)
            .filter(|w| *w > 0)
            .ok_or_else(|| MediaError::invalid_media(format!("{} has no video stream", video.display())))?;

        apply_overlay(
            &self.runner,
            video,
            logo,
            output,
            width,
            &self.config.overlay,
            &self.config.encoding,
        )
        .await
    }

    /// Run every step and return the final video in `out_dir`.
    pub async fn compose(
        &self,
        clips: &[PathBuf],
        audio: &Path,
        logo: Option<&Path>,
        out_dir: &Path,
    ) -> MediaResult<ComposedVideo> {
        let concatenated = self.concat(clips, out_dir).await?;

        let with_audio = out_dir.join("with-audio.mp4");
        self.attach_audio(&concatenated, audio, &with_audio).await?;

        let path = match logo {
            Some(logo) => {
                let overlaid = out_dir.join("final.mp4");
                self.apply_overlay(&with_audio, logo, &overlaid).await?;
                overlaid
            }
            None => with_audio,
        };

        let duration = probe_duration(&path).await?;
        info!(path = %path.display(), duration, overlay = logo.is_some(), "Composed final video");
        Ok(ComposedVideo { path, duration })
    }
}

fn check_concat_compatible(clips: &[PathBuf], infos: &[MediaInfo]) -> MediaResult<()> {
    let Some(first) = infos.first() else {
        return Ok(());
    };
    if first.video.is_none() {
        return Err(MediaError::IncompatibleClips(format!(
            "{} has no video stream",
            clips[0].display()
        )));
    }
    for (clip, info) in clips.iter().zip(infos).skip(1) {
        if let Some(mismatch) = first.concat_mismatch(info) {
            return Err(MediaError::IncompatibleClips(format!(
                "{} does not match {}: {}",
                clip.display(),
                clips[0].display(),
                mismatch
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::VideoStreamInfo;

    fn info(codec: &str, width: u32) -> MediaInfo {
        MediaInfo {
            duration: Some(5.0),
            video: Some(VideoStreamInfo {
                codec: codec.to_string(),
                width,
                height: 720,
                fps: 24.0,
                pix_fmt: Some("yuv420p".to_string()),
            }),
            audio: None,
            format_name: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            size: 0,
        }
    }

    #[test]
    fn test_fade_out_start() {
        assert!((fade_out_start(15.0, 3.0).unwrap() - 12.0).abs() < 1e-9);
        assert_eq!(fade_out_start(3.0, 3.0).unwrap(), 0.0);
        assert!(fade_out_start(10.0, -1.0).is_err());
    }

    #[test]
    fn test_fade_longer_than_video_is_flagged() {
        match fade_out_start(2.0, 3.0) {
            Err(MediaError::FadeLongerThanVideo { video, fade }) => {
                assert_eq!(video, 2.0);
                assert_eq!(fade, 3.0);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_compatibility_check() {
        let clips: Vec<PathBuf> = (0..3).map(|i| PathBuf::from(format!("video-{i}.mp4"))).collect();
        let same = vec![info("h264", 1280), info("h264", 1280), info("h264", 1280)];
        assert!(check_concat_compatible(&clips, &same).is_ok());

        let mixed = vec![info("h264", 1280), info("h264", 1280), info("hevc", 1280)];
        let err = check_concat_compatible(&clips, &mixed).unwrap_err();
        match err {
            MediaError::IncompatibleClips(msg) => {
                assert!(msg.contains("video-2.mp4"));
                assert!(msg.contains("hevc"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concat_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let err = VideoComposer::default().concat(&[], dir.path()).await.unwrap_err();
        assert!(matches!(err, MediaError::NoClips));
    }
}
