//! Audio ducking mixer.
//!
//! Mixes a background music track with time-offset voiceovers. The music
//! is the anchor stream: the mix lasts exactly as long as the music, and
//! the music gain drops to the configured attenuation whenever any
//! voiceover window is active.

use std::path::{Path, PathBuf};

use reel_models::{validate_ordering, ActiveWindow, SceneAudioSegment};
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{
    adelay_filter, amix_filter, ducking_volume_filter, loudnorm_filter, LoudnessTarget,
};
use crate::probe::probe_duration;

/// Mixer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DuckingConfig {
    /// Music gain while a voiceover is active (0.0 - 1.0)
    pub attenuation: f64,
    /// Mix weight of the music stream
    pub music_weight: f64,
    /// Mix weight of each voiceover stream
    pub voice_weight: f64,
    /// Loudness normalisation of the final mix; `None` disables it
    pub loudness: Option<LoudnessTarget>,
    /// Audio codec for mixed output
    pub audio_codec: String,
    /// Audio bitrate for mixed output
    pub audio_bitrate: String,
    /// Output sample rate
    pub sample_rate: u32,
}

impl Default for DuckingConfig {
    fn default() -> Self {
        Self {
            attenuation: 0.65,
            music_weight: 1.0,
            voice_weight: 1.0,
            loudness: Some(LoudnessTarget::default()),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            sample_rate: 48_000,
        }
    }
}

impl DuckingConfig {
    pub fn with_attenuation(mut self, attenuation: f64) -> Self {
        self.attenuation = attenuation;
        self
    }

    pub fn with_weights(mut self, music: f64, voice: f64) -> Self {
        self.music_weight = music;
        self.voice_weight = voice;
        self
    }

    pub fn with_loudness(mut self, loudness: Option<LoudnessTarget>) -> Self {
        self.loudness = loudness;
        self
    }

    pub fn validate(&self) -> MediaResult<()> {
        if !(0.0..=1.0).contains(&self.attenuation) {
            return Err(MediaError::invalid_config(format!(
                "ducking attenuation must be within [0, 1], got {}",
                self.attenuation
            )));
        }
        if self.music_weight < 0.0 || self.voice_weight < 0.0 {
            return Err(MediaError::invalid_config("mix weights must be non-negative"));
        }
        Ok(())
    }
}

/// A rendered voiceover file and where it starts on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceoverTrack {
    pub index: usize,
    pub path: PathBuf,
    pub offset_secs: f64,
}

impl VoiceoverTrack {
    pub fn new(index: usize, path: impl AsRef<Path>, offset_secs: f64) -> Self {
        Self {
            index,
            path: path.as_ref().to_path_buf(),
            offset_secs,
        }
    }
}

/// Segments that will actually be sent to the mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct MixPlan {
    /// Anchor duration (seconds)
    pub music_duration: f64,
    /// Segments starting before the anchor ends, in timeline order
    pub segments: Vec<SceneAudioSegment>,
    /// Indices of segments excluded for starting at or after the anchor end
    pub dropped: Vec<usize>,
}

impl MixPlan {
    /// Partition measured segments against the anchor duration.
    pub fn new(music_duration: f64, segments: Vec<SceneAudioSegment>) -> MediaResult<Self> {
        validate_ordering(&segments)?;

        let (segments, late): (Vec<_>, Vec<_>) = segments
            .into_iter()
            .partition(|s| s.starts_before(music_duration));

        Ok(Self {
            music_duration,
            segments,
            dropped: late.into_iter().map(|s| s.index).collect(),
        })
    }

    /// Nothing to mix: the music is used as-is.
    pub fn is_passthrough(&self) -> bool {
        self.segments.is_empty()
    }

    /// Active windows of the included segments.
    pub fn windows(&self) -> Vec<ActiveWindow> {
        self.segments.iter().map(SceneAudioSegment::window).collect()
    }

    /// Filter graph for a command whose input 0 is the music and inputs
    /// 1..=N are the included segments in plan order. Output label `[mix]`.
    pub fn build_mix_graph(&self, config: &DuckingConfig) -> String {
        let mut chains = Vec::with_capacity(self.segments.len() + 2);
        chains.push(format!(
            "[0:a]{}[music]",
            ducking_volume_filter(&self.windows(), config.attenuation)
        ));

        let mut mix_inputs = String::from("[music]");
        let mut weights = vec![config.music_weight];
        for (i, segment) in self.segments.iter().enumerate() {
            chains.push(format!(
                "[{}:a]{}[vo{}]",
                i + 1,
                adelay_filter(segment.offset_ms()),
                i
            ));
            mix_inputs.push_str(&format!("[vo{}]", i));
            weights.push(config.voice_weight);
        }

        let mut tail = format!("{}{}", mix_inputs, amix_filter(&weights));
        if let Some(target) = &config.loudness {
            tail.push(',');
            tail.push_str(&loudnorm_filter(target));
        }
        tail.push_str("[mix]");
        chains.push(tail);

        chains.join(";")
    }
}

/// Result of a mix.
#[derive(Debug, Clone, PartialEq)]
pub struct MixOutcome {
    /// Mixed audio file
    pub path: PathBuf,
    /// The plan that produced it
    pub plan: MixPlan,
}

/// Ducking mixer backed by FFmpeg.
#[derive(Debug, Clone, Default)]
pub struct AudioMixer {
    config: DuckingConfig,
    runner: FfmpegRunner,
}

impl AudioMixer {
    pub fn new(config: DuckingConfig) -> Self {
        Self {
            config,
            runner: FfmpegRunner::new(),
        }
    }

    pub fn with_runner(mut self, runner: FfmpegRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn config(&self) -> &DuckingConfig {
        &self.config
    }

    /// Measure rendered durations of voiceover files.
    pub async fn measure(&self, tracks: &[VoiceoverTrack]) -> MediaResult<Vec<SceneAudioSegment>> {
        let mut segments = Vec::with_capacity(tracks.len());
        for track in tracks {
            let duration = probe_duration(&track.path).await?;
            segments.push(SceneAudioSegment::new(
                track.index,
                &track.path,
                track.offset_secs,
                duration,
            )?);
        }
        Ok(segments)
    }

    /// Mix `music` with `tracks` into a new file under `out_dir`.
    pub async fn mix(
        &self,
        music: impl AsRef<Path>,
        tracks: &[VoiceoverTrack],
        out_dir: impl AsRef<Path>,
    ) -> MediaResult<MixOutcome> {
        let music = music.as_ref();
        let out_dir = out_dir.as_ref();
        self.config.validate()?;

        if !music.exists() {
            return Err(MediaError::FileNotFound(music.to_path_buf()));
        }

        let music_duration = probe_duration(music).await?;
        let segments = self.measure(tracks).await?;
        let plan = MixPlan::new(music_duration, segments)?;

        if !plan.dropped.is_empty() {
            info!(
                dropped = ?plan.dropped,
                music_duration,
                "Excluding voiceovers that start after the music ends"
            );
        }

        if plan.is_passthrough() {
            let path = self.passthrough(music, out_dir).await?;
            return Ok(MixOutcome { path, plan });
        }

        let path = out_dir.join("mixed-audio.m4a");
        let graph = plan.build_mix_graph(&self.config);
        debug!(segments = plan.segments.len(), graph = %graph, "Mixing voiceovers");

        let mut cmd = FfmpegCommand::new(&path).label("mix").input(music);
        for segment in &plan.segments {
            cmd = cmd.input(&segment.path);
        }
        let cmd = cmd
            .filter_complex(graph)
            .map("[mix]")
            .output_arg("-vn")
            .audio_codec(&self.config.audio_codec)
            .audio_bitrate(&self.config.audio_bitrate)
            .output_args(["-ar".to_string(), self.config.sample_rate.to_string()]);

        self.runner.run_timed(&cmd, music_duration).await?;

        info!(
            segments = plan.segments.len(),
            music_duration,
            "Mixed voiceovers over music"
        );
        Ok(MixOutcome { path, plan })
    }

    /// Copy the music stream untouched into the output directory.
    async fn passthrough(&self, music: &Path, out_dir: &Path) -> MediaResult<PathBuf> {
        let ext = music
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mka".to_string());
        let path = out_dir.join(format!("mixed-audio.{}", ext));

        let cmd = FfmpegCommand::new(&path)
            .label("mix-passthrough")
            .input(music)
            .map("0:a")
            .output_args(["-map_metadata", "0"])
            .audio_codec("copy");
        self.runner.run(&cmd).await?;

        debug!(path = %path.display(), "Music passed through without voiceovers");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(index: usize, offset: f64, duration: f64) -> SceneAudioSegment {
        SceneAudioSegment::new(index, format!("vo-{index}.mp3"), offset, duration).unwrap()
    }

    #[test]
    fn test_plan_drops_late_segments() {
        let plan = MixPlan::new(
            20.0,
            vec![seg(0, 0.0, 3.0), seg(1, 8.0, 4.0), seg(2, 16.0, 6.0), seg(3, 24.0, 2.0)],
        )
        .unwrap();

        assert_eq!(plan.segments.len(), 3);
        assert_eq!(plan.dropped, vec![3]);
        assert!(!plan.is_passthrough());
    }

    #[test]
    fn test_segment_at_exact_end_is_dropped() {
        let plan = MixPlan::new(16.0, vec![seg(0, 8.0, 2.0), seg(1, 16.0, 2.0)]).unwrap();
        assert_eq!(plan.dropped, vec![1]);
    }

    #[test]
    fn test_all_dropped_is_passthrough() {
        let plan = MixPlan::new(5.0, vec![seg(0, 8.0, 2.0)]).unwrap();
        assert!(plan.is_passthrough());
        assert!(MixPlan::new(5.0, vec![]).unwrap().is_passthrough());
    }

    #[test]
    fn test_plan_rejects_out_of_order_offsets() {
        let err = MixPlan::new(30.0, vec![seg(0, 8.0, 2.0), seg(1, 0.0, 2.0)]).unwrap_err();
        assert!(matches!(err, MediaError::Model(_)));
    }

    #[test]
    fn test_mix_graph() {
        let plan = MixPlan::new(30.0, vec![seg(0, 0.0, 3.5), seg(1, 8.0, 4.0)]).unwrap();
        let graph = plan.build_mix_graph(&DuckingConfig::default());

        assert_eq!(
            graph,
            "[0:a]volume='if(between(t,0.000,3.500)+between(t,8.000,12.000),0.65,1)':eval=frame[music];\
             [1:a]adelay=0:all=1[vo0];\
             [2:a]adelay=8000:all=1[vo1];\
             [music][vo0][vo1]amix=inputs=3:duration=first:dropout_transition=0:normalize=0:weights='1 1 1',\
             loudnorm=I=-16:TP=-1.5:LRA=11[mix]"
        );
    }

    #[test]
    fn test_mix_graph_without_loudness() {
        let plan = MixPlan::new(30.0, vec![seg(0, 8.0, 4.0)]).unwrap();
        let config = DuckingConfig::default()
            .with_attenuation(0.5)
            .with_weights(1.0, 0.8)
            .with_loudness(None);
        let graph = plan.build_mix_graph(&config);
        assert!(graph.contains(",0.5,1)"));
        assert!(graph.contains("weights='1 0.8'[mix]"));
        assert!(!graph.contains("loudnorm"));
    }

    #[test]
    fn test_config_validation() {
        assert!(DuckingConfig::default().validate().is_ok());
        assert!(DuckingConfig::default().with_attenuation(1.5).validate().is_err());
        assert!(DuckingConfig::default().with_weights(-1.0, 1.0).validate().is_err());
    }

    #[tokio::test]
    async fn test_missing_music_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = AudioMixer::default()
            .mix(dir.path().join("calm.mp3"), &[], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
