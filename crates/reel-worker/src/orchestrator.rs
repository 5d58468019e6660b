//! Pipeline orchestrator: one assembly request in, one published video out.
//!
//! Stages run strictly in order: resolve scene clips, fetch them, render
//! voiceovers for the scenes that kept a clip, duck the mood music under
//! them, compose, publish. Each run
//! owns a [`CompositionJob`] whose scratch directory is removed on every
//! exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, Instrument};

use reel_genai::{GenerationClient, JobPoller, VertexClient};
use reel_media::{AudioMixer, FfmpegPipeline, MediaPipeline, VideoComposer, VoiceoverTrack};
use reel_models::{AssemblyRequest, MoodTrackMap, PublishedVideo};
use reel_storage::{LocalObjectStore, ObjectStore, S3ObjectStore};

use crate::clip_fetcher::ClipFetcher;
use crate::composition_job::CompositionJob;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics::record_run;
use crate::publish::Publisher;
use crate::scene_generation::SceneGenerator;
use crate::voiceover::VoiceoverSynthesizer;

pub struct PipelineOrchestrator {
    config: PipelineConfig,
    tracks: MoodTrackMap,
    media: Arc<dyn MediaPipeline>,
    fetcher: ClipFetcher,
    scenes: SceneGenerator,
    voiceovers: VoiceoverSynthesizer,
    publisher: Publisher,
}

impl PipelineOrchestrator {
    pub fn new(
        config: PipelineConfig,
        client: Arc<dyn GenerationClient>,
        store: Arc<dyn ObjectStore>,
        media: Arc<dyn MediaPipeline>,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let retry = config.retry_config();
        let poller = JobPoller::new(config.poller_config());

        let scenes = SceneGenerator::new(Arc::clone(&client), retry.clone(), poller)
            .with_placeholder(config.placeholder_clip.clone())
            .with_max_parallel(config.max_scene_parallel);
        let voiceovers = VoiceoverSynthesizer::new(client, retry, config.voiceover_interval_seconds)
            .with_max_parallel(config.max_scene_parallel);
        let fetcher = ClipFetcher::new(Arc::clone(&store), config.max_scene_parallel);
        let publisher = Publisher::new(
            config.output_mode,
            store,
            config.output_prefix()?,
            config.local_output_dir.clone(),
            config.signed_url_ttl,
        );

        Ok(Self {
            tracks: config.mood_tracks(),
            config,
            media,
            fetcher,
            scenes,
            voiceovers,
            publisher,
        })
    }

    /// Vertex AI, the configured object store and FFmpeg, all from the environment.
    pub async fn from_env() -> PipelineResult<Self> {
        Self::from_env_with_cancel(None).await
    }

    /// Like [`from_env`](Self::from_env), with generation polling and FFmpeg
    /// steps stopped once `cancel` observes `true`.
    pub async fn from_env_with_cancel(cancel: Option<watch::Receiver<bool>>) -> PipelineResult<Self> {
        let config = PipelineConfig::from_env()?;

        let client = Arc::new(VertexClient::from_env().await?);
        let store: Arc<dyn ObjectStore> = match &config.local_store_root {
            Some(root) => Arc::new(LocalObjectStore::new(root)),
            None => Arc::new(S3ObjectStore::from_env()?),
        };

        let mut runner = config.ffmpeg_runner();
        if let Some(rx) = &cancel {
            runner = runner.with_cancel(rx.clone());
        }
        let media = Arc::new(FfmpegPipeline::new(
            AudioMixer::new(config.ducking_config()).with_runner(runner.clone()),
            VideoComposer::new(config.composer_config()).with_runner(runner),
        ));

        let orchestrator = Self::new(config, client, store, media)?;
        Ok(match cancel {
            Some(rx) => orchestrator.with_cancel(rx),
            None => orchestrator,
        })
    }

    /// Abandon pending scene generation once `cancel` observes `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.scenes = self.scenes.with_cancel(cancel);
        self
    }

    /// Replace the mood to music mapping.
    pub fn with_tracks(mut self, tracks: MoodTrackMap) -> Self {
        self.tracks = tracks;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Assemble and publish one final video.
    pub async fn assemble(&self, request: &AssemblyRequest) -> PipelineResult<PublishedVideo> {
        if request.scenes.is_empty() {
            return Err(PipelineError::invalid_request("request has no scenes"));
        }
        let music = self.tracks.track_for(request.mood)?.to_path_buf();

        let mut job =
            CompositionJob::create(&self.config.work_dir, request.mood, request.logo_overlay.clone()).await?;
        let logger = JobLogger::new(job.id(), "assemble");
        logger.log_start(&format!("{} scenes, mood {}", request.scenes.len(), request.mood));

        let result = self
            .run(&mut job, request, &music, &logger)
            .instrument(logger.create_span())
            .await;
        job.close();

        let elapsed = logger.elapsed_secs();
        match &result {
            Ok(published) => {
                record_run("success", elapsed);
                logger.log_completion(&format!("{} ({:.1}s)", published.address, published.duration_secs));
            }
            Err(e) => {
                record_run(e.kind(), elapsed);
                logger.log_error(&e.to_string());
            }
        }
        result
    }

    async fn run(
        &self,
        job: &mut CompositionJob,
        request: &AssemblyRequest,
        music: &Path,
        logger: &JobLogger,
    ) -> PipelineResult<PublishedVideo> {
        let scene_clips = self.scenes.generate_scene_clips(&request.scenes).await?;
        if scene_clips.is_empty() {
            return Err(PipelineError::invalid_request("no scene has a clip or a seed image"));
        }
        job.clips = scene_clips;

        let local_clips = self.fetcher.fetch_all(&job.clips, job.dir()).await?;
        logger.log_stage("fetch", &format!("fetched {} clips", local_clips.len()));

        if request.with_voice_over {
            // Narration follows the clips that made it onto the timeline.
            let timeline: Vec<_> = job
                .clips
                .iter()
                .filter_map(|c| request.scenes.get(c.index).map(|scene| (c.index, scene)))
                .collect();
            let tracks = self
                .voiceovers
                .synthesize_voiceovers(&timeline, &request.language, request.voice.as_deref(), job.dir())
                .await?;
            if !tracks.is_empty() {
                let total = self.total_duration(&local_clips).await?;
                job.voiceovers = drop_late_tracks(tracks, total, logger);
            }
            logger.log_stage("voiceover", &format!("rendered {} voiceovers", job.voiceovers.len()));
        }

        let mix = self.media.mix_audio(music, &job.voiceovers, job.dir()).await?;
        logger.log_stage("mix", &format!("mixed audio ({} voiceovers ducked)", mix.plan.segments.len()));

        let logo = match &job.logo {
            Some(reference) => Some(self.fetcher.fetch(reference, job.dir(), "logo").await?),
            None => None,
        };

        let composed = self
            .media
            .compose(&local_clips, &mix.path, logo.as_deref(), job.dir())
            .await?;
        logger.log_stage("compose", &format!("composed {:.2}s video", composed.duration));

        self.publisher.publish(job.id(), &composed).await
    }

    async fn total_duration(&self, clips: &[PathBuf]) -> PipelineResult<f64> {
        let mut total = 0.0;
        for clip in clips {
            total += self.media.duration(clip).await?;
        }
        Ok(total)
    }
}

/// Keep tracks that start before the video ends.
fn drop_late_tracks(tracks: Vec<VoiceoverTrack>, total_secs: f64, logger: &JobLogger) -> Vec<VoiceoverTrack> {
    let (kept, late): (Vec<_>, Vec<_>) = tracks.into_iter().partition(|t| t.offset_secs < total_secs);
    if !late.is_empty() {
        let indices: Vec<_> = late.iter().map(|t| t.index).collect();
        info!(dropped = ?indices, total_secs, "Dropping voiceovers that start after the video ends");
        logger.log_warning(&format!("{} voiceovers start after the video ends", late.len()));
    }
    kept
}
