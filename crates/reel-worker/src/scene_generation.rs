//! Per-scene video generation fan-out.
//!
//! Scenes that already carry a clip keep it. Scenes with a seed image are
//! submitted (with backoff retry) and polled concurrently; a scene whose
//! generation fails gets the placeholder clip so the batch can continue.
//! Scenes with neither are skipped.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{watch, Semaphore};
use tracing::{info, warn};

use reel_genai::{
    retry_with_backoff, GenAiError, GenAiResult, GenerationClient, JobPoller, RetryConfig, VideoRequest,
};
use reel_models::{ClipReference, SceneInput};

use crate::error::{PipelineError, PipelineResult};
use crate::metrics::record_scene_fallback;

/// How a scene's clip was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipSource {
    Provided,
    Generated,
    Placeholder,
}

/// A scene's clip, tagged with the scene it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneClip {
    pub index: usize,
    pub clip: ClipReference,
    pub source: ClipSource,
}

enum Plan<'a> {
    Provided(ClipReference),
    Generate(&'a str, &'a str),
    Skip,
}

#[derive(Clone)]
pub struct SceneGenerator {
    client: Arc<dyn GenerationClient>,
    retry: RetryConfig,
    poller: JobPoller,
    placeholder: Option<ClipReference>,
    max_parallel: usize,
}

impl SceneGenerator {
    pub fn new(client: Arc<dyn GenerationClient>, retry: RetryConfig, poller: JobPoller) -> Self {
        Self {
            client,
            retry,
            poller,
            placeholder: None,
            max_parallel: 8,
        }
    }

    pub fn with_placeholder(mut self, placeholder: Option<ClipReference>) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Abandon outstanding generation jobs once `cancel` observes `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.poller = self.poller.with_cancel(cancel);
        self
    }

    /// Submit one scene and wait for its clip.
    async fn generate(&self, index: usize, prompt: &str, image: &str) -> GenAiResult<ClipReference> {
        let request = VideoRequest::new(prompt).with_seed_image(image);
        let operation = retry_with_backoff(&self.retry, "submit_video", || {
            self.client.submit_video(&request)
        })
        .await?;

        info!(scene_index = index, operation = %operation, "Waiting for scene video");
        self.poller.wait_for_clip(&*self.client, &operation).await
    }

    /// Resolve a clip for every scene that can have one, in scene order.
    pub async fn generate_scene_clips(&self, scenes: &[SceneInput]) -> PipelineResult<Vec<SceneClip>> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));

        let futures: Vec<_> = scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| {
                let plan = match (&scene.video_uri, &scene.image_base64) {
                    (Some(clip), _) => Plan::Provided(clip.clone()),
                    (None, Some(image)) => {
                        Plan::Generate(scene.video_prompt.as_deref().unwrap_or_default(), image.as_str())
                    }
                    (None, None) => Plan::Skip,
                };
                let semaphore = Arc::clone(&semaphore);

                async move {
                    let result = match plan {
                        Plan::Provided(clip) => Ok(Some((clip, ClipSource::Provided))),
                        Plan::Skip => {
                            info!(scene_index = index, "Scene has no clip or seed image, skipping");
                            Ok(None)
                        }
                        Plan::Generate(prompt, image) => {
                            let _permit = semaphore.acquire().await;
                            match self.generate(index, prompt, image).await {
                                Ok(clip) => Ok(Some((clip, ClipSource::Generated))),
                                // A cancelled run is over; no placeholder.
                                Err(e @ GenAiError::Cancelled(_)) => Err(PipelineError::from(e)),
                                Err(e) => self.fall_back(index, e.to_string()).map(Some),
                            }
                        }
                    };
                    (index, result)
                }
            })
            .collect();

        let mut results = join_all(futures).await;
        results.sort_by_key(|(index, _)| *index);

        let mut clips = Vec::with_capacity(results.len());
        for (index, result) in results {
            if let Some((clip, source)) = result? {
                clips.push(SceneClip { index, clip, source });
            }
        }
        Ok(clips)
    }

    fn fall_back(&self, index: usize, reason: String) -> PipelineResult<(ClipReference, ClipSource)> {
        match &self.placeholder {
            Some(placeholder) => {
                warn!(scene_index = index, "Scene generation failed, using placeholder: {}", reason);
                record_scene_fallback("video");
                Ok((placeholder.clone(), ClipSource::Placeholder))
            }
            None => Err(PipelineError::MissingClip { index, reason }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reel_genai::{OperationSource, PollerConfig, SpeechRequest};
    use reel_models::LongRunningOperation;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scene N's job finishes after 3 - N polls; "reject" prompts fail and
    /// "stuck" prompts never finish.
    #[derive(Default)]
    struct FakeVeo {
        submits: Mutex<u32>,
        polls: Mutex<std::collections::HashMap<String, u32>>,
    }

    #[async_trait]
    impl OperationSource for FakeVeo {
        async fn operation_status(&self, name: &str) -> GenAiResult<LongRunningOperation> {
            let mut polls = self.polls.lock().unwrap();
            let count = polls.entry(name.to_string()).or_default();
            *count += 1;

            let (kind, index) = name.split_once('/').unwrap_or((name, "0"));
            let index: u32 = index.parse().unwrap_or(0);
            if kind == "stuck" || *count <= 3 - index.min(3) {
                return Ok(LongRunningOperation::pending(name));
            }
            if kind == "reject" {
                return Ok(LongRunningOperation::failed(name, 3, "prompt violates policy"));
            }
            let clip = ClipReference::parse(&format!("gs://generated/scene-{index}.mp4")).unwrap();
            Ok(LongRunningOperation::succeeded(name, vec![clip]))
        }
    }

    #[async_trait]
    impl GenerationClient for FakeVeo {
        async fn submit_video(&self, request: &VideoRequest) -> GenAiResult<String> {
            *self.submits.lock().unwrap() += 1;
            let (kind, index) = request.prompt.split_once(' ').unwrap_or(("ok", "0"));
            Ok(format!("{kind}/{index}"))
        }

        async fn generate_image(&self, _prompt: &str) -> GenAiResult<Vec<u8>> {
            Err(GenAiError::config("unused"))
        }

        async fn generate_music(&self, _prompt: &str) -> GenAiResult<Vec<u8>> {
            Err(GenAiError::config("unused"))
        }

        async fn synthesize_speech(&self, _request: &SpeechRequest) -> GenAiResult<Vec<u8>> {
            Err(GenAiError::config("unused"))
        }
    }

    fn scene(prompt: Option<&str>, clip: Option<&str>, image: bool) -> SceneInput {
        SceneInput {
            video_uri: clip.map(|c| ClipReference::parse(c).unwrap()),
            video_prompt: prompt.map(str::to_string),
            image_base64: image.then(|| "aW1hZ2U=".to_string()),
            voiceover: String::new(),
        }
    }

    fn generator(client: Arc<FakeVeo>) -> SceneGenerator {
        SceneGenerator::new(
            client,
            RetryConfig::default().with_jitter(Duration::ZERO),
            JobPoller::new(PollerConfig::default().with_interval(Duration::from_millis(10))),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_scenes_in_order() {
        let client = Arc::new(FakeVeo::default());
        let scenes = vec![
            scene(Some("ok 0"), None, true),
            scene(None, Some("gs://provided/intro.mp4"), false),
            scene(None, None, false),
            scene(Some("ok 3"), None, true),
        ];

        let clips = generator(client.clone()).generate_scene_clips(&scenes).await.unwrap();

        assert_eq!(clips.len(), 3);
        assert_eq!(clips.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(clips[0].clip.to_string(), "gs://generated/scene-0.mp4");
        assert_eq!(clips[0].source, ClipSource::Generated);
        assert_eq!(clips[1].source, ClipSource::Provided);
        assert_eq!(clips[2].clip.to_string(), "gs://generated/scene-3.mp4");
        assert_eq!(*client.submits.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_scene_uses_placeholder() {
        let client = Arc::new(FakeVeo::default());
        let placeholder = ClipReference::parse("gs://assets/placeholder.mp4").unwrap();
        let scenes = vec![scene(Some("ok 0"), None, true), scene(Some("reject 1"), None, true)];

        let clips = generator(client)
            .with_placeholder(Some(placeholder.clone()))
            .generate_scene_clips(&scenes)
            .await
            .unwrap();

        assert_eq!(clips.len(), 2);
        assert_eq!(clips[1].clip, placeholder);
        assert_eq!(clips[1].source, ClipSource::Placeholder);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_scene_without_placeholder_reports_cause() {
        let client = Arc::new(FakeVeo::default());
        let scenes = vec![scene(Some("reject 2"), None, true)];

        let err = generator(client).generate_scene_clips(&scenes).await.unwrap_err();
        match err {
            PipelineError::MissingClip { index, reason } => {
                assert_eq!(index, 0);
                assert!(reason.contains("prompt violates policy"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_instead_of_falling_back() {
        let client = Arc::new(FakeVeo::default());
        let placeholder = ClipReference::parse("gs://assets/placeholder.mp4").unwrap();
        let scenes = vec![scene(Some("stuck 0"), None, true)];
        let (tx, rx) = watch::channel(false);

        let generator = generator(client).with_placeholder(Some(placeholder)).with_cancel(rx);
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(25)).await;
            tx.send(true).unwrap();
        };
        let (result, _) = tokio::join!(generator.generate_scene_clips(&scenes), cancel);

        assert!(matches!(result, Err(PipelineError::GenAi(GenAiError::Cancelled(_)))));
    }
}
