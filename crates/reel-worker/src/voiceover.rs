//! Voiceover synthesis.
//!
//! Voiceovers follow the assembled video, not the request: the scene whose
//! clip plays in timeline slot `n` is narrated from `n * interval`. Each
//! scene's text becomes `voiceover-{scene}.mp3` in the job directory. Empty
//! text leaves its slot silent; a scene whose synthesis fails loses its
//! voiceover without failing the run.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use reel_genai::{retry_with_backoff, GenerationClient, RetryConfig, SpeechRequest};
use reel_media::VoiceoverTrack;
use reel_models::{cadence_offset, Language, SceneInput};

use crate::error::PipelineResult;
use crate::metrics::record_scene_fallback;

#[derive(Clone)]
pub struct VoiceoverSynthesizer {
    client: Arc<dyn GenerationClient>,
    retry: RetryConfig,
    interval_secs: f64,
    max_parallel: usize,
}

impl VoiceoverSynthesizer {
    pub fn new(client: Arc<dyn GenerationClient>, retry: RetryConfig, interval_secs: f64) -> Self {
        Self {
            client,
            retry,
            interval_secs,
            max_parallel: 8,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Render every non-empty voiceover concurrently, returned in timeline order.
    ///
    /// `timeline` holds `(scene index, scene)` pairs for the scenes that
    /// kept a clip, in the order their clips play.
    pub async fn synthesize_voiceovers(
        &self,
        timeline: &[(usize, &SceneInput)],
        language: &Language,
        voice: Option<&str>,
        dir: &Path,
    ) -> PipelineResult<Vec<VoiceoverTrack>> {
        tokio::fs::create_dir_all(dir).await?;
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));

        let futures: Vec<_> = timeline
            .iter()
            .enumerate()
            .filter(|(_, (_, scene))| !scene.voiceover.trim().is_empty())
            .map(|(slot, &(index, scene))| {
                let semaphore = Arc::clone(&semaphore);
                let request = SpeechRequest {
                    text: scene.voiceover.clone(),
                    language_code: language.code.clone(),
                    voice: voice.map(str::to_string),
                };
                let path = dir.join(format!("voiceover-{index}.mp3"));

                async move {
                    let _permit = semaphore.acquire().await;
                    let audio = retry_with_backoff(&self.retry, "synthesize_speech", || {
                        self.client.synthesize_speech(&request)
                    })
                    .await;

                    let track = match audio {
                        Ok(bytes) => match tokio::fs::write(&path, &bytes).await {
                            Ok(()) => Some(VoiceoverTrack::new(
                                index,
                                &path,
                                cadence_offset(slot, self.interval_secs),
                            )),
                            Err(e) => {
                                warn!(scene_index = index, "Failed to write voiceover: {}", e);
                                None
                            }
                        },
                        Err(e) => {
                            warn!(scene_index = index, "Voiceover synthesis failed, scene will be silent: {}", e);
                            None
                        }
                    };
                    if track.is_none() {
                        record_scene_fallback("voiceover");
                    }
                    (slot, track)
                }
            })
            .collect();

        let mut results = join_all(futures).await;
        results.sort_by_key(|(slot, _)| *slot);

        let tracks: Vec<_> = results.into_iter().filter_map(|(_, track)| track).collect();
        debug!(tracks = tracks.len(), "Synthesized voiceovers");
        Ok(tracks)
    }
}
