//! Publish the final video.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use reel_media::{move_file, ComposedVideo};
use reel_models::{CompositionJobId, OutputMode, PublishedVideo, StoragePrefix};
use reel_storage::ObjectStore;

use crate::error::{PipelineError, PipelineResult};

#[derive(Clone)]
pub struct Publisher {
    mode: OutputMode,
    store: Arc<dyn ObjectStore>,
    prefix: Option<StoragePrefix>,
    local_dir: PathBuf,
    ttl: Duration,
}

impl Publisher {
    pub fn new(
        mode: OutputMode,
        store: Arc<dyn ObjectStore>,
        prefix: Option<StoragePrefix>,
        local_dir: impl Into<PathBuf>,
        ttl: Duration,
    ) -> Self {
        Self {
            mode,
            store,
            prefix,
            local_dir: local_dir.into(),
            ttl,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Persist `video` as `<job-id>.mp4` and return the caller-facing address.
    pub async fn publish(&self, job_id: &CompositionJobId, video: &ComposedVideo) -> PipelineResult<PublishedVideo> {
        let file_name = format!("{}.mp4", job_id);

        let (address, locator) = match self.mode {
            OutputMode::SignedUrl => {
                let prefix = self.prefix.as_ref().ok_or_else(|| {
                    PipelineError::config("no output base URI configured for signed_url mode")
                })?;
                let dest = prefix.object(&file_name)?;
                let stored = self.store.upload(&video.path, &dest).await?;
                let url = self.store.signed_url(&stored, self.ttl).await?;
                (url, Some(stored))
            }
            OutputMode::LocalPath => {
                tokio::fs::create_dir_all(&self.local_dir).await?;
                let dest = self.local_dir.join(&file_name);
                move_file(&video.path, &dest).await?;
                (dest.display().to_string(), None)
            }
        };

        info!(
            job_id = %job_id,
            mode = self.mode.as_str(),
            duration_secs = video.duration,
            "Published final video"
        );

        Ok(PublishedVideo {
            job_id: job_id.clone(),
            address,
            locator,
            duration_secs: video.duration,
            published_at: Utc::now(),
        })
    }
}
