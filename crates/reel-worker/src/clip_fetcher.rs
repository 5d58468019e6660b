//! Materialise clip references as local files.
//!
//! Remote clips (including signed URLs, which are first normalised back to
//! their `gs://` locator) are downloaded into the job's scratch directory.
//! Local references are used in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use reel_models::ClipReference;
use reel_storage::{ObjectStore, StorageError, StorageResult};

use crate::error::{PipelineError, PipelineResult};
use crate::scene_generation::SceneClip;

#[derive(Clone)]
pub struct ClipFetcher {
    store: Arc<dyn ObjectStore>,
    max_parallel: usize,
}

impl ClipFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, max_parallel: usize) -> Self {
        Self {
            store,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Materialise one reference as `<dest_dir>/<stem>.<ext>`.
    pub async fn fetch(&self, clip: &ClipReference, dest_dir: &Path, stem: &str) -> StorageResult<PathBuf> {
        let locator = match clip {
            ClipReference::Local(path) => {
                if !tokio::fs::try_exists(path).await? {
                    return Err(StorageError::not_found(path.display().to_string()));
                }
                return Ok(path.clone());
            }
            remote => remote
                .canonical_locator()?
                .ok_or_else(|| StorageError::not_found(remote.to_string()))?,
        };

        let ext = clip.extension().unwrap_or_else(|| "mp4".to_string());
        let dest = dest_dir.join(format!("{stem}.{ext}"));
        self.store.download(&locator, &dest).await?;
        debug!(source = %locator, dest = %dest.display(), "Fetched clip");
        Ok(dest)
    }

    /// Fetch every clip concurrently as `video-{position}.<ext>`.
    ///
    /// The returned paths follow the timeline order of `clips`, whatever
    /// order the downloads finish in. A failure names the scene the clip
    /// belongs to; the earliest failing clip on the timeline is reported.
    pub async fn fetch_all(&self, clips: &[SceneClip], dest_dir: &Path) -> PipelineResult<Vec<PathBuf>> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));

        let futures: Vec<_> = clips
            .iter()
            .enumerate()
            .map(|(position, scene_clip)| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let _permit = semaphore.acquire().await;
                    let result = self
                        .fetch(&scene_clip.clip, dest_dir, &format!("video-{position}"))
                        .await;
                    (position, scene_clip.index, result)
                }
            })
            .collect();

        let mut results = join_all(futures).await;
        results.sort_by_key(|(position, _, _)| *position);

        let paths = results
            .into_iter()
            .map(|(_, index, result)| result.map_err(|source| PipelineError::ClipFetch { index, source }))
            .collect::<PipelineResult<Vec<_>>>()?;

        info!(clips = paths.len(), "Fetched scene clips");
        Ok(paths)
    }
}
