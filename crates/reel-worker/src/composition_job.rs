//! Working state of one assembly run.
//!
//! The job owns a scratch directory under the configured work dir. Every
//! intermediate file of the run lives there, and the directory is removed
//! when the job is closed or dropped, whichever exit path is taken.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use reel_media::VoiceoverTrack;
use reel_models::{ClipReference, CompositionJobId, Mood};

use crate::error::PipelineResult;
use crate::scene_generation::SceneClip;

#[derive(Debug)]
pub struct CompositionJob {
    id: CompositionJobId,
    scratch: TempDir,
    pub mood: Mood,
    /// Clips in timeline order, tagged with their scene
    pub clips: Vec<SceneClip>,
    /// Rendered voiceovers in timeline order
    pub voiceovers: Vec<VoiceoverTrack>,
    pub logo: Option<ClipReference>,
}

impl CompositionJob {
    /// Allocate a fresh scratch directory under `work_dir`.
    pub async fn create(work_dir: &Path, mood: Mood, logo: Option<ClipReference>) -> PipelineResult<Self> {
        tokio::fs::create_dir_all(work_dir).await?;

        let id = CompositionJobId::new();
        let scratch = tempfile::Builder::new()
            .prefix(&format!("reel-{}-", id))
            .tempdir_in(work_dir)?;
        debug!(job_id = %id, dir = %scratch.path().display(), "Created composition scratch dir");

        Ok(Self {
            id,
            scratch,
            mood,
            clips: Vec::new(),
            voiceovers: Vec::new(),
            logo,
        })
    }

    pub fn id(&self) -> &CompositionJobId {
        &self.id
    }

    /// Scratch directory.
    pub fn dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Path of a file inside the scratch directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.scratch.path().join(name)
    }

    /// Remove the scratch directory now, reporting failures.
    pub fn close(self) {
        let id = self.id;
        let dir = self.scratch.path().to_path_buf();
        match self.scratch.close() {
            Ok(()) => debug!(job_id = %id, "Removed composition scratch dir"),
            Err(e) => warn!(job_id = %id, dir = %dir.display(), "Failed to remove scratch dir: {}", e),
        }
    }
}
