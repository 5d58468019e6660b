//! Filesystem-backed object store.
//!
//! Objects live at `<root>/<bucket>/<path>`. Signed URLs are plain links
//! under an optional public base URL (for a static file server), or the
//! absolute file path when no base URL is configured.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reel_models::ObjectLocator;
use tokio::fs;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_base_url: None,
        }
    }

    pub fn with_public_base_url(mut self, base: impl Into<String>) -> Self {
        self.public_base_url = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path backing `locator`.
    pub fn object_path(&self, locator: &ObjectLocator) -> StorageResult<PathBuf> {
        let escapes = locator
            .path
            .split('/')
            .chain(std::iter::once(locator.bucket.as_str()))
            .any(|segment| segment == "..");
        if escapes {
            return Err(StorageError::InvalidLocator(reel_models::ModelError::malformed(
                locator.uri(),
                "path escapes the store root",
            )));
        }
        Ok(self.root.join(&locator.bucket).join(&locator.path))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, local: &Path, dest: &ObjectLocator) -> StorageResult<ObjectLocator> {
        let target = self.object_path(dest)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(local, &target)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", dest, e)))?;
        debug!(dest = %dest, "Stored {}", local.display());
        Ok(dest.clone())
    }

    async fn download(&self, src: &ObjectLocator, dest: &Path) -> StorageResult<()> {
        let source = self.object_path(src)?;
        if !fs::try_exists(&source).await? {
            return Err(StorageError::not_found(src.uri()));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&source, dest)
            .await
            .map_err(|e| StorageError::download_failed(format!("{}: {}", src, e)))?;
        Ok(())
    }

    async fn signed_url(&self, locator: &ObjectLocator, _ttl: Duration) -> StorageResult<String> {
        let path = self.object_path(locator)?;
        Ok(match &self.public_base_url {
            Some(base) => format!("{}/{}/{}", base, locator.bucket, locator.path),
            None => path.to_string_lossy().into_owned(),
        })
    }

    async fn exists(&self, locator: &ObjectLocator) -> StorageResult<bool> {
        Ok(fs::try_exists(self.object_path(locator)?).await?)
    }
}
