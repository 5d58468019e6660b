//! Object store abstraction.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reel_models::ObjectLocator;

use crate::error::StorageResult;

/// Durable object storage used to fetch clips and publish results.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file to `dest` and return the stored locator.
    async fn upload(&self, local: &Path, dest: &ObjectLocator) -> StorageResult<ObjectLocator>;

    /// Download `src` into the local file `dest`, creating parent directories.
    async fn download(&self, src: &ObjectLocator, dest: &Path) -> StorageResult<()>;

    /// Time-limited read URL for `locator`.
    async fn signed_url(&self, locator: &ObjectLocator, ttl: Duration) -> StorageResult<String>;

    /// Whether `locator` exists.
    async fn exists(&self, locator: &ObjectLocator) -> StorageResult<bool>;
}

/// MIME type for the asset kinds the pipeline stores.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
