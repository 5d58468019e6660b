//! S3-compatible object store.
//!
//! Talks to any S3 API endpoint. Against Google Cloud Storage this is the
//! XML interoperability endpoint with HMAC keys, which keeps `gs://`
//! locators and path-style presigned URLs interchangeable.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use reel_models::ObjectLocator;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{content_type_for, ObjectStore};

/// Default endpoint: GCS XML API.
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Longest TTL accepted by SigV4 presigning (7 days).
const MAX_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for the S3-compatible store.
#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID (HMAC key for GCS)
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Region ("auto" works for GCS and R2)
    pub region: String,
}

impl S3StoreConfig {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT.to_string(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: "auto".to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = endpoint_url.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("STORAGE_ENDPOINT_URL")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            access_key_id: std::env::var("STORAGE_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("STORAGE_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("STORAGE_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("STORAGE_SECRET_ACCESS_KEY not set"))?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// Object store over the S3 API. Buckets come from each locator.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(config: S3StoreConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "reel-storage",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(S3StoreConfig::from_env()?))
    }

    /// Check connectivity by heading a bucket.
    pub async fn check_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("bucket {} is not reachable: {}", bucket, e)))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, local: &Path, dest: &ObjectLocator) -> StorageResult<ObjectLocator> {
        debug!(src = %local.display(), dest = %dest, "Uploading");

        let body = ByteStream::from_path(local)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", local.display(), e)))?;

        self.client
            .put_object()
            .bucket(&dest.bucket)
            .key(&dest.path)
            .body(body)
            .content_type(content_type_for(&dest.path))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", dest, e)))?;

        info!(dest = %dest, "Uploaded {}", local.display());
        Ok(dest.clone())
    }

    async fn download(&self, src: &ObjectLocator, dest: &Path) -> StorageResult<()> {
        debug!(src = %src, dest = %dest.display(), "Downloading");

        let response = self
            .client
            .get_object()
            .bucket(&src.bucket)
            .key(&src.path)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_no_such_key()).unwrap_or(false) {
                    StorageError::not_found(src.uri())
                } else {
                    StorageError::download_failed(format!("{}: {}", src, e))
                }
            })?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut reader = response.body.into_async_read();
        let mut file = tokio::fs::File::create(dest).await?;
        let bytes = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| StorageError::download_failed(format!("{}: {}", src, e)))?;
        file.flush().await?;

        info!(src = %src, bytes, "Downloaded to {}", dest.display());
        Ok(())
    }

    async fn signed_url(&self, locator: &ObjectLocator, ttl: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(ttl.min(MAX_PRESIGN_TTL))
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&locator.bucket)
            .key(&locator.path)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(format!("{}: {}", locator, e)))?;

        Ok(presigned.uri().to_string())
    }

    async fn exists(&self, locator: &ObjectLocator) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&locator.bucket)
            .key(&locator.path)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) => Ok(false),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }
}
