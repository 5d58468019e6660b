//! Canonical remote object locators.
//!
//! Generated assets live in an object store and are addressed canonically as
//! `gs://<bucket>/<object path>`. Signed access URLs handed to clients are
//! path-style (`https://<host>/<bucket>/<object path>?<signature>`), so the
//! canonical locator can always be recovered from the URL path.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ModelError, ModelResult};

/// URI scheme prefix for canonical locators.
pub const GCS_SCHEME: &str = "gs://";

/// A bucket + object path pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ObjectLocator {
    /// Bucket name
    pub bucket: String,
    /// Object path inside the bucket (no leading slash)
    pub path: String,
}

impl ObjectLocator {
    /// Create a locator, rejecting empty bucket or object path.
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> ModelResult<Self> {
        let bucket = bucket.into();
        let path = path.into().trim_start_matches('/').to_string();

        if bucket.is_empty() || bucket.contains('/') {
            return Err(ModelError::malformed(
                format!("{GCS_SCHEME}{bucket}/{path}"),
                "bucket name is empty or contains '/'",
            ));
        }
        if path.is_empty() {
            return Err(ModelError::malformed(
                format!("{GCS_SCHEME}{bucket}/"),
                "object path is empty",
            ));
        }

        Ok(Self { bucket, path })
    }

    /// Parse a `gs://bucket/path` URI.
    pub fn parse(uri: &str) -> ModelResult<Self> {
        let rest = uri
            .trim()
            .strip_prefix(GCS_SCHEME)
            .ok_or_else(|| ModelError::malformed(uri, "expected gs://<bucket>/<path>"))?;

        let (bucket, path) = rest
            .split_once('/')
            .ok_or_else(|| ModelError::malformed(uri, "missing object path after bucket"))?;

        Self::new(bucket, path).map_err(|e| match e {
            ModelError::MalformedReference { reason, .. } => ModelError::malformed(uri, reason),
            other => other,
        })
    }

    /// Recover the canonical locator from a path-style signed URL.
    ///
    /// The first path segment is the bucket and the remaining segments form
    /// the object path. Query parameters (signature, expiry) are discarded.
    pub fn from_signed_url(signed_url: &str) -> ModelResult<Self> {
        let url = Url::parse(signed_url)
            .map_err(|e| ModelError::malformed(signed_url, format!("invalid URL: {e}")))?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.collect())
            .unwrap_or_default();

        if segments.len() < 2 || segments[0].is_empty() || segments[1..].iter().all(|s| s.is_empty()) {
            return Err(ModelError::malformed(
                signed_url,
                "URL path must contain at least a bucket and an object segment",
            ));
        }

        let bucket = decode_segment(signed_url, segments[0])?;
        let path = segments[1..]
            .iter()
            .map(|s| decode_segment(signed_url, s))
            .collect::<ModelResult<Vec<_>>>()?
            .join("/");

        Self::new(bucket, path).map_err(|e| match e {
            ModelError::MalformedReference { reason, .. } => ModelError::malformed(signed_url, reason),
            other => other,
        })
    }

    /// Canonical `gs://` URI.
    pub fn uri(&self) -> String {
        format!("{}{}/{}", GCS_SCHEME, self.bucket, self.path)
    }

    /// Last segment of the object path.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// File extension of the object, if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }
}

fn decode_segment(source: &str, segment: &str) -> ModelResult<String> {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|e| ModelError::malformed(source, format!("invalid percent-encoding: {e}")))
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", GCS_SCHEME, self.bucket, self.path)
    }
}

impl FromStr for ObjectLocator {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A bucket with an optional key prefix, e.g. `gs://bucket/renders`.
///
/// Used as the destination for published videos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StoragePrefix {
    pub bucket: String,
    pub prefix: String,
}

impl StoragePrefix {
    /// Parse `gs://bucket` or `gs://bucket/some/prefix/`.
    pub fn parse(uri: &str) -> ModelResult<Self> {
        let rest = uri
            .trim()
            .strip_prefix(GCS_SCHEME)
            .ok_or_else(|| ModelError::malformed(uri, "expected gs://<bucket>[/<prefix>]"))?;

        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(ModelError::malformed(uri, "bucket name is empty"));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        })
    }

    /// Locator for an object named `name` under this prefix.
    pub fn object(&self, name: &str) -> ModelResult<ObjectLocator> {
        let path = if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        };
        ObjectLocator::new(self.bucket.clone(), path)
    }
}
