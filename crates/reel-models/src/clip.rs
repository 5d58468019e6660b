//! Clip references.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::locator::{ObjectLocator, GCS_SCHEME};

/// Pointer to a generated asset: exactly one addressing mode at a time.
///
/// Serialized as a plain string (`gs://...`, `https://...` or a filesystem
/// path) so requests can carry whatever the generation step produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ClipReference {
    /// Canonical remote object
    Remote(ObjectLocator),
    /// Time-limited signed URL wrapping a remote object
    SignedUrl(String),
    /// Local filesystem path
    Local(PathBuf),
}

impl ClipReference {
    /// Classify a raw reference string.
    pub fn parse(raw: &str) -> ModelResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ModelError::malformed(raw, "empty clip reference"));
        }

        if raw.starts_with(GCS_SCHEME) {
            return ObjectLocator::parse(raw).map(Self::Remote);
        }

        if raw.starts_with("https://") || raw.starts_with("http://") {
            return Ok(Self::SignedUrl(raw.to_string()));
        }

        if raw.contains("://") {
            return Err(ModelError::malformed(raw, "unsupported URI scheme"));
        }

        Ok(Self::Local(PathBuf::from(raw)))
    }

    /// Reference a local file.
    pub fn local(path: impl AsRef<Path>) -> Self {
        Self::Local(path.as_ref().to_path_buf())
    }

    /// Canonical remote locator, normalising signed URLs back to `gs://`.
    ///
    /// Returns `Ok(None)` for local references.
    pub fn canonical_locator(&self) -> ModelResult<Option<ObjectLocator>> {
        match self {
            Self::Remote(loc) => Ok(Some(loc.clone())),
            Self::SignedUrl(url) => ObjectLocator::from_signed_url(url).map(Some),
            Self::Local(_) => Ok(None),
        }
    }

    /// Whether the reference points into the object store.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Local(_))
    }

    /// File extension of the referenced asset, lowercased.
    pub fn extension(&self) -> Option<String> {
        let ext = match self {
            Self::Remote(loc) => loc.extension().map(str::to_string),
            Self::SignedUrl(url) => ObjectLocator::from_signed_url(url)
                .ok()
                .and_then(|loc| loc.extension().map(str::to_string)),
            Self::Local(path) => path.extension().map(|e| e.to_string_lossy().into_owned()),
        };
        ext.map(|e| e.to_ascii_lowercase())
    }
}

impl fmt::Display for ClipReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(loc) => write!(f, "{}", loc),
            Self::SignedUrl(url) => write!(f, "{}", url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for ClipReference {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ClipReference {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ClipReference> for String {
    fn from(value: ClipReference) -> Self {
        value.to_string()
    }
}
