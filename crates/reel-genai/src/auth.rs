//! Bearer tokens for Google APIs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{GenAiError, GenAiResult};

/// Refresh tokens this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Assumed lifetime when the provider reports none.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Source of OAuth bearer tokens.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> GenAiResult<String>;
}

/// Fixed token, for tests and local emulators.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> GenAiResult<String> {
        Ok(self.0.clone())
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Cached tokens from `gcp_auth`.
///
/// Refreshes under a write lock so concurrent callers share one refresh, and
/// keeps serving a still-unexpired token if a refresh fails.
pub struct GcpTokenSource {
    provider: Arc<dyn TokenProvider>,
    cache: RwLock<Option<CachedToken>>,
}

impl GcpTokenSource {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            cache: RwLock::new(None),
        }
    }

    /// Service account from `GOOGLE_APPLICATION_CREDENTIALS`, falling back
    /// to application default credentials.
    pub async fn from_env() -> GenAiResult<Self> {
        let service_account = CustomServiceAccount::from_env()
            .map_err(|e| GenAiError::Auth(format!("Failed to load service account: {}", e)))?;

        let provider: Arc<dyn TokenProvider> = match service_account {
            Some(sa) => Arc::new(sa),
            None => gcp_auth::provider()
                .await
                .map_err(|e| GenAiError::Auth(format!("No Google credentials available: {}", e)))?,
        };

        Ok(Self::new(provider))
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn refresh(&self, cache: &mut Option<CachedToken>) -> GenAiResult<String> {
        match self.provider.token(&[CLOUD_PLATFORM_SCOPE]).await {
            Ok(token) => {
                let access_token = token.as_str().to_string();
                let now = Utc::now();
                let exp = token.expires_at();
                let expires_at = if exp > now {
                    Instant::now() + (exp - now).to_std().unwrap_or(TOKEN_DEFAULT_TTL)
                } else {
                    Instant::now()
                };

                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });
                debug!("Refreshed generation API token");
                Ok(access_token)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref().filter(|c| c.is_usable()) {
                    warn!("Token refresh failed, using existing token: {}", e);
                    return Ok(cached.access_token.clone());
                }
                Err(GenAiError::Auth(format!("Failed to obtain auth token: {}", e)))
            }
        }
    }
}

#[async_trait]
impl AccessTokenSource for GcpTokenSource {
    async fn access_token(&self) -> GenAiResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
            return Ok(cached.access_token.clone());
        }
        self.refresh(&mut cache).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token() {
        let source = StaticToken::new("ya29.test");
        let token = tokio_test::block_on(source.access_token()).unwrap();
        assert_eq!(token, "ya29.test");
    }

    #[test]
    fn test_cached_token_margin() {
        let fresh = CachedToken {
            access_token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(600),
        };
        assert!(fresh.is_valid());

        let closing = CachedToken {
            access_token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(!closing.is_valid());
        assert!(closing.is_usable());
    }
}
