//! Backoff retrier.
//!
//! Delay after failed attempt `n` (0-based) is
//! `initial_delay * 2^n + uniform(0, jitter)`. Only retryable errors are
//! retried, and the error from the last attempt is returned unchanged.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info_span, warn, Instrument};

use crate::error::GenAiError;
use crate::metrics::record_retry;

/// Errors that can tell whether another attempt may succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Minimum wait requested by the remote side.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for GenAiError {
    fn is_retryable(&self) -> bool {
        GenAiError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        GenAiError::retry_after(self)
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay, doubled after every failed attempt.
    pub initial_delay: Duration,
    /// Upper bound of the uniform random jitter added to each delay.
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            jitter: Duration::from_millis(2000),
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Deterministic part of the delay after failed attempt `attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }

    /// Full delay including jitter.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        };
        self.delay_for_attempt(attempt).saturating_add(jitter)
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        let span = info_span!("genai_retry", operation = %operation, attempt = attempt + 1);
        match op().instrument(span).await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation = %operation, attempts = attempt + 1, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                let mut delay = config.jittered_delay(attempt);
                if let Some(after) = e.retry_after() {
                    delay = delay.max(after);
                }

                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Remote call failed, retrying: {}",
                    e
                );
                record_retry(operation);

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(operation = %operation, attempts = attempt + 1, "Giving up: {}", e);
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig::default()
            .with_max_attempts(max_attempts)
            .with_initial_delay(Duration::from_millis(100))
            .with_jitter(Duration::from_millis(200))
    }

    #[test]
    fn test_delay_doubles() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
        // Saturates instead of overflowing.
        assert!(config.delay_for_attempt(40) >= Duration::from_secs(1 << 30));
    }

    #[test]
    fn test_jitter_bounds() {
        let config = fast_config(3);
        for attempt in 0..4 {
            let base = config.delay_for_attempt(attempt);
            for _ in 0..50 {
                let d = config.jittered_delay(attempt);
                assert!(d >= base && d <= base + Duration::from_millis(200));
            }
        }
        let no_jitter = config.with_jitter(Duration::ZERO);
        assert_eq!(no_jitter.jittered_delay(2), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_n_failures_then_success() {
        let failures = 3;
        let config = fast_config(failures + 1);
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        let result: Result<&str, GenAiError> = retry_with_backoff(&config, "submit_video", || {
            let mut stamps = stamps.lock().unwrap();
            stamps.push(start.elapsed());
            let n = stamps.len() as u32;
            async move {
                if n <= failures {
                    Err(GenAiError::ServerError { status: 503, message: "busy".into() })
                } else {
                    Ok("operations/1")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "operations/1");
        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len() as u32, failures + 1);
        for (i, pair) in stamps.windows(2).enumerate() {
            assert!(pair[1] >= pair[0]);
            assert!(pair[1] - pair[0] >= config.delay_for_attempt(i as u32));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_error_is_propagated() {
        let calls = Arc::new(Mutex::new(0u32));
        let result: Result<(), GenAiError> = retry_with_backoff(&fast_config(3), "generate_image", || {
            let mut calls = calls.lock().unwrap();
            *calls += 1;
            let n = *calls;
            async move {
                Err(GenAiError::ServerError {
                    status: 500,
                    message: format!("attempt {n}"),
                })
            }
        })
        .await;

        assert_eq!(*calls.lock().unwrap(), 3);
        match result.unwrap_err() {
            GenAiError::ServerError { message, .. } => assert_eq!(message, "attempt 3"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = Arc::new(Mutex::new(0u32));
        let result: Result<(), GenAiError> = retry_with_backoff(&fast_config(5), "submit_video", || {
            *calls.lock().unwrap() += 1;
            async { Err(GenAiError::from_http_status(400, "invalid image")) }
        })
        .await;

        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(matches!(result, Err(GenAiError::ClientError { status: 400, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_is_honoured() {
        let config = fast_config(2).with_jitter(Duration::ZERO);
        let calls = Arc::new(Mutex::new(0u32));
        let start = Instant::now();

        let _: Result<(), GenAiError> = retry_with_backoff(&config, "generate_music", || {
            *calls.lock().unwrap() += 1;
            async {
                Err(GenAiError::RateLimited {
                    message: "quota".into(),
                    retry_after: Some(Duration::from_secs(5)),
                })
            }
        })
        .await;

        assert_eq!(*calls.lock().unwrap(), 2);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
