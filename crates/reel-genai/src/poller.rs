//! Job poller for long-running generation operations.
//!
//! Polls at a fixed interval until the operation reaches a terminal state.
//! There is no attempt ceiling; callers stop an abandoned loop through the
//! optional cancel signal.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use reel_models::{ClipReference, OperationStatus};

use crate::client::OperationSource;
use crate::error::{GenAiError, GenAiResult};
use crate::metrics::{record_operation, record_poll};

/// Poll cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
        }
    }
}

impl PollerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Waits for long-running operations to finish.
#[derive(Debug, Clone, Default)]
pub struct JobPoller {
    config: PollerConfig,
    cancel: Option<watch::Receiver<bool>>,
}

impl JobPoller {
    pub fn new(config: PollerConfig) -> Self {
        Self { config, cancel: None }
    }

    /// Stop polling once the receiver observes `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Poll `name` until it is done, returning its outputs.
    ///
    /// The first poll happens immediately. Transient status errors are logged
    /// and polled again; anything else propagates.
    pub async fn wait_for<S: OperationSource + ?Sized>(
        &self,
        source: &S,
        name: &str,
    ) -> GenAiResult<Vec<ClipReference>> {
        let mut cancel = self.cancel.clone();
        let mut polls = 0u64;

        loop {
            if cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
                record_operation("cancelled");
                return Err(GenAiError::Cancelled(name.to_string()));
            }

            polls += 1;
            record_poll();

            match source.operation_status(name).await {
                Ok(op) => match op.status() {
                    OperationStatus::Pending => {
                        debug!(operation = %name, polls, "Operation still running");
                    }
                    OperationStatus::Succeeded(outputs) => {
                        info!(operation = %name, polls, outputs = outputs.len(), "Operation completed");
                        record_operation("succeeded");
                        return Ok(outputs);
                    }
                    OperationStatus::Failed(err) => {
                        warn!(operation = %name, code = err.code, "Operation failed: {}", err.message);
                        record_operation("failed");
                        return Err(GenAiError::OperationFailed {
                            operation: name.to_string(),
                            code: err.code,
                            message: err.message,
                        });
                    }
                },
                Err(e) if e.is_retryable() => {
                    warn!(operation = %name, polls, "Status check failed, polling again: {}", e);
                }
                Err(e) => return Err(e),
            }

            match cancel.as_mut() {
                Some(rx) => {
                    if !sleep_unless_cancelled(self.config.interval, rx).await {
                        // A dropped sender can never cancel.
                        cancel = None;
                    }
                }
                None => tokio::time::sleep(self.config.interval).await,
            }
        }
    }

    /// Poll until done and return the first output.
    pub async fn wait_for_clip<S: OperationSource + ?Sized>(
        &self,
        source: &S,
        name: &str,
    ) -> GenAiResult<ClipReference> {
        self.wait_for(source, name)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GenAiError::invalid_response(format!("operation {name} finished without outputs")))
    }
}

/// Sleep for `interval`, waking early only when the flag turns `true`.
///
/// Returns `false` if the sender went away, after sleeping out the interval.
async fn sleep_unless_cancelled(interval: Duration, rx: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            changed = rx.changed() => {
                if changed.is_err() {
                    (&mut sleep).await;
                    return false;
                }
                if *rx.borrow_and_update() {
                    return true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reel_models::LongRunningOperation;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct ScriptedSource {
        replies: Mutex<VecDeque<GenAiResult<LongRunningOperation>>>,
        polls: Mutex<Vec<Instant>>,
    }

    impl ScriptedSource {
        fn new(replies: Vec<GenAiResult<LongRunningOperation>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                polls: Mutex::new(Vec::new()),
            }
        }

        fn poll_count(&self) -> usize {
            self.polls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl OperationSource for ScriptedSource {
        async fn operation_status(&self, name: &str) -> GenAiResult<LongRunningOperation> {
            self.polls.lock().unwrap().push(Instant::now());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(LongRunningOperation::pending(name)))
        }
    }

    fn clip() -> ClipReference {
        ClipReference::parse("gs://videos/op-1/sample_0.mp4").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_twice_then_done() {
        let source = ScriptedSource::new(vec![
            Ok(LongRunningOperation::pending("op-1")),
            Ok(LongRunningOperation::pending("op-1")),
            Ok(LongRunningOperation::succeeded("op-1", vec![clip()])),
        ]);
        let poller = JobPoller::new(PollerConfig::default());

        let start = Instant::now();
        let result = poller.wait_for_clip(&source, "op-1").await.unwrap();

        assert_eq!(result, clip());
        assert_eq!(source.poll_count(), 3);

        // First poll is immediate, then a fixed interval between polls.
        let polls = source.polls.lock().unwrap();
        assert_eq!(polls[0] - start, Duration::ZERO);
        assert_eq!(polls[1] - polls[0], Duration::from_secs(2));
        assert_eq!(polls[2] - polls[1], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_keeps_message() {
        let source = ScriptedSource::new(vec![
            Ok(LongRunningOperation::pending("op-2")),
            Ok(LongRunningOperation::failed("op-2", 3, "Unable to process the seed image.")),
        ]);
        let err = JobPoller::default().wait_for(&source, "op-2").await.unwrap_err();

        match &err {
            GenAiError::OperationFailed { operation, code, message } => {
                assert_eq!(operation, "op-2");
                assert_eq!(*code, 3);
                assert_eq!(message, "Unable to process the seed image.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("Unable to process the seed image."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_status_error_keeps_polling() {
        let source = ScriptedSource::new(vec![
            Err(GenAiError::ServerError { status: 503, message: "unavailable".into() }),
            Ok(LongRunningOperation::succeeded("op-3", vec![clip()])),
        ]);
        let outputs = JobPoller::default().wait_for(&source, "op-3").await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(source.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_status_error_propagates() {
        let source = ScriptedSource::new(vec![Err(GenAiError::from_http_status(404, "no such operation"))]);
        let err = JobPoller::default().wait_for(&source, "op-4").await.unwrap_err();
        assert!(matches!(err, GenAiError::ClientError { status: 404, .. }));
        assert_eq!(source.poll_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_without_outputs() {
        let source = ScriptedSource::new(vec![Ok(LongRunningOperation::succeeded("op-5", vec![]))]);
        let err = JobPoller::default().wait_for_clip(&source, "op-5").await.unwrap_err();
        assert!(matches!(err, GenAiError::InvalidResponse(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_between_polls() {
        let source = ScriptedSource::new(vec![]);
        let (tx, rx) = watch::channel(false);
        let poller = JobPoller::default().with_cancel(rx);

        let cancel = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            tx.send(true).unwrap();
        };
        let (result, _) = tokio::join!(poller.wait_for(&source, "op-6"), cancel);

        assert!(matches!(result, Err(GenAiError::Cancelled(ref op)) if op == "op-6"));
        // Polls at t=0, 2 and 4; cancelled at t=5 before the next one.
        assert_eq!(source.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_false_signal_keeps_cadence() {
        let source = ScriptedSource::new(vec![]);
        let (tx, rx) = watch::channel(false);
        let poller = JobPoller::default().with_cancel(rx);

        let start = Instant::now();
        let signals = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send(false).unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            tx.send(false).unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            tx.send(true).unwrap();
        };
        let (result, _) = tokio::join!(poller.wait_for(&source, "op-7"), signals);

        assert!(matches!(result, Err(GenAiError::Cancelled(_))));
        let offsets: Vec<_> = source.polls.lock().unwrap().iter().map(|t| *t - start).collect();
        assert_eq!(
            offsets,
            vec![Duration::ZERO, Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_keeps_polling() {
        let source = ScriptedSource::new(vec![
            Ok(LongRunningOperation::pending("op-8")),
            Ok(LongRunningOperation::pending("op-8")),
            Ok(LongRunningOperation::succeeded("op-8", vec![clip()])),
        ]);
        let (tx, rx) = watch::channel(false);
        let poller = JobPoller::default().with_cancel(rx);
        drop(tx);

        let start = Instant::now();
        let result = poller.wait_for_clip(&source, "op-8").await.unwrap();

        assert_eq!(result, clip());
        assert_eq!(Instant::now() - start, Duration::from_secs(4));
    }
}
