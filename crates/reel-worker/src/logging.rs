//! Structured composition job logging.

use std::time::Instant;

use tracing::{error, info, warn, Span};

use reel_models::CompositionJobId;

/// Lifecycle logger keyed by composition job and operation.
///
/// Every line carries `job_id` and `operation`; completion lines also
/// carry the wall-clock time since the logger was created.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
    started: Instant,
}

impl JobLogger {
    pub fn new(job_id: &CompositionJobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
            started: Instant::now(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Composition started: {}", message
        );
    }

    /// One pipeline stage finished.
    pub fn log_stage(&self, stage: &str, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            stage,
            elapsed_secs = self.elapsed_secs(),
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Composition warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            elapsed_secs = self.elapsed_secs(),
            "Composition failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            elapsed_secs = self.elapsed_secs(),
            "Composition published: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Span carrying the job id, for instrumenting a whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "composition",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
