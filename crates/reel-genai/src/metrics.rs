//! Generation client metrics.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "genai_retries_total";

    /// Status polls of long-running operations.
    pub const POLLS_TOTAL: &str = "genai_polls_total";

    /// Long-running operations reaching a terminal state, by status.
    pub const OPERATIONS_TOTAL: &str = "genai_operations_total";

    /// Request latency in seconds by operation.
    pub const REQUEST_SECONDS: &str = "genai_request_duration_seconds";
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

/// Record one status poll.
pub fn record_poll() {
    counter!(names::POLLS_TOTAL).increment(1);
}

/// Record a terminal operation outcome ("succeeded", "failed", "cancelled").
pub fn record_operation(status: &'static str) {
    counter!(names::OPERATIONS_TOTAL, "status" => status).increment(1);
}

/// Record request latency.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    histogram!(
        names::REQUEST_SECONDS,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .record(latency_ms / 1000.0);
}
