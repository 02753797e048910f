//! Firestore metrics collection.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total Firestore requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "gist_firestore_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "gist_firestore_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "gist_firestore_latency_seconds";

    /// Status writes skipped because the document already matched.
    pub const SKIPPED_WRITES_TOTAL: &str = "gist_firestore_skipped_writes_total";
}

/// Record metrics for a completed Firestore request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

/// Record an idempotent status write that was not sent.
pub fn record_skipped_write(status: &str) {
    counter!(names::SKIPPED_WRITES_TOTAL, "status" => status.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.contains("requests"));
        assert!(names::RETRIES_TOTAL.contains("retries"));
        assert!(names::LATENCY_SECONDS.ends_with("_seconds"));
    }
}
