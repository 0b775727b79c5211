//! Metrics definitions for the meeting service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `meeting_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: the fixed route table, dynamic IDs replaced by `{meetingId}`
//! - `status`: success, error, timeout (plus store outcomes like conflict)
//! - `operation`: create, join, get, issue_token and store query names
//! - `error_type`: `MeetingError::error_type` values

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("meeting_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("meeting_operation".to_string()),
            &[
                0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set operation buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("meeting_store_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set store query buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("meeting_token_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set token request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `meeting_http_requests_total`, `meeting_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
///
/// Called from the outermost middleware, so it sees framework-level
/// responses (404, 405, timeouts) as well as handler responses.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("meeting_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("meeting_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the fixed route table.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/meetings" => "/meetings",
        "/meetings/join" => "/meetings/join",
        "/meetings/token" => "/meetings/token",
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> &'static str {
    // /meetings/{meetingId}: exactly one non-empty segment after the prefix
    if let Some(rest) = path.strip_prefix("/meetings/") {
        if !rest.is_empty() && !rest.contains('/') {
            return "/meetings/{meetingId}";
        }
    }

    "/other"
}

// ============================================================================
// Meeting Operation Metrics
// ============================================================================

/// Record a meeting service operation.
///
/// Metric: `meeting_operations_total`, `meeting_operation_duration_seconds`
/// Labels: `operation`, `status`, `error_type`
pub fn record_meeting_operation(
    operation: &str,
    status: &str,
    error_type: Option<&str>,
    duration: Duration,
) {
    histogram!("meeting_operation_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("meeting_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string(),
        "error_type" => error_type.unwrap_or("none").to_string()
    )
    .increment(1);
}

// ============================================================================
// Store Metrics
// ============================================================================

/// Record a store query.
///
/// Metric: `meeting_store_query_duration_seconds`, `meeting_store_queries_total`
/// Labels: `operation`, `status`
pub fn record_store_query(operation: &str, status: &str, duration: Duration) {
    histogram!("meeting_store_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("meeting_store_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Token Service Metrics
// ============================================================================

/// Record a call to the room-token service.
///
/// Metric: `meeting_token_requests_total`, `meeting_token_request_duration_seconds`
/// Labels: `status`
pub fn record_token_request(status: &str, duration: Duration) {
    histogram!("meeting_token_request_duration_seconds").record(duration.as_secs_f64());

    counter!("meeting_token_requests_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Value of the counter `name` whose labels include every pair in `labels`,
/// as captured by a `DebuggingRecorder`.
#[cfg(test)]
pub(crate) fn recorded_counter(
    snapshotter: &metrics_util::debugging::Snapshotter,
    name: &str,
    labels: &[(&str, &str)],
) -> Option<u64> {
    use metrics_util::debugging::DebugValue;

    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(composite, _, _, value)| {
            let key = composite.key();
            let matches = key.name() == name
                && labels.iter().all(|(k, v)| {
                    key.labels()
                        .any(|label| label.key() == *k && label.value() == *v)
                });
            match (matches, value) {
                (true, DebugValue::Counter(count)) => Some(count),
                _ => None,
            }
        })
}
