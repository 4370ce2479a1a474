//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex::Regex;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "autoedit_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "autoedit_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "autoedit_http_requests_in_flight";

    // Job metrics
    pub const JOBS_STARTED_TOTAL: &str = "autoedit_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "autoedit_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "autoedit_jobs_failed_total";
    pub const JOBS_IN_FLIGHT: &str = "autoedit_jobs_in_flight";

    // Processing metrics
    pub const EDITOR_DURATION_SECONDS: &str = "autoedit_editor_duration_seconds";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "autoedit_download_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "autoedit_upload_duration_seconds";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "autoedit_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record job accepted, labelled by source ("upload" or "url").
pub fn record_job_started(source: &str) {
    let labels = [("source", source.to_string())];
    counter!(names::JOBS_STARTED_TOTAL, &labels).increment(1);
}

/// Record job completed.
pub fn record_job_completed(storage: &str) {
    let labels = [("storage", storage.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

/// Record job failed.
pub fn record_job_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Adjust the running-jobs gauge.
pub fn add_jobs_in_flight(delta: f64) {
    gauge!(names::JOBS_IN_FLIGHT).increment(delta);
}

/// Record editing tool duration.
pub fn record_editor_duration(editor: &str, duration_secs: f64) {
    let labels = [("editor", editor.to_string())];
    histogram!(names::EDITOR_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record source download duration.
pub fn record_download_duration(duration_secs: f64) {
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration_secs);
}

/// Record storage upload duration.
pub fn record_upload_duration(duration_secs: f64) {
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static JOB_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(status|download|cleanup)/[^/]+").unwrap());

/// Sanitize path for metrics labels (collapse job IDs).
fn sanitize_path(path: &str) -> String {
    JOB_PATH.replace(path, "/$1/:job_id").to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/status/550e8400-e29b-41d4-a716-446655440000"),
            "/status/:job_id"
        );
        assert_eq!(sanitize_path("/download/abcdef12"), "/download/:job_id");
        assert_eq!(sanitize_path("/cleanup/abcdef12"), "/cleanup/:job_id");
        assert_eq!(sanitize_path("/process"), "/process");
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
