//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    cleanup_job, download_output, get_status, health, process_upload, process_url, ready, root,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    IpRateLimiter,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = IpRateLimiter::new(state.config.rate_limit_rps)
        .trust_proxy_headers(state.config.trust_proxy_headers);

    // Submissions spawn editor runs, so they are the rate-limited surface
    let processing_routes = Router::new()
        .route("/process", post(process_upload))
        .route("/process-url", post(process_url))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let job_routes = Router::new()
        .route("/status/:job_id", get(get_status))
        .route("/download/:job_id", get(download_output))
        .route("/cleanup/:job_id", delete(cleanup_job));

    let health_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    let max_body_size = state.config.max_body_size;

    Router::new()
        .merge(processing_routes)
        .merge(job_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Multipart uploads are capped by the limit layer, not axum's 2 MB default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        // Outside request_logging so the id is available when it logs
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
