//! API middleware.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderName, HeaderValue, Method, Request, Response};
use axum::middleware::Next;
use axum::response::IntoResponse;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics;

/// Client IPs tracked before stale limiter state is pruned.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Per-client-IP rate limiter backed by governor's keyed store.
#[derive(Clone)]
pub struct IpRateLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    trust_proxy_headers: bool,
}

impl IpRateLimiter {
    /// Allow `requests_per_second` per client, with an equal burst.
    pub fn new(requests_per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            trust_proxy_headers: false,
        }
    }

    /// Key clients by forwarding headers instead of the peer address.
    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// Take one request from `ip`'s budget; `false` when exhausted.
    pub fn check(&self, ip: IpAddr) -> bool {
        if self.limiter.len() >= MAX_TRACKED_CLIENTS {
            self.limiter.retain_recent();
            self.limiter.shrink_to_fit();
        }
        self.limiter.check_key(&ip).is_ok()
    }
}

/// Create CORS layer.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any)
            .allow_origin(Any)
            .max_age(Duration::from_secs(600))
    } else {
        // tower-http rejects credentials combined with wildcard headers
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
            .expose_headers([
                header::CONTENT_LENGTH,
                header::CONTENT_TYPE,
                header::CONTENT_DISPOSITION,
            ])
            .allow_credentials(true)
            .allow_origin(origins)
            .max_age(Duration::from_secs(600))
    }
}

const SECURITY_HEADERS: [(&str, &str); 6] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("x-permitted-cross-domain-policies", "none"),
];

/// Security headers middleware.
pub async fn security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    for (name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    response
}

/// Request ID carried in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Request ID middleware.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let request_id = request
        .headers()
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-ID", header_value);
    }

    response
}

/// Request logging middleware.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let duration = start.elapsed();

    // Skip probe noise
    if !matches!(uri.path(), "/health" | "/healthz" | "/ready" | "/metrics") {
        info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}

/// Rate limiting middleware using IP-based rate limiter.
pub async fn rate_limit_middleware(
    State(rate_limiter): State<IpRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if let Some(ip) = extract_client_ip(&request, rate_limiter.trust_proxy_headers) {
        if !rate_limiter.check(ip) {
            warn!(ip = %ip, "Rate limit exceeded");
            metrics::record_rate_limit_hit(request.uri().path());
            return ([(header::RETRY_AFTER, "1")], ApiError::RateLimited).into_response();
        }
    }

    next.run(request).await
}

/// Client IP: the peer address (requires serving with `ConnectInfo`).
///
/// With `trust_proxy_headers`, the first `X-Forwarded-For` hop or
/// `X-Real-IP` wins over the peer address.
fn extract_client_ip(request: &Request<Body>, trust_proxy_headers: bool) -> Option<IpAddr> {
    let header_ip = |name: &str| -> Option<IpAddr> {
        let value = request.headers().get(name)?.to_str().ok()?;
        value.split(',').next()?.trim().parse().ok()
    };
    let peer_ip = || {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    };

    if !trust_proxy_headers {
        return peer_ip();
    }
    header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or_else(peer_ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(header: &str, value: &str) -> Request<Body> {
        Request::builder()
            .uri("/process")
            .header(header, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_ip_from_forwarded_for() {
        let request = request_with("X-Forwarded-For", "203.0.113.7, 10.0.0.1");
        assert_eq!(
            extract_client_ip(&request, true),
            Some("203.0.113.7".parse().unwrap())
        );
    }

    #[test]
    fn test_extract_ip_from_real_ip() {
        let request = request_with("X-Real-IP", "198.51.100.2");
        assert_eq!(
            extract_client_ip(&request, true),
            Some("198.51.100.2".parse().unwrap())
        );
    }

    #[test]
    fn test_extract_ip_missing() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(extract_client_ip(&request, true), None);
    }

    #[test]
    fn test_untrusted_headers_ignored() {
        let mut request = request_with("X-Forwarded-For", "203.0.113.7");
        assert_eq!(extract_client_ip(&request, false), None);

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 40], 50000))));
        assert_eq!(
            extract_client_ip(&request, false),
            Some("192.0.2.40".parse().unwrap())
        );
    }

    #[test]
    fn test_extract_ip_from_connect_info() {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 40], 50000))));
        assert_eq!(
            extract_client_ip(&request, true),
            Some("192.0.2.40".parse().unwrap())
        );
    }

    #[test]
    fn test_rate_limiter_blocks_after_burst() {
        let limiter = IpRateLimiter::new(2);
        let ip: IpAddr = "192.0.2.1".parse().unwrap();

        assert!(limiter.check(ip));
        assert!(limiter.check(ip));
        assert!(!limiter.check(ip));

        // Separate budget per client
        assert!(limiter.check("192.0.2.2".parse().unwrap()));
    }
}
