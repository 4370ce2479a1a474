//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

use autoedit_media::{DEFAULT_BINARY, DEFAULT_TIMEOUT_SECS};
use autoedit_storage::DEFAULT_PRESIGN_EXPIRY_SECS;

/// Default maximum upload/download size (2 GiB).
const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024 * 1024;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit for processing routes, requests per second per IP
    pub rate_limit_rps: u32,
    /// Max request body size (also caps URL downloads)
    pub max_body_size: usize,
    /// Where uploaded and downloaded inputs are written
    pub upload_dir: PathBuf,
    /// Where the editing tool writes outputs
    pub output_dir: PathBuf,
    /// Editing tool binary name or path
    pub editor_binary: String,
    /// Per-job editing timeout; `None` disables it
    pub processing_timeout: Option<Duration>,
    /// Maximum editing processes running at once
    pub max_concurrent_jobs: usize,
    /// Timeout for fetching a source URL
    pub download_timeout: Duration,
    /// Restrict `/process-url` to these domains (empty = any public host)
    pub allowed_url_domains: Vec<String>,
    /// Push outputs to object storage; `None` = whenever storage is configured
    pub upload_to_storage: Option<bool>,
    /// Lifetime of presigned download URLs
    pub presign_expiry: Duration,
    /// Take client IPs from `X-Forwarded-For`/`X-Real-IP` (only behind a proxy)
    pub trust_proxy_headers: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            upload_dir: PathBuf::from("/tmp/uploads"),
            output_dir: PathBuf::from("/tmp/outputs"),
            editor_binary: DEFAULT_BINARY.to_string(),
            processing_timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_concurrent_jobs: 2,
            download_timeout: Duration::from_secs(600),
            allowed_url_domains: Vec::new(),
            upload_to_storage: None,
            presign_expiry: Duration::from_secs(DEFAULT_PRESIGN_EXPIRY_SECS),
            trust_proxy_headers: false,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            editor_binary: std::env::var("AUTO_EDITOR_BIN").unwrap_or(defaults.editor_binary),
            // 0 disables the timeout
            processing_timeout: match std::env::var("PROCESSING_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
            {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.processing_timeout,
            },
            max_concurrent_jobs: std::env::var("MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            download_timeout: std::env::var("DOWNLOAD_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_timeout),
            allowed_url_domains: std::env::var("ALLOWED_URL_DOMAINS")
                .map(|s| {
                    s.split(',')
                        .map(|d| d.trim().to_lowercase())
                        .filter(|d| !d.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            upload_to_storage: std::env::var("UPLOAD_TO_STORAGE")
                .ok()
                .map(|v| v == "true" || v == "1"),
            presign_expiry: Duration::from_secs(
                std::env::var("PRESIGN_EXPIRY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_PRESIGN_EXPIRY_SECS),
            ),
            trust_proxy_headers: std::env::var("TRUST_PROXY_HEADERS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.trust_proxy_headers),
        }
    }
}
