//! Security utilities for input validation and sanitization.
//!
//! This module provides:
//! - Source URL validation (SSRF protection, optional domain whitelist)
//! - Job ID validation for path parameters
//! - Upload filename and extension sanitization

use std::path::Path;

use autoedit_media::is_restricted_url;
use tracing::warn;
use url::Url;

/// Maximum URL length to prevent DoS attacks.
pub const MAX_URL_LENGTH: usize = 2048;

/// Extension used when an upload has none we can trust.
pub const DEFAULT_EXTENSION: &str = ".mp4";

/// Longest extension kept from an uploaded filename (without the dot).
const MAX_EXTENSION_LENGTH: usize = 10;

/// Result of URL validation.
#[derive(Debug)]
pub enum UrlValidationResult {
    /// URL is valid and allowed.
    Valid(String),
    /// URL is malformed or uses an unsupported protocol.
    Invalid(String),
    /// URL domain is not in the whitelist.
    DomainNotAllowed(String),
    /// URL matches a blocked pattern (e.g., internal IPs).
    Blocked(String),
    /// URL exceeds maximum length.
    TooLong,
}

impl UrlValidationResult {
    /// Convert to Result for easy error handling.
    pub fn into_result(self) -> Result<String, String> {
        match self {
            Self::Valid(url) => Ok(url),
            Self::Invalid(msg) => Err(msg),
            Self::DomainNotAllowed(domain) => Err(format!("Domain '{}' is not allowed", domain)),
            Self::Blocked(reason) => Err(reason),
            Self::TooLong => Err(format!(
                "URL exceeds maximum length of {} characters",
                MAX_URL_LENGTH
            )),
        }
    }
}

/// Validate a source video URL.
///
/// An empty `allowed_domains` accepts any public host.
pub fn validate_source_url(url: &str, allowed_domains: &[String]) -> UrlValidationResult {
    if url.len() > MAX_URL_LENGTH {
        return UrlValidationResult::TooLong;
    }

    let url = url.trim();
    if url.is_empty() {
        return UrlValidationResult::Invalid("URL cannot be empty".to_string());
    }

    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(e) => return UrlValidationResult::Invalid(format!("Invalid URL format: {}", e)),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return UrlValidationResult::Invalid(format!(
                "Invalid protocol '{}'. Only HTTP and HTTPS are allowed.",
                scheme
            ))
        }
    }

    // Checked on the parsed host so alternate spellings normalize first
    if is_restricted_url(&parsed) {
        warn!(url = %url, host = ?parsed.host_str(), "Blocked restricted host");
        return UrlValidationResult::Blocked(
            "URL appears to target an internal or restricted endpoint".to_string(),
        );
    }

    let domain = match parsed.host_str() {
        Some(d) => d.to_lowercase(),
        None => return UrlValidationResult::Invalid("URL must have a valid domain".to_string()),
    };

    if !allowed_domains.is_empty() && !is_domain_allowed(&domain, allowed_domains) {
        return UrlValidationResult::DomainNotAllowed(domain);
    }

    UrlValidationResult::Valid(url.to_string())
}

/// Exact match or subdomain of a whitelisted domain.
fn is_domain_allowed(domain: &str, allowed: &[String]) -> bool {
    allowed
        .iter()
        .any(|a| domain == a || domain.ends_with(&format!(".{}", a)))
}

/// Validate job ID format.
///
/// Valid format: alphanumeric characters and hyphens only, 8-64 chars.
pub fn is_valid_job_id(id: &str) -> bool {
    if id.len() < 8 || id.len() > 64 {
        return false;
    }
    id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Extension (with dot) to keep for an uploaded file.
///
/// Falls back to `.mp4` when the name has no extension or an unsafe one.
pub fn upload_extension(filename: &str) -> String {
    Path::new(base_name(filename))
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| {
            !e.is_empty()
                && e.len() <= MAX_EXTENSION_LENGTH
                && e.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|e| format!(".{}", e))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Client-supplied filename without any directory components.
pub fn base_name(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
}
