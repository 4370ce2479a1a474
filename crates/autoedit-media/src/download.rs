//! Source video download over HTTP(S).
//!
//! Streams the response body straight to disk so large videos never sit in
//! memory, enforcing a size cap as bytes arrive. Redirect hops and DNS
//! answers are checked against the same restricted ranges as the submitted
//! URL.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::redirect::Policy;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::remove_file_if_exists;
use crate::network::{is_restricted_url, PublicResolver};

/// Default download size cap (2 GiB).
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Default whole-request timeout (10 minutes).
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 5;

/// Limits applied to a single download.
#[derive(Debug, Clone, Copy)]
pub struct DownloadLimits {
    /// Maximum body size in bytes
    pub max_bytes: u64,
    /// Timeout for the whole transfer
    pub timeout: Duration,
}

impl Default for DownloadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
            timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        }
    }
}

/// Download `url` into `output_path`.
///
/// Returns the number of bytes written. On any failure the partial file is
/// removed.
pub async fn download_to_file(
    url: &str,
    output_path: impl AsRef<Path>,
    limits: DownloadLimits,
) -> MediaResult<u64> {
    let output_path = output_path.as_ref();

    let parsed = Url::parse(url).map_err(|e| MediaError::InvalidUrl(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(MediaError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            parsed.scheme()
        )));
    }

    info!("Downloading video from {} to {}", url, output_path.display());

    match stream_to_file(parsed, output_path, limits).await {
        Ok(bytes) => {
            info!(bytes, "Downloaded {}", output_path.display());
            Ok(bytes)
        }
        Err(e) => {
            warn!("Download of {} failed: {}", url, e);
            remove_file_if_exists(output_path).await;
            Err(e)
        }
    }
}

/// Fetches a source video to a local path.
#[async_trait]
pub trait SourceDownloader: Send + Sync {
    /// Download `url` into `output_path`, returning the bytes written.
    async fn download(&self, url: &str, output_path: &Path, limits: DownloadLimits) -> MediaResult<u64>;
}

/// Downloader backed by [`download_to_file`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpDownloader;

#[async_trait]
impl SourceDownloader for HttpDownloader {
    async fn download(&self, url: &str, output_path: &Path, limits: DownloadLimits) -> MediaResult<u64> {
        download_to_file(url, output_path, limits).await
    }
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        if is_restricted_url(attempt.url()) {
            let target = attempt.url().to_string();
            return attempt.error(format!("redirect to restricted address {}", target));
        }
        attempt.follow()
    })
}

async fn stream_to_file(url: Url, output_path: &Path, limits: DownloadLimits) -> MediaResult<u64> {
    let client = reqwest::Client::builder()
        .timeout(limits.timeout)
        .redirect(redirect_policy())
        .dns_resolver(Arc::new(PublicResolver))
        .user_agent(concat!("autoedit/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| MediaError::download_failed(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| MediaError::download_failed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(MediaError::download_failed(format!(
            "server responded with {}",
            status
        )));
    }

    if let Some(len) = response.content_length() {
        if len > limits.max_bytes {
            return Err(MediaError::DownloadTooLarge {
                max_bytes: limits.max_bytes,
            });
        }
    }

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(output_path).await?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| MediaError::download_failed(e.to_string()))?;
        written += chunk.len() as u64;
        if written > limits.max_bytes {
            return Err(MediaError::DownloadTooLarge {
                max_bytes: limits.max_bytes,
            });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    debug!(written, "Finished streaming {}", output_path.display());
    Ok(written)
}

/// File extension (with leading dot) of the last URL path segment.
///
/// Only short alphanumeric extensions are accepted, so query noise and odd
/// paths fall back to `None`.
pub fn url_file_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 5 {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response on a random local port.
    async fn serve_once(response: impl Into<String>) -> String {
        let response = response.into();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}/video.mp4", addr)
    }

    #[test]
    fn test_url_file_extension() {
        assert_eq!(
            url_file_extension("https://cdn.example.com/a/b/talk.MP4?sig=abc").as_deref(),
            Some(".mp4")
        );
        assert_eq!(
            url_file_extension("https://example.com/clip.webm").as_deref(),
            Some(".webm")
        );
        assert_eq!(url_file_extension("https://example.com/watch?v=123"), None);
        assert_eq!(url_file_extension("https://example.com/.hidden"), None);
        assert_eq!(url_file_extension("https://example.com/file.tar-gz"), None);
        assert_eq!(url_file_extension("not a url"), None);
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let dir = TempDir::new().unwrap();
        let err = download_to_file(
            "file:///etc/passwd",
            dir.path().join("x.mp4"),
            DownloadLimits::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_download_success() {
        let url = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello").await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("in.mp4");

        let bytes = download_to_file(&url, &path, DownloadLimits::default())
            .await
            .unwrap();

        assert_eq!(bytes, 5);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_download_error_status() {
        let url = serve_once("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.mp4");

        let err = download_to_file(&url, &path, DownloadLimits::default())
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::DownloadFailed { .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_download_too_large() {
        let url = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 11\r\nConnection: close\r\n\r\nhello world").await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.mp4");

        let limits = DownloadLimits {
            max_bytes: 4,
            ..Default::default()
        };
        let err = download_to_file(&url, &path, limits).await.unwrap_err();

        assert!(matches!(err, MediaError::DownloadTooLarge { max_bytes: 4 }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_redirect_to_internal_address_refused() {
        for location in [
            "http://169.254.169.254/latest/meta-data/",
            "http://2130706433/video.mp4",
            "http://[::ffff:127.0.0.1]/video.mp4",
        ] {
            let url = serve_once(format!(
                "HTTP/1.1 302 Found\r\nLocation: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                location
            ))
            .await;
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("in.mp4");

            let err = download_to_file(&url, &path, DownloadLimits::default())
                .await
                .unwrap_err();

            assert!(matches!(err, MediaError::DownloadFailed { .. }), "{location}");
            assert!(!path.exists());
        }
    }
}
