//! Object-store abstraction.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::S3Client;
use crate::error::StorageResult;

/// Default expiry for presigned download URLs (1 hour).
pub const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 3600;

/// Maximum allowed expiry (7 days), the SigV4 limit.
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 604_800;

/// Clamp a requested expiry into the range S3 accepts.
pub fn clamp_expiry(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(1, MAX_PRESIGN_EXPIRY_SECS))
}

/// Destination for finished outputs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Prefix applied to output keys.
    fn key_prefix(&self) -> &str;

    /// Upload a local file under `key`.
    async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()>;

    /// Mint a time-limited GET URL for `key`.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Delete `key`.
    async fn delete_object(&self, key: &str) -> StorageResult<()>;

    /// Verify the bucket is reachable.
    async fn check_connectivity(&self) -> StorageResult<()>;
}

#[async_trait]
impl ObjectStore for S3Client {
    fn key_prefix(&self) -> &str {
        S3Client::key_prefix(self)
    }

    async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        S3Client::upload_file(self, path, key, content_type).await
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        S3Client::presign_get(self, key, expires_in).await
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        S3Client::delete_object(self, key).await
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        S3Client::check_connectivity(self).await
    }
}
