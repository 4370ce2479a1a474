//! S3 client implementation.

use std::path::Path;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Custom endpoint URL (R2, MinIO, ...); `None` means AWS
    pub endpoint_url: Option<String>,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region ("auto" for R2)
    pub region: String,
    /// Prefix for output object keys
    pub key_prefix: String,
    /// Use path-style addressing (required by most S3-compatible stores)
    pub force_path_style: bool,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> StorageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| StorageError::config_error(format!("{} not set", name)))
        };

        let endpoint_url = lookup("S3_ENDPOINT_URL").filter(|v| !v.trim().is_empty());
        let default_region = if endpoint_url.is_some() { "auto" } else { "us-east-1" };

        Ok(Self {
            access_key_id: required("S3_ACCESS_KEY_ID")?,
            secret_access_key: required("S3_SECRET_ACCESS_KEY")?,
            bucket_name: required("S3_BUCKET")?,
            region: lookup("S3_REGION").unwrap_or_else(|| default_region.to_string()),
            key_prefix: lookup("S3_KEY_PREFIX")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_else(|| "outputs".to_string()),
            force_path_style: lookup("S3_FORCE_PATH_STYLE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            endpoint_url,
        })
    }
}

/// S3-compatible storage client.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
    key_prefix: String,
}

impl S3Client {
    /// Create a new client from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "autoedit",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style);

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());

        Ok(Self {
            client,
            bucket: config.bucket_name,
            key_prefix: config.key_prefix,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Self::new(config).await
    }

    /// Bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Prefix applied to output keys.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Upload a file.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    /// Generate a presigned URL for GET (temporary, signed URL via S3 API).
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Delete an object.
    pub async fn delete_object(&self, key: &str) -> StorageResult<()> {
        debug!("Deleting {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    /// Check if an object exists.
    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.to_string().contains("NotFound") || e.to_string().contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(e.to_string()))
                }
            }
        }
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("Storage connectivity check failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_config_requires_credentials() {
        let err = S3Config::from_vars(lookup(&[("S3_BUCKET", "videos")])).unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(msg) if msg.contains("S3_ACCESS_KEY_ID")));
    }

    #[test]
    fn test_config_custom_endpoint_defaults() {
        let config = S3Config::from_vars(lookup(&[
            ("S3_ENDPOINT_URL", "https://acct.r2.cloudflarestorage.com"),
            ("S3_ACCESS_KEY_ID", "key"),
            ("S3_SECRET_ACCESS_KEY", "secret"),
            ("S3_BUCKET", "videos"),
            ("S3_KEY_PREFIX", "/edited/"),
        ]))
        .unwrap();

        assert_eq!(config.region, "auto");
        assert_eq!(config.key_prefix, "edited");
        assert!(config.force_path_style);
        assert_eq!(
            config.endpoint_url.as_deref(),
            Some("https://acct.r2.cloudflarestorage.com")
        );
    }

    #[test]
    fn test_config_aws_defaults() {
        let config = S3Config::from_vars(lookup(&[
            ("S3_ACCESS_KEY_ID", "key"),
            ("S3_SECRET_ACCESS_KEY", "secret"),
            ("S3_BUCKET", "videos"),
            ("S3_FORCE_PATH_STYLE", "false"),
        ]))
        .unwrap();

        assert!(config.endpoint_url.is_none());
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.key_prefix, "outputs");
        assert!(!config.force_path_style);
    }

    #[tokio::test]
    async fn test_presign_is_offline() {
        let config = S3Config::from_vars(lookup(&[
            ("S3_ENDPOINT_URL", "http://127.0.0.1:9000"),
            ("S3_ACCESS_KEY_ID", "key"),
            ("S3_SECRET_ACCESS_KEY", "secret"),
            ("S3_BUCKET", "videos"),
        ]))
        .unwrap();
        let client = S3Client::new(config).await.unwrap();

        let url = client
            .presign_get("outputs/job/out.mp4", Duration::from_secs(600))
            .await
            .unwrap();

        assert!(url.starts_with("http://127.0.0.1:9000/videos/outputs/job/out.mp4?"));
        assert!(url.contains("X-Amz-Expires=600"));
    }
}
