//! Application state.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use autoedit_media::fs_utils::ensure_dir;
use autoedit_media::{AutoEditorRunner, HttpDownloader, SourceDownloader, VideoEditor};
use autoedit_storage::{ObjectStore, S3Client, StorageError};

use crate::config::ApiConfig;
use crate::store::JobStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub jobs: JobStore,
    pub editor: Arc<dyn VideoEditor>,
    pub downloader: Arc<dyn SourceDownloader>,
    /// Set only when outputs are pushed to object storage
    pub storage: Option<Arc<dyn ObjectStore>>,
    pub job_slots: Arc<Semaphore>,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        ensure_dir(&config.upload_dir).await?;
        ensure_dir(&config.output_dir).await?;

        let mut runner = AutoEditorRunner::new().with_binary(&config.editor_binary);
        runner = match config.processing_timeout {
            Some(timeout) => runner.with_timeout(timeout.as_secs()),
            None => runner.without_timeout(),
        };
        if let Err(e) = runner.check_available() {
            warn!("Editing tool unavailable, jobs will fail until it is installed: {}", e);
        }

        let storage: Option<Arc<dyn ObjectStore>> = match config.upload_to_storage {
            Some(false) => {
                info!("Object storage uploads disabled");
                None
            }
            requested => match S3Client::from_env().await {
                Ok(client) => {
                    info!(bucket = client.bucket(), "Object storage uploads enabled");
                    Some(Arc::new(client) as Arc<dyn ObjectStore>)
                }
                Err(StorageError::ConfigError(msg)) => {
                    if requested == Some(true) {
                        warn!("UPLOAD_TO_STORAGE is set but storage is not configured: {}", msg);
                    } else {
                        info!("Object storage not configured, outputs stay local");
                    }
                    None
                }
                Err(e) => return Err(e.into()),
            },
        };

        Ok(Self::with_components(config, Arc::new(runner), storage))
    }

    /// Assemble state from already-built components.
    pub fn with_components(
        config: ApiConfig,
        editor: Arc<dyn VideoEditor>,
        storage: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        let job_slots = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            config,
            jobs: JobStore::new(),
            editor,
            downloader: Arc::new(HttpDownloader),
            storage,
            job_slots,
        }
    }

    /// Replace the source downloader used by `/process-url`.
    pub fn with_downloader(mut self, downloader: Arc<dyn SourceDownloader>) -> Self {
        self.downloader = downloader;
        self
    }
}
