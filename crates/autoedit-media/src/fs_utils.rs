//! Filesystem helpers for scratch files.

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;

use crate::error::MediaResult;

/// Create a directory (and parents) if it does not exist yet.
pub async fn ensure_dir(path: impl AsRef<Path>) -> MediaResult<()> {
    fs::create_dir_all(path.as_ref()).await?;
    Ok(())
}

/// Remove a file, treating "already gone" as success.
///
/// Returns `true` when a file was actually deleted. Other failures are
/// logged and reported as `false`.
pub async fn remove_file_if_exists(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Error cleaning up {}: {}", path.display(), e);
            false
        }
    }
}

/// Check that a directory exists and accepts new files.
pub async fn is_writable_dir(path: impl AsRef<Path>) -> bool {
    let probe = path.as_ref().join(format!(".write-check-{}", std::process::id()));
    match fs::write(&probe, b"").await {
        Ok(()) => {
            let _ = fs::remove_file(&probe).await;
            true
        }
        Err(_) => false,
    }
}
