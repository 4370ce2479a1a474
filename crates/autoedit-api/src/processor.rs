//! Background processing of accepted jobs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::Instrument;

use autoedit_media::fs_utils::remove_file_if_exists;
use autoedit_media::MediaError;
use autoedit_models::{EditOptions, JobId, RemoteOutput};
use autoedit_storage::{clamp_expiry, content_type_for, output_key, ObjectStore, StorageResult};

use crate::logging::JobLogger;
use crate::metrics;
use crate::state::AppState;
use crate::store::JobStoreError;

/// Message recorded for a successful job.
pub const SUCCESS_MESSAGE: &str = "Video processed successfully";

/// Everything the background task needs to run one job.
#[derive(Debug, Clone)]
pub struct ProcessingTask {
    pub job_id: JobId,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub options: EditOptions,
}

/// Run a job in the background.
pub fn spawn_processing(state: AppState, task: ProcessingTask) -> JoinHandle<()> {
    let logger = JobLogger::new(&task.job_id, "process_video");
    let span = logger.span();
    tokio::spawn(process_video(state, task, logger).instrument(span))
}

/// Run the editor for one job and record the outcome.
///
/// The input file is always removed. Partial outputs are removed on failure.
pub async fn process_video(state: AppState, task: ProcessingTask, logger: JobLogger) {
    let _permit = match Arc::clone(&state.job_slots).acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            remove_file_if_exists(&task.input_path).await;
            record_failure(&state, &task.job_id, &logger, format!("Processing error: {}", e), "internal").await;
            return;
        }
    };

    logger.start(&format!(
        "{} -> {}",
        task.input_path.display(),
        task.output_path.display()
    ));
    metrics::add_jobs_in_flight(1.0);

    let start = Instant::now();
    let result = state
        .editor
        .edit(&task.input_path, &task.output_path, &task.options)
        .await;
    let elapsed = start.elapsed().as_secs_f64();
    metrics::record_editor_duration(state.editor.name(), elapsed);

    remove_file_if_exists(&task.input_path).await;

    match result {
        Ok(()) => finish_success(&state, &task, &logger, elapsed).await,
        Err(e) => {
            remove_file_if_exists(&task.output_path).await;
            let reason = failure_reason(&e);
            record_failure(&state, &task.job_id, &logger, failure_message(&e), reason).await;
        }
    }

    metrics::add_jobs_in_flight(-1.0);
}

async fn finish_success(state: &AppState, task: &ProcessingTask, logger: &JobLogger, elapsed: f64) {
    // Cleaned up while the editor was running
    if state.jobs.get(&task.job_id).await.is_none() {
        logger.warning("job removed during processing, discarding output");
        remove_file_if_exists(&task.output_path).await;
        return;
    }

    let (message, output_path, remote, storage_label) = match &state.storage {
        Some(store) => {
            logger.progress("uploading output to object storage");
            match upload_output(state, store.as_ref(), task).await {
                Ok(remote) => {
                    remove_file_if_exists(&task.output_path).await;
                    (SUCCESS_MESSAGE.to_string(), None, Some(remote), "remote")
                }
                Err(e) => {
                    logger.warning(&format!("upload failed, keeping local output: {}", e));
                    (
                        format!("{} (upload to storage failed: {})", SUCCESS_MESSAGE, e),
                        Some(task.output_path.clone()),
                        None,
                        "local",
                    )
                }
            }
        }
        None => (
            SUCCESS_MESSAGE.to_string(),
            Some(task.output_path.clone()),
            None,
            "local",
        ),
    };

    let remote_key = remote.as_ref().map(|r| r.key.clone());

    match state
        .jobs
        .complete(&task.job_id, message, output_path, remote)
        .await
    {
        Ok(_) => {
            metrics::record_job_completed(storage_label);
            logger.completed(SUCCESS_MESSAGE, elapsed);
        }
        Err(JobStoreError::NotFound(_)) => {
            logger.warning("job removed before completion, discarding output");
            remove_file_if_exists(&task.output_path).await;
            if let (Some(store), Some(key)) = (&state.storage, remote_key) {
                if let Err(e) = store.delete_object(&key).await {
                    logger.warning(&format!("failed to delete orphaned object {}: {}", key, e));
                }
            }
        }
        Err(e) => logger.failed(&e.to_string()),
    }
}

async fn upload_output(
    state: &AppState,
    store: &dyn ObjectStore,
    task: &ProcessingTask,
) -> StorageResult<RemoteOutput> {
    let filename = file_name(&task.output_path);
    let key = output_key(store.key_prefix(), task.job_id.as_str(), &filename);

    let start = Instant::now();
    store
        .upload_file(&task.output_path, &key, content_type_for(&task.output_path))
        .await?;
    metrics::record_upload_duration(start.elapsed().as_secs_f64());

    let url = store
        .presign_get(&key, clamp_expiry(state.config.presign_expiry.as_secs()))
        .await?;

    Ok(RemoteOutput { key, url })
}

async fn record_failure(
    state: &AppState,
    job_id: &JobId,
    logger: &JobLogger,
    message: String,
    reason: &str,
) {
    logger.failed(&message);
    metrics::record_job_failed(reason);
    if let Err(e) = state.jobs.fail(job_id, message).await {
        logger.warning(&format!("could not record failure: {}", e));
    }
}

/// Client-facing failure message for an editor error.
pub fn failure_message(error: &MediaError) -> String {
    match error {
        MediaError::ToolFailed { message, stderr, .. } => {
            let detail = stderr
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(message.as_str());
            format!("Auto-editor error: {}", detail)
        }
        MediaError::Timeout(secs) => format!("Processing timeout (>{})", human_duration(*secs)),
        other => format!("Processing error: {}", other),
    }
}

fn failure_reason(error: &MediaError) -> &'static str {
    match error {
        MediaError::ToolFailed { .. } => "tool_failed",
        MediaError::Timeout(_) => "timeout",
        MediaError::ToolNotFound(_) => "tool_not_found",
        _ => "internal",
    }
}

/// Render a whole number of seconds the way people say it.
fn human_duration(secs: u64) -> String {
    let plural = |n: u64, unit: &str| {
        if n == 1 {
            format!("1 {}", unit)
        } else {
            format!("{} {}s", n, unit)
        }
    };

    if secs >= 3600 && secs % 3600 == 0 {
        plural(secs / 3600, "hour")
    } else if secs >= 60 && secs % 60 == 0 {
        plural(secs / 60, "minute")
    } else {
        plural(secs, "second")
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_prefers_stderr() {
        let err = MediaError::tool_failed(
            "exit status 1",
            Some("Error! Invalid edit method\n".to_string()),
            Some(1),
        );
        assert_eq!(
            failure_message(&err),
            "Auto-editor error: Error! Invalid edit method"
        );

        let err = MediaError::tool_failed("no output", Some("  ".to_string()), Some(0));
        assert_eq!(failure_message(&err), "Auto-editor error: no output");
    }

    #[test]
    fn test_failure_message_timeout() {
        assert_eq!(
            failure_message(&MediaError::Timeout(3600)),
            "Processing timeout (>1 hour)"
        );
        assert_eq!(
            failure_message(&MediaError::Timeout(7200)),
            "Processing timeout (>2 hours)"
        );
        assert_eq!(
            failure_message(&MediaError::Timeout(90)),
            "Processing timeout (>90 seconds)"
        );
    }

    #[test]
    fn test_failure_message_other() {
        let msg = failure_message(&MediaError::ToolNotFound("auto-editor".into()));
        assert_eq!(msg, "Processing error: auto-editor not found in PATH");
    }

    #[test]
    fn test_human_duration() {
        assert_eq!(human_duration(1), "1 second");
        assert_eq!(human_duration(120), "2 minutes");
        assert_eq!(human_duration(3600), "1 hour");
    }
}
