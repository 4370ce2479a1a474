//! Job status, download, and cleanup handlers.

use std::io::ErrorKind;
use std::path::PathBuf;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::{json, Value};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use autoedit_media::fs_utils::remove_file_if_exists;
use autoedit_models::{JobId, JobStatus, ProcessingStatus};
use autoedit_storage::{clamp_expiry, content_type_for};

use crate::error::{ApiError, ApiResult};
use crate::security::is_valid_job_id;
use crate::state::AppState;

/// Read size when streaming a local output.
const CHUNK_SIZE: usize = 64 * 1024;

fn parse_job_id(raw: String) -> ApiResult<JobId> {
    if !is_valid_job_id(&raw) {
        return Err(ApiError::bad_request("Invalid job ID format"));
    }
    Ok(JobId::from(raw))
}

/// Current status of a job.
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<ProcessingStatus>> {
    let job_id = parse_job_id(job_id)?;
    let job = state
        .jobs
        .get(&job_id)
        .await
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(Json(ProcessingStatus::from(&job)))
}

/// Deliver a finished output.
///
/// Remote outputs redirect to a freshly presigned URL. Local outputs are
/// streamed back and removed from disk; the job record stays.
pub async fn download_output(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job_id = parse_job_id(job_id)?;
    let job = state
        .jobs
        .get(&job_id)
        .await
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    if job.status != JobStatus::Completed {
        return Err(ApiError::bad_request(format!("Job status: {}", job.status)));
    }

    if let Some(key) = &job.remote_key {
        let store = state
            .storage
            .as_ref()
            .ok_or_else(|| ApiError::internal("Object storage is not configured"))?;
        let url = store
            .presign_get(key, clamp_expiry(state.config.presign_expiry.as_secs()))
            .await?;
        info!(job_id = %job_id, "Redirecting download to object storage");
        return Ok(Redirect::temporary(&url).into_response());
    }

    let path = job
        .local_output()
        .map(|p| p.to_path_buf())
        .ok_or_else(|| ApiError::not_found("Output file not found"))?;

    stream_local_output(&job_id, path).await
}

async fn stream_local_output(job_id: &JobId, path: PathBuf) -> ApiResult<Response> {
    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ApiError::not_found("Output file not found"))
        }
        Err(e) => return Err(ApiError::internal(format!("Error reading output: {}", e))),
    };
    let len = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(format!("Error reading output: {}", e)))?
        .len();

    // The open handle keeps the contents readable after unlinking
    remove_file_if_exists(&path).await;
    info!(job_id = %job_id, bytes = len, "Serving local output");

    let stream = futures_util::stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        buf.truncate(n);
        Ok(Some((buf, file)))
    });

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("{}.mp4", job_id));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&path))
        .header(header::CONTENT_LENGTH, len)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"edited_{}\"", name),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Forget a job and delete whatever output it still has.
pub async fn cleanup_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let job_id = parse_job_id(job_id)?;
    let job = state
        .jobs
        .remove(&job_id)
        .await
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    if let Some(path) = job.local_output() {
        remove_file_if_exists(path).await;
    }

    if let (Some(key), Some(store)) = (&job.remote_key, &state.storage) {
        if let Err(e) = store.delete_object(key).await {
            warn!(job_id = %job_id, key = %key, "Failed to delete remote output: {}", e);
        }
    }

    info!(job_id = %job_id, "Job cleaned up");
    Ok(Json(json!({ "message": "Job cleaned up successfully" })))
}
