//! Job submission handlers.

use std::path::{Path, PathBuf};
use std::time::Instant;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

use autoedit_media::fs_utils::remove_file_if_exists;
use autoedit_media::{url_file_extension, DownloadLimits};
use autoedit_models::{EditOptions, Job, JobId, JobSource, ProcessingStatus};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::processor::{spawn_processing, ProcessingTask};
use crate::security::{base_name, upload_extension, validate_source_url, DEFAULT_EXTENSION};
use crate::state::AppState;

/// Request body for `/process-url`.
#[derive(Debug, Deserialize)]
pub struct ProcessUrlRequest {
    pub url: String,
    #[serde(flatten)]
    pub options: EditOptions,
}

/// A source file written to the upload directory.
struct SavedUpload {
    filename: String,
    path: PathBuf,
    extension: String,
}

/// Accept a multipart upload and start processing it.
///
/// The video goes in the `file` field. Editing options come from the query
/// string and may be overridden by `margin`, `edit_mode` and `threshold`
/// form fields.
pub async fn process_upload(
    State(state): State<AppState>,
    query: Result<Query<EditOptions>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ProcessingStatus>> {
    let Query(options) = query?;
    let mut multipart = multipart?;
    let job_id = JobId::new();
    let mut saved = None;

    let options = match read_upload_form(&state, &job_id, options, &mut multipart, &mut saved).await {
        Ok(options) => options,
        Err(e) => {
            if let Some(upload) = &saved {
                remove_file_if_exists(&upload.path).await;
            }
            return Err(e);
        }
    };

    let upload = saved.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    info!(job_id = %job_id, filename = %upload.filename, "Upload received");

    let source = JobSource::Upload {
        filename: upload.filename,
    };
    let status = accept_job(&state, job_id, source, upload.path, &upload.extension, options).await;
    Ok(Json(status))
}

/// Download a video from a URL and start processing it.
pub async fn process_url(
    State(state): State<AppState>,
    request: Result<Json<ProcessUrlRequest>, JsonRejection>,
) -> ApiResult<Json<ProcessingStatus>> {
    let Json(request) = request?;
    let url = validate_source_url(&request.url, &state.config.allowed_url_domains)
        .into_result()
        .map_err(ApiError::BadRequest)?;

    let options = request.options.normalized();
    options.validate()?;

    let job_id = JobId::new();
    let extension = url_file_extension(&url).unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    let source_path = input_path(&state, &job_id, &extension);

    let limits = DownloadLimits {
        max_bytes: state.config.max_body_size as u64,
        timeout: state.config.download_timeout,
    };

    let start = Instant::now();
    state.downloader.download(&url, &source_path, limits).await?;
    metrics::record_download_duration(start.elapsed().as_secs_f64());
    info!(job_id = %job_id, url = %url, "Source downloaded");

    let source = JobSource::Url { url };
    let status = accept_job(&state, job_id, source, source_path, &extension, options).await;
    Ok(Json(status))
}

async fn read_upload_form(
    state: &AppState,
    job_id: &JobId,
    mut options: EditOptions,
    multipart: &mut Multipart,
    saved: &mut Option<SavedUpload>,
) -> ApiResult<EditOptions> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" if saved.is_none() => {
                let filename = field
                    .file_name()
                    .map(base_name)
                    .map(str::to_string)
                    .filter(|n| !n.trim().is_empty())
                    .ok_or_else(|| ApiError::bad_request("No filename provided"))?;

                let extension = upload_extension(&filename);
                let path = input_path(state, job_id, &extension);
                // Track before writing so a failed write is cleaned up
                *saved = Some(SavedUpload {
                    filename,
                    path: path.clone(),
                    extension,
                });
                save_field(field, &path).await?;
            }
            "margin" => options.margin = Some(field.text().await.map_err(multipart_error)?),
            "edit_mode" => options.edit_mode = Some(field.text().await.map_err(multipart_error)?),
            "threshold" => {
                let raw = field.text().await.map_err(multipart_error)?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    let threshold = raw
                        .parse::<f64>()
                        .map_err(|_| ApiError::bad_request(format!("Invalid threshold: {}", raw)))?;
                    options.threshold = Some(threshold);
                }
            }
            _ => {}
        }
    }

    let options = options.normalized();
    options.validate()?;
    Ok(options)
}

async fn save_field(mut field: Field<'_>, path: &Path) -> ApiResult<u64> {
    let saving_error = |e: std::io::Error| ApiError::internal(format!("Error saving file: {}", e));

    let mut file = File::create(path).await.map_err(saving_error)?;
    let mut written = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk).await.map_err(saving_error)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(saving_error)?;

    Ok(written)
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text()))
    }
}

fn input_path(state: &AppState, job_id: &JobId, extension: &str) -> PathBuf {
    state
        .config
        .upload_dir
        .join(format!("{}_input{}", job_id, extension))
}

fn output_path(state: &AppState, job_id: &JobId, extension: &str) -> PathBuf {
    state
        .config
        .output_dir
        .join(format!("{}_output{}", job_id, extension))
}

/// Register the job and hand it to the background processor.
async fn accept_job(
    state: &AppState,
    job_id: JobId,
    source: JobSource,
    input_path: PathBuf,
    extension: &str,
    options: EditOptions,
) -> ProcessingStatus {
    let source_label = match &source {
        JobSource::Upload { .. } => "upload",
        JobSource::Url { .. } => "url",
    };

    state
        .jobs
        .insert(Job::new(job_id.clone(), source, options.clone()))
        .await;
    metrics::record_job_started(source_label);

    let task = ProcessingTask {
        job_id: job_id.clone(),
        input_path,
        output_path: output_path(state, &job_id, extension),
        options,
    };
    spawn_processing(state.clone(), task);

    ProcessingStatus::started(job_id)
}
