//! Index and health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use autoedit_media::fs_utils::is_writable_dir;

use crate::state::AppState;
use crate::store::JobCounts;

/// Service index listing the available endpoints.
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Auto-Editor API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /process": "Upload a video for processing",
            "POST /process-url": "Process a video fetched from a URL",
            "GET /status/{job_id}": "Check processing status",
            "GET /download/{job_id}": "Download processed video",
            "DELETE /cleanup/{job_id}": "Clean up job files",
            "GET /health": "Liveness check",
            "GET /ready": "Readiness check",
        }
    }))
}

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
    pub jobs: JobCounts,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub editor: CheckStatus,
    pub directories: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<CheckStatus>,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
            latency_ms: Some(latency_ms),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness check endpoint (readiness probe).
/// Checks the editing tool, scratch directories, and object storage.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let editor_check = {
        let start = Instant::now();
        match state.editor.check_available() {
            Ok(_) => CheckStatus::ok(start.elapsed().as_millis() as u64),
            Err(e) => CheckStatus::error(e.to_string()),
        }
    };

    let directories_check = {
        let start = Instant::now();
        let mut unwritable = Vec::new();
        for dir in [&state.config.upload_dir, &state.config.output_dir] {
            if !is_writable_dir(dir).await {
                unwritable.push(dir.display().to_string());
            }
        }
        if unwritable.is_empty() {
            CheckStatus::ok(start.elapsed().as_millis() as u64)
        } else {
            CheckStatus::error(format!("not writable: {}", unwritable.join(", ")))
        }
    };

    let storage_check = match &state.storage {
        Some(store) => {
            let start = Instant::now();
            Some(match store.check_connectivity().await {
                Ok(()) => CheckStatus::ok(start.elapsed().as_millis() as u64),
                Err(e) => CheckStatus::error(e.to_string()),
            })
        }
        None => None,
    };

    let all_ok = editor_check.is_ok()
        && directories_check.is_ok()
        && storage_check.as_ref().map_or(true, CheckStatus::is_ok);

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks {
            editor: editor_check,
            directories: directories_check,
            storage: storage_check,
        },
        jobs: state.jobs.counts().await,
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
