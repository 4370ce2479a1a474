//! API error types.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use autoedit_media::MediaError;
use autoedit_models::OptionsError;
use autoedit_storage::StorageError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("{0}")]
    Internal(String),

    /// Request could not be extracted (bad query, JSON or multipart framing).
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },

    #[error("Invalid option: {0}")]
    Options(#[from] OptionsError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Options(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Media(MediaError::DownloadTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Media(MediaError::DownloadFailed { .. } | MediaError::InvalidUrl(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal(_) | ApiError::Media(_) | ApiError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

/// Hide internal error details when `ENVIRONMENT=production`.
fn hide_internal_details() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|env| env.eq_ignore_ascii_case("production"))
        .unwrap_or(false)
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let detail = if self.is_internal() && hide_internal_details() {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        if self.is_internal() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse { detail };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::not_found("Job not found").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(OptionsError::InvalidThreshold).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(MediaError::DownloadTooLarge { max_bytes: 1 }).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::from(MediaError::download_failed("404")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(MediaError::Timeout(5)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rejection_keeps_status() {
        let error = ApiError::Rejected {
            status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            detail: "Expected request with `Content-Type: application/json`".to_string(),
        };
        assert_eq!(error.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(!error.is_internal());
    }

    #[test]
    fn test_detail_is_plain_message() {
        assert_eq!(ApiError::not_found("Job not found").to_string(), "Job not found");
    }
}
