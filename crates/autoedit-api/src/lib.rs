//! Axum HTTP API around the auto-editor CLI.
//!
//! This crate provides:
//! - Upload and URL job submission with background processing
//! - Job status, download, and cleanup endpoints
//! - Optional hand-off of outputs to S3-compatible storage
//! - Rate limiting, security headers, and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod processor;
pub mod routes;
pub mod security;
pub mod state;
pub mod store;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
pub use store::{JobCounts, JobStore, JobStoreError};
