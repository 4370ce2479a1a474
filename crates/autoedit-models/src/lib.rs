//! Shared data models for the Auto-Editor API.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their lifecycle
//! - Passthrough options for the editing tool
//! - Status responses returned to clients

pub mod job;
pub mod options;
pub mod status;

// Re-export common types
pub use job::{Job, JobId, JobSource, JobStatus, JobTransitionError, RemoteOutput};
pub use options::{EditOptions, OptionsError};
pub use status::ProcessingStatus;
