//! S3-compatible storage client.
//!
//! This crate provides:
//! - File upload of finished outputs
//! - Presigned, time-limited download URLs
//! - Object deletion on cleanup
//! - The `ObjectStore` seam used by the API

pub mod client;
pub mod error;
pub mod keys;
pub mod store;

pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
pub use keys::{content_type_for, output_key};
pub use store::{clamp_expiry, ObjectStore, DEFAULT_PRESIGN_EXPIRY_SECS, MAX_PRESIGN_EXPIRY_SECS};
