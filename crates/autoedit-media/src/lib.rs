//! auto-editor CLI wrapper.
//!
//! This crate provides:
//! - Type-safe auto-editor command building
//! - A subprocess runner with timeout and stderr capture
//! - The `VideoEditor` seam used by the API
//! - Streaming download of source videos from URLs
//! - Restricted-address checks for outbound requests

pub mod command;
pub mod download;
pub mod editor;
pub mod error;
pub mod fs_utils;
pub mod network;

pub use command::{check_tool, AutoEditorCommand, AutoEditorRunner, DEFAULT_BINARY, DEFAULT_TIMEOUT_SECS};
pub use download::{
    download_to_file, url_file_extension, DownloadLimits, HttpDownloader, SourceDownloader,
};
pub use editor::VideoEditor;
pub use error::{MediaError, MediaResult};
pub use network::{is_restricted_ip, is_restricted_url, PublicResolver};
