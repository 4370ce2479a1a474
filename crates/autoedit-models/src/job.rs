//! Job bookkeeping records.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::options::EditOptions;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The editing tool is running (or waiting for a slot)
    #[default]
    Processing,
    /// Output is ready
    Completed,
    /// The editing tool or a surrounding step failed
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the input video came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobSource {
    /// Multipart upload
    Upload { filename: String },
    /// Fetched from a remote URL
    Url { url: String },
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobTransitionError {
    #[error("Job {job_id} is already {status}")]
    AlreadyTerminal { job_id: JobId, status: JobStatus },
}

/// Remote copy of a finished output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOutput {
    /// Object key in the bucket
    pub key: String,
    /// Presigned access URL
    pub url: String,
}

/// A single processing request tracked from acceptance to completion.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Current status
    pub status: JobStatus,

    /// Human-readable status message
    pub message: String,

    /// Local output path (absent once uploaded, or when the job failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Presigned URL of the uploaded output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    /// Object key of the uploaded output
    #[serde(skip)]
    pub remote_key: Option<String>,

    /// Input origin
    pub source: JobSource,

    /// Options passed to the editing tool
    #[serde(default)]
    pub options: EditOptions,

    /// When the job was accepted
    pub created_at: DateTime<Utc>,

    /// When the job was last updated
    pub updated_at: DateTime<Utc>,

    /// When the job reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a job in the `processing` state.
    pub fn new(id: JobId, source: JobSource, options: EditOptions) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Processing,
            message: "Video is being processed".to_string(),
            output_path: None,
            remote_url: None,
            remote_key: None,
            source,
            options,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Mark the job completed with its output location.
    ///
    /// Exactly one of `output_path` / `remote` is normally set; both may be
    /// set when an upload was kept alongside the local copy.
    pub fn complete(
        &mut self,
        message: impl Into<String>,
        output_path: Option<PathBuf>,
        remote: Option<RemoteOutput>,
    ) -> Result<(), JobTransitionError> {
        self.ensure_not_terminal()?;

        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.message = message.into();
        self.output_path = output_path;
        if let Some(remote) = remote {
            self.remote_key = Some(remote.key);
            self.remote_url = Some(remote.url);
        }
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Mark the job failed.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), JobTransitionError> {
        self.ensure_not_terminal()?;

        let now = Utc::now();
        self.status = JobStatus::Failed;
        self.message = message.into();
        self.output_path = None;
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Local output path, if the output still lives on this host.
    pub fn local_output(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Whether the output was pushed to object storage.
    pub fn is_remote(&self) -> bool {
        self.remote_key.is_some()
    }

    fn ensure_not_terminal(&self) -> Result<(), JobTransitionError> {
        if self.is_terminal() {
            return Err(JobTransitionError::AlreadyTerminal {
                job_id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_job() -> Job {
        Job::new(
            JobId::from("job-1234"),
            JobSource::Upload {
                filename: "talk.mp4".into(),
            },
            EditOptions::default(),
        )
    }

    #[test]
    fn test_job_creation() {
        let job = upload_job();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.message, "Video is being processed");
        assert!(!job.is_terminal());
        assert!(job.output_path.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_complete_local() {
        let mut job = upload_job();
        job.complete(
            "Video processed successfully",
            Some(PathBuf::from("/tmp/outputs/job-1234_output.mp4")),
            None,
        )
        .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.is_terminal());
        assert!(!job.is_remote());
        assert_eq!(
            job.local_output(),
            Some(Path::new("/tmp/outputs/job-1234_output.mp4"))
        );
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_complete_remote() {
        let mut job = upload_job();
        job.complete(
            "Video processed successfully",
            None,
            Some(RemoteOutput {
                key: "outputs/job-1234/job-1234_output.mp4".into(),
                url: "https://bucket.example.com/signed".into(),
            }),
        )
        .unwrap();

        assert!(job.is_remote());
        assert!(job.local_output().is_none());
        assert_eq!(
            job.remote_url.as_deref(),
            Some("https://bucket.example.com/signed")
        );
    }

    #[test]
    fn test_single_terminal_transition() {
        let mut job = upload_job();
        job.fail("Auto-editor error: boom").unwrap();

        let err = job
            .complete("Video processed successfully", None, None)
            .unwrap_err();
        assert_eq!(
            err,
            JobTransitionError::AlreadyTerminal {
                job_id: JobId::from("job-1234"),
                status: JobStatus::Failed,
            }
        );
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "Auto-editor error: boom");

        assert!(job.fail("again").is_err());
        assert_eq!(job.message, "Auto-editor error: boom");
    }

    #[test]
    fn test_remote_key_not_serialized() {
        let mut job = upload_job();
        job.remote_key = Some("outputs/secret".into());
        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("remote_key").is_none());
        assert_eq!(json["status"], "processing");
        assert_eq!(json["source"]["kind"], "upload");
    }

    #[test]
    fn test_job_id_unique() {
        assert_ne!(JobId::new(), JobId::new());
        assert_eq!(JobId::from("abc").to_string(), "abc");
    }
}
