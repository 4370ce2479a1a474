//! Client-facing status payload.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{Job, JobId, JobStatus};

/// Status of a processing job as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingStatus {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Local output path on the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    /// Presigned URL when the output lives in object storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl ProcessingStatus {
    /// Response for a freshly accepted job.
    pub fn started(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Processing,
            message: Some("Video processing started".to_string()),
            output_file: None,
            download_url: None,
        }
    }
}

impl From<&Job> for ProcessingStatus {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            message: Some(job.message.clone()),
            output_file: job
                .output_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            download_url: job.remote_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EditOptions, JobSource};
    use std::path::PathBuf;

    #[test]
    fn test_started_payload() {
        let status = ProcessingStatus::started(JobId::from("job-1"));
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["job_id"], "job-1");
        assert_eq!(json["status"], "processing");
        assert_eq!(json["message"], "Video processing started");
        assert!(json.get("output_file").is_none());
        assert!(json.get("download_url").is_none());
    }

    #[test]
    fn test_from_completed_job() {
        let mut job = Job::new(
            JobId::from("job-2"),
            JobSource::Url {
                url: "https://example.com/a.mp4".into(),
            },
            EditOptions::default(),
        );
        job.complete(
            "Video processed successfully",
            Some(PathBuf::from("/tmp/outputs/job-2_output.mp4")),
            None,
        )
        .unwrap();

        let status = ProcessingStatus::from(&job);
        assert_eq!(status.status, JobStatus::Completed);
        assert_eq!(
            status.output_file.as_deref(),
            Some("/tmp/outputs/job-2_output.mp4")
        );
        assert_eq!(status.message.as_deref(), Some("Video processed successfully"));
    }
}
