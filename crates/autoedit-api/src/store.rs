//! In-memory job table.
//!
//! Jobs live only as long as the process; there is no persistence.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use autoedit_models::{Job, JobId, JobStatus, JobTransitionError, RemoteOutput};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

/// Job store errors.
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error(transparent)]
    Transition(#[from] JobTransitionError),
}

/// Number of jobs per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Shared job table keyed by job ID.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly accepted job.
    pub async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    /// Snapshot of a job.
    pub async fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    /// Record successful completion.
    pub async fn complete(
        &self,
        id: &JobId,
        message: impl Into<String>,
        output_path: Option<PathBuf>,
        remote: Option<RemoteOutput>,
    ) -> Result<Job, JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobStoreError::NotFound(id.clone()))?;
        job.complete(message, output_path, remote)?;
        Ok(job.clone())
    }

    /// Record failure.
    pub async fn fail(&self, id: &JobId, message: impl Into<String>) -> Result<Job, JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobStoreError::NotFound(id.clone()))?;
        job.fail(message)?;
        Ok(job.clone())
    }

    /// Forget a job, returning its last state.
    pub async fn remove(&self, id: &JobId) -> Option<Job> {
        self.jobs.write().await.remove(id)
    }

    /// Number of tracked jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Whether no jobs are tracked.
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Job counts by status.
    pub async fn counts(&self) -> JobCounts {
        let jobs = self.jobs.read().await;
        let mut counts = JobCounts::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoedit_models::{EditOptions, JobSource};

    fn job(id: &str) -> Job {
        Job::new(
            JobId::from(id),
            JobSource::Upload {
                filename: "in.mp4".into(),
            },
            EditOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = JobStore::new();
        store.insert(job("job-00001")).await;

        let found = store.get(&JobId::from("job-00001")).await.unwrap();
        assert_eq!(found.status, JobStatus::Processing);
        assert!(store.get(&JobId::from("job-00002")).await.is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_complete_then_fail_rejected() {
        let store = JobStore::new();
        let id = JobId::from("job-00001");
        store.insert(job("job-00001")).await;

        store
            .complete(&id, "Video processed successfully", Some(PathBuf::from("/tmp/o.mp4")), None)
            .await
            .unwrap();

        let err = store.fail(&id, "late failure").await.unwrap_err();
        assert!(matches!(err, JobStoreError::Transition(_)));

        let found = store.get(&id).await.unwrap();
        assert_eq!(found.status, JobStatus::Completed);
        assert_eq!(found.message, "Video processed successfully");
    }

    #[tokio::test]
    async fn test_update_missing_job() {
        let store = JobStore::new();
        let err = store
            .fail(&JobId::from("job-gone00"), "boom")
            .await
            .unwrap_err();
        assert!(matches!(err, JobStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_and_counts() {
        let store = JobStore::new();
        store.insert(job("job-00001")).await;
        store.insert(job("job-00002")).await;
        store.insert(job("job-00003")).await;
        store.fail(&JobId::from("job-00002"), "boom").await.unwrap();
        store
            .complete(&JobId::from("job-00003"), "ok", None, None)
            .await
            .unwrap();

        assert_eq!(
            store.counts().await,
            JobCounts {
                processing: 1,
                completed: 1,
                failed: 1
            }
        );

        let removed = store.remove(&JobId::from("job-00002")).await.unwrap();
        assert_eq!(removed.status, JobStatus::Failed);
        assert!(store.remove(&JobId::from("job-00002")).await.is_none());
        assert_eq!(store.len().await, 2);
        assert!(!store.is_empty().await);
    }
}
