//! Structured job logging.
//!
//! Each job gets a `job` span carrying `job_id` and `operation`; everything
//! logged inside it, including events from the media and storage crates,
//! inherits those fields in both pretty and JSON output.

use tracing::{error, info, info_span, warn, Span};

use autoedit_models::JobId;

/// Logger bound to one job's span.
#[derive(Clone)]
pub struct JobLogger {
    span: Span,
}

impl JobLogger {
    /// Open a span for `operation` (e.g. "process_video") on `job_id`.
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            span: info_span!("job", job_id = %job_id, operation),
        }
    }

    /// Span to instrument the job's future with.
    pub fn span(&self) -> Span {
        self.span.clone()
    }

    pub fn start(&self, message: &str) {
        self.span.in_scope(|| info!("Job started: {}", message));
    }

    pub fn progress(&self, message: &str) {
        self.span.in_scope(|| info!("Job progress: {}", message));
    }

    pub fn warning(&self, message: &str) {
        self.span.in_scope(|| warn!("Job warning: {}", message));
    }

    pub fn failed(&self, message: &str) {
        self.span.in_scope(|| error!("Job failed: {}", message));
    }

    pub fn completed(&self, message: &str, elapsed_secs: f64) {
        self.span
            .in_scope(|| info!(elapsed_secs, "Job completed: {}", message));
    }
}
