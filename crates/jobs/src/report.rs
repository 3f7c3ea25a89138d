//! Read-side views returned to callers polling a job.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::{Job, JobId, JobStatus};

/// Answer to "how is my job doing?".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusReport {
    pub job_id: JobId,
    pub operation_type: String,
    pub status: JobStatus,
    pub progress: u8,
    pub status_message: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub elapsed_ms: i64,
    pub is_complete: bool,
}

impl From<&Job> for JobStatusReport {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            operation_type: job.operation_type.clone(),
            status: job.status,
            progress: job.progress,
            status_message: job.status_message.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            elapsed_ms: job.elapsed().num_milliseconds(),
            is_complete: job.is_terminal(),
        }
    }
}

/// Answer to "what did my job produce?".
///
/// `result` is only set for completed jobs and `error` only for failed ones;
/// a cancelled or still-running job carries neither.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResultView {
    pub job_id: JobId,
    pub operation_type: String,
    pub status: JobStatus,
    pub progress: u8,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub total_time_ms: i64,
}

impl From<&Job> for JobResultView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            operation_type: job.operation_type.clone(),
            status: job.status,
            progress: job.progress,
            result: job.result.clone(),
            error: job.error.clone(),
            total_time_ms: job.elapsed().num_milliseconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobInputs;

    #[test]
    fn status_report_flags_terminal_jobs() {
        let mut job = Job::new("report", JobInputs::new(), None);
        let report = JobStatusReport::from(&job);
        assert!(!report.is_complete);
        assert_eq!(report.status_message, "Job created, waiting to start");

        job.mark_running().unwrap();
        job.mark_failed("boom").unwrap();
        let report = JobStatusReport::from(&job);
        assert!(report.is_complete);
        assert_eq!(report.status, JobStatus::Failed);
    }

    #[test]
    fn result_view_serializes_snake_case_status() {
        let mut job = Job::new("echo", JobInputs::new(), None);
        job.mark_running().unwrap();
        job.mark_completed(serde_json::json!("hello")).unwrap();

        let value = serde_json::to_value(JobResultView::from(&job)).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["result"], "hello");
        assert!(value["error"].is_null());
    }
}
