//! Handle passed to a unit of work while it runs.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::store::JobStore;
use super::types::{Job, JobId, JobInputs, JobUpdate};

/// How a unit of work ended, other than by returning a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    /// The work observed its cancellation signal and stopped.
    #[error("job was cancelled")]
    Cancelled,
    /// The work failed; the message is recorded on the job.
    #[error("{0}")]
    Failed(String),
}

impl JobError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(format!("{err:#}"))
    }
}

/// Result type returned by work functions.
pub type JobOutcome = Result<serde_json::Value, JobError>;

/// Everything a work function may touch: its own record's id and inputs,
/// a progress reporter, and the cancellation signal.
#[derive(Clone)]
pub struct JobContext {
    job_id: JobId,
    operation_type: String,
    inputs: Arc<JobInputs>,
    cancel: CancellationToken,
    store: Arc<dyn JobStore>,
}

impl core::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("operation_type", &self.operation_type)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl JobContext {
    pub fn new(job: &Job, cancel: CancellationToken, store: Arc<dyn JobStore>) -> Self {
        Self {
            job_id: job.id,
            operation_type: job.operation_type.clone(),
            inputs: Arc::new(job.inputs.clone()),
            cancel,
            store,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn operation_type(&self) -> &str {
        &self.operation_type
    }

    pub fn inputs(&self) -> &JobInputs {
        &self.inputs
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Return `Err(JobError::Cancelled)` once cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), JobError> {
        if self.cancel.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early with `Err(Cancelled)` if the job
    /// is cancelled in the meantime.
    pub async fn sleep(&self, duration: Duration) -> Result<(), JobError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(JobError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Report progress (clamped to 0..=100) with a status message.
    ///
    /// Returns `false` when the update was not applied, e.g. because the
    /// job has already been cancelled.
    pub fn report_progress(&self, progress: i64, message: impl Into<String>) -> bool {
        self.update(JobUpdate::new().progress(progress).message(message))
    }

    /// Apply an arbitrary update to this job's record.
    pub fn update(&self, update: JobUpdate) -> bool {
        self.store.update(self.job_id, update).is_ok()
    }

    /// Latest snapshot of this job's record.
    pub fn snapshot(&self) -> Option<Job> {
        self.store.get(self.job_id).ok().flatten()
    }
}
