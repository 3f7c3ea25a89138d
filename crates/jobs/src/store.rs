//! Job storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::types::{InvalidTransition, Job, JobId, JobInputs, JobStatus, JobUpdate};

/// Job store abstraction.
///
/// Implementations must be safe to call from many tasks at once; every
/// method observes or mutates a whole record atomically.
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails if the id is already taken.
    fn insert(&self, job: Job) -> Result<JobId, JobStoreError>;

    /// Get a snapshot of a job by ID.
    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// List jobs, newest-created first, optionally filtered by status.
    fn list(&self, status: Option<JobStatus>, limit: Option<usize>)
        -> Result<Vec<Job>, JobStoreError>;

    /// Apply a progress/message/status update reported by running work.
    fn update(&self, job_id: JobId, update: JobUpdate) -> Result<Job, JobStoreError>;

    /// Pending -> Running.
    fn start(&self, job_id: JobId) -> Result<Job, JobStoreError>;

    /// Running -> Completed.
    fn complete(&self, job_id: JobId, result: serde_json::Value) -> Result<Job, JobStoreError>;

    /// Running -> Failed.
    fn fail(&self, job_id: JobId, error: String) -> Result<Job, JobStoreError>;

    /// Fire the job's cancellation token and move it to Cancelled.
    fn cancel(&self, job_id: JobId) -> Result<Job, JobStoreError>;

    /// The cancellation token bound to a job.
    fn cancellation_token(&self, job_id: JobId) -> Result<Option<CancellationToken>, JobStoreError>;

    /// Remove a job regardless of its status.
    fn remove(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Remove terminal jobs that completed strictly before `cutoff`.
    /// Returns the ids that were removed.
    fn remove_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobId>, JobStoreError>;

    /// Get job statistics.
    fn stats(&self) -> Result<JobStats, JobStoreError>;

    /// Create and insert a pending job.
    fn create(
        &self,
        operation_type: &str,
        inputs: JobInputs,
        initiated_by: Option<String>,
    ) -> Result<Job, JobStoreError> {
        let job = Job::new(operation_type, inputs, initiated_by);
        self.insert(job.clone())?;
        Ok(job)
    }

    /// Remove terminal jobs whose completion is older than `max_age`.
    ///
    /// A `max_age` reaching back past the representable time range removes
    /// nothing.
    fn sweep(&self, max_age: Duration) -> Result<Vec<JobId>, JobStoreError> {
        let cutoff = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        match cutoff {
            Some(cutoff) => self.remove_terminal_before(cutoff),
            None => Ok(Vec::new()),
        }
    }
}

/// Job store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Job statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl JobStats {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed + self.cancelled
    }
}

#[derive(Debug)]
struct JobEntry {
    job: Job,
    cancel: CancellationToken,
}

/// In-memory job store.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<JobId, JobEntry>>, JobStoreError> {
        self.jobs
            .read()
            .map_err(|_| JobStoreError::Storage("job store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<JobId, JobEntry>>, JobStoreError> {
        self.jobs
            .write()
            .map_err(|_| JobStoreError::Storage("job store lock poisoned".to_string()))
    }

    /// Run `f` against a job under the write lock and return the new snapshot.
    fn mutate<F>(&self, job_id: JobId, f: F) -> Result<Job, JobStoreError>
    where
        F: FnOnce(&mut JobEntry) -> Result<(), InvalidTransition>,
    {
        let mut jobs = self.write()?;
        let entry = jobs
            .get_mut(&job_id)
            .ok_or(JobStoreError::NotFound(job_id))?;
        f(entry)?;
        Ok(entry.job.clone())
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: Job) -> Result<JobId, JobStoreError> {
        let mut jobs = self.write()?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(
            id,
            JobEntry {
                job,
                cancel: CancellationToken::new(),
            },
        );
        Ok(id)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let jobs = self.read()?;
        Ok(jobs.get(&job_id).map(|e| e.job.clone()))
    }

    fn list(
        &self,
        status: Option<JobStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self.read()?;
        let mut result: Vec<_> = jobs
            .values()
            .filter(|e| status.map_or(true, |s| e.job.status == s))
            .map(|e| e.job.clone())
            .collect();
        drop(jobs);

        // Newest first; v7 ids break ties between jobs created in the same instant.
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        Ok(result)
    }

    fn update(&self, job_id: JobId, update: JobUpdate) -> Result<Job, JobStoreError> {
        let result = self.mutate(job_id, |e| e.job.apply_update(update));
        match &result {
            Ok(job) => debug!(
                job_id = %job_id,
                status = %job.status,
                progress = job.progress,
                "updated job"
            ),
            Err(JobStoreError::NotFound(_)) => {
                warn!(job_id = %job_id, "attempted to update non-existent job")
            }
            Err(e) => warn!(job_id = %job_id, error = %e, "ignored job update"),
        }
        result
    }

    fn start(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        self.mutate(job_id, |e| e.job.mark_running())
    }

    fn complete(&self, job_id: JobId, result: serde_json::Value) -> Result<Job, JobStoreError> {
        self.mutate(job_id, |e| {
            // Cancellation wins even if the status flip has not landed yet.
            if e.cancel.is_cancelled() {
                return Err(InvalidTransition {
                    id: e.job.id,
                    from: e.job.status,
                    to: JobStatus::Completed,
                });
            }
            e.job.mark_completed(result)
        })
    }

    fn fail(&self, job_id: JobId, error: String) -> Result<Job, JobStoreError> {
        self.mutate(job_id, |e| e.job.mark_failed(error))
    }

    fn cancel(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        self.mutate(job_id, |e| {
            e.job.mark_cancelled()?;
            e.cancel.cancel();
            Ok(())
        })
    }

    fn cancellation_token(&self, job_id: JobId) -> Result<Option<CancellationToken>, JobStoreError> {
        let jobs = self.read()?;
        Ok(jobs.get(&job_id).map(|e| e.cancel.clone()))
    }

    fn remove(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let mut jobs = self.write()?;
        Ok(jobs.remove(&job_id).map(|e| e.job))
    }

    fn remove_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobId>, JobStoreError> {
        let mut jobs = self.write()?;
        let expired: Vec<JobId> = jobs
            .values()
            .filter(|e| e.job.is_terminal() && e.job.completed_at.is_some_and(|at| at < cutoff))
            .map(|e| e.job.id)
            .collect();

        for id in &expired {
            // Dropping the entry releases its cancellation token.
            jobs.remove(id);
        }
        Ok(expired)
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        let jobs = self.read()?;
        let mut stats = JobStats::default();

        for entry in jobs.values() {
            match entry.job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }

        Ok(stats)
    }
}

impl<S: JobStore + ?Sized> JobStore for Arc<S> {
    fn insert(&self, job: Job) -> Result<JobId, JobStoreError> {
        (**self).insert(job)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        (**self).get(job_id)
    }

    fn list(
        &self,
        status: Option<JobStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Job>, JobStoreError> {
        (**self).list(status, limit)
    }

    fn update(&self, job_id: JobId, update: JobUpdate) -> Result<Job, JobStoreError> {
        (**self).update(job_id, update)
    }

    fn start(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        (**self).start(job_id)
    }

    fn complete(&self, job_id: JobId, result: serde_json::Value) -> Result<Job, JobStoreError> {
        (**self).complete(job_id, result)
    }

    fn fail(&self, job_id: JobId, error: String) -> Result<Job, JobStoreError> {
        (**self).fail(job_id, error)
    }

    fn cancel(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        (**self).cancel(job_id)
    }

    fn cancellation_token(&self, job_id: JobId) -> Result<Option<CancellationToken>, JobStoreError> {
        (**self).cancellation_token(job_id)
    }

    fn remove(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        (**self).remove(job_id)
    }

    fn remove_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobId>, JobStoreError> {
        (**self).remove_terminal_before(cutoff)
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        (**self).stats()
    }
}
