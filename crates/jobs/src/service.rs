//! Orchestration facade: submit, inspect and cancel background jobs.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use super::config::JobsConfig;
use super::context::{JobContext, JobOutcome};
use super::report::{JobResultView, JobStatusReport};
use super::runner::{JobRunner, RunnerStats};
use super::store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
use super::sweeper::{self, RetentionSweeper, SweeperHandle};
use super::types::{Job, JobId, JobInputs, JobStatus};

/// Facade error. Unknown job ids are never errors; they come back as `None`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobServiceError {
    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// The request-reply job API.
///
/// `submit` returns as soon as the job is recorded; the work runs on its own
/// tokio task and callers poll [`JobService::get_status`] /
/// [`JobService::get_result`] by id.
pub struct JobService<S = Arc<InMemoryJobStore>> {
    store: S,
    runner: JobRunner<S>,
    config: JobsConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl JobService<Arc<InMemoryJobStore>> {
    /// A service backed by a fresh in-memory store.
    pub fn in_memory(config: JobsConfig) -> Self {
        Self::new(InMemoryJobStore::arc(), config)
    }
}

impl<S: JobStore + Clone + 'static> JobService<S> {
    pub fn new(store: S, config: JobsConfig) -> Self {
        Self {
            runner: JobRunner::new(store.clone()),
            store,
            config,
            tasks: Mutex::new(Vec::new()),
            sweeper: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &JobsConfig {
        &self.config
    }

    /// Record a pending job and start `work` in the background.
    ///
    /// Must be called from within a tokio runtime. Returns the job as it was
    /// created (status `Pending`).
    pub fn submit<F, Fut>(
        &self,
        operation_type: &str,
        inputs: JobInputs,
        initiated_by: Option<String>,
        work: F,
    ) -> Result<Job, JobServiceError>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        let job = self.store.create(operation_type, inputs, initiated_by)?;
        let cancel = self
            .store
            .cancellation_token(job.id)?
            .ok_or(JobStoreError::NotFound(job.id))?;

        info!(job_id = %job.id, operation = %job.operation_type, "created job");

        let handle = self.runner.run(job.id, cancel, work);
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);

        Ok(job)
    }

    /// Full snapshot of a job.
    pub fn get(&self, job_id: JobId) -> Result<Option<Job>, JobServiceError> {
        Ok(self.store.get(job_id)?)
    }

    pub fn get_status(&self, job_id: JobId) -> Result<Option<JobStatusReport>, JobServiceError> {
        Ok(self.store.get(job_id)?.as_ref().map(JobStatusReport::from))
    }

    pub fn get_result(&self, job_id: JobId) -> Result<Option<JobResultView>, JobServiceError> {
        Ok(self.store.get(job_id)?.as_ref().map(JobResultView::from))
    }

    /// Jobs newest-created first, optionally filtered by status.
    pub fn list(
        &self,
        status: Option<JobStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Job>, JobServiceError> {
        Ok(self.store.list(status, limit)?)
    }

    /// Request cancellation.
    ///
    /// Returns `false` without touching the job if it does not exist or is
    /// already terminal. Otherwise the status flips to `Cancelled` right away
    /// and the work is signalled to stop.
    pub fn cancel(&self, job_id: JobId) -> Result<bool, JobServiceError> {
        match self.store.cancel(job_id) {
            Ok(_) => {
                info!(job_id = %job_id, "cancelled job");
                Ok(true)
            }
            Err(JobStoreError::NotFound(_)) => Ok(false),
            Err(JobStoreError::InvalidTransition(t)) => {
                warn!(
                    job_id = %job_id,
                    status = %t.from,
                    "cannot cancel job: already in terminal state"
                );
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove terminal jobs completed more than `max_age` ago.
    pub fn sweep(&self, max_age: Duration) -> Result<usize, JobServiceError> {
        Ok(sweeper::sweep(&self.store, max_age)?)
    }

    pub fn stats(&self) -> Result<JobStats, JobServiceError> {
        Ok(self.store.stats()?)
    }

    pub fn runner_stats(&self) -> RunnerStats {
        self.runner.stats()
    }

    /// Poll until the job is terminal or `timeout` elapses.
    ///
    /// Returns the last observed snapshot, or `None` if the job is unknown.
    pub async fn wait_for_terminal(
        &self,
        job_id: JobId,
        timeout: Duration,
    ) -> Result<Option<Job>, JobServiceError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let job = self.store.get(job_id)?;
            let active = job.as_ref().is_some_and(|j| !j.is_terminal());
            if !active || tokio::time::Instant::now() >= deadline {
                return Ok(job);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Start the retention sweeper with this service's config.
    /// Calling it again while a sweeper is running does nothing.
    pub fn start_sweeper(&self) {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if sweeper.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        *sweeper = Some(RetentionSweeper::from_config(self.store.clone(), &self.config).spawn());
    }

    /// Stop the sweeper, cancel all unfinished jobs and wait for their tasks.
    pub async fn shutdown(&self) -> Result<(), JobServiceError> {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = sweeper {
            handle.shutdown().await;
        }

        for status in [JobStatus::Pending, JobStatus::Running] {
            for job in self.store.list(Some(status), None)? {
                self.cancel(job.id)?;
            }
        }

        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let in_flight = tasks.len();
        for task in tasks {
            task_ended_abnormally(task.await);
        }

        info!(in_flight, "job service stopped");
        Ok(())
    }
}

/// Log a runner task that panicked. Aborted tasks are expected during
/// runtime teardown and stay quiet.
fn task_ended_abnormally(exit: Result<(), JoinError>) -> bool {
    match exit {
        Err(e) if !e.is_cancelled() => {
            warn!(error = %e, "job task ended abnormally");
            true
        }
        _ => false,
    }
}
