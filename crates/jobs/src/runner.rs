//! Job runner: executes work in the background and records its outcome.

use std::any::Any;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::context::{JobContext, JobError, JobOutcome};
use super::store::{JobStore, JobStoreError};
use super::types::{JobId, JobStatus};

/// Runner statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunnerStats {
    pub jobs_started: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    /// Jobs that ended Cancelled, whoever requested the cancellation
    pub jobs_cancelled: u64,
    pub current_running: usize,
}

/// Background job runner.
///
/// Each call to [`JobRunner::run`] spawns one tokio task that drives a single
/// job from Pending to exactly one terminal state. Nothing the work does
/// (errors or panics) escapes the task; every outcome becomes job state.
#[derive(Debug, Clone)]
pub struct JobRunner<S> {
    store: S,
    stats: Arc<Mutex<RunnerStats>>,
}

impl<S: JobStore + Clone + 'static> JobRunner<S> {
    /// Create a new runner over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            stats: Arc::new(Mutex::new(RunnerStats::default())),
        }
    }

    /// Get current runner statistics.
    pub fn stats(&self) -> RunnerStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Spawn `work` for `job_id` on the current tokio runtime.
    ///
    /// The returned handle is only useful for cleanup; callers never need to
    /// await it to observe the job's outcome.
    pub fn run<F, Fut>(&self, job_id: JobId, cancel: CancellationToken, work: F) -> JoinHandle<()>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        let runner = self.clone();
        tokio::spawn(async move { runner.execute(job_id, cancel, work).await })
    }

    async fn execute<F, Fut>(self, job_id: JobId, cancel: CancellationToken, work: F)
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        let job = match self.store.start(job_id) {
            Ok(job) => job,
            Err(e) => {
                // Typically cancelled before the runner got to it.
                debug!(job_id = %job_id, error = %e, "job not started");
                return;
            }
        };

        info!(job_id = %job_id, operation = %job.operation_type, "started job");
        self.record(|s| {
            s.jobs_started += 1;
            s.current_running += 1;
        });

        let ctx = JobContext::new(&job, cancel.clone(), Arc::new(self.store.clone()));

        // A separate task turns a panic inside the work into a JoinError.
        let outcome = match tokio::spawn(async move { work(ctx).await }).await {
            Ok(outcome) => outcome,
            Err(join_err) if join_err.is_panic() => Err(JobError::Failed(format!(
                "work panicked: {}",
                panic_message(join_err.into_panic().as_ref())
            ))),
            Err(_) => Err(JobError::Cancelled),
        };

        self.finish(job_id, &cancel, outcome);
        self.record(|s| s.current_running = s.current_running.saturating_sub(1));
    }

    fn finish(&self, job_id: JobId, cancel: &CancellationToken, outcome: JobOutcome) {
        match outcome {
            Ok(value) if !cancel.is_cancelled() => match self.store.complete(job_id, value) {
                Ok(job) => {
                    info!(
                        job_id = %job_id,
                        elapsed_ms = job.elapsed().num_milliseconds(),
                        "completed job"
                    );
                    self.record(|s| s.jobs_completed += 1);
                }
                Err(e) => debug!(job_id = %job_id, error = %e, "discarded job result"),
            },
            Ok(_) | Err(JobError::Cancelled) => match self.store.cancel(job_id) {
                Ok(_) => {
                    info!(job_id = %job_id, "job stopped on cancellation");
                    self.record(|s| s.jobs_cancelled += 1);
                }
                // Cancelled from outside while the work was running.
                Err(JobStoreError::InvalidTransition(t)) if t.from == JobStatus::Cancelled => {
                    info!(job_id = %job_id, "job stopped on cancellation");
                    self.record(|s| s.jobs_cancelled += 1);
                }
                Err(e) => debug!(job_id = %job_id, error = %e, "discarded job cancellation"),
            },
            Err(JobError::Failed(message)) => match self.store.fail(job_id, message.clone()) {
                Ok(_) => {
                    error!(job_id = %job_id, error = %message, "job failed");
                    self.record(|s| s.jobs_failed += 1);
                }
                Err(e) => debug!(job_id = %job_id, error = %e, "discarded job failure"),
            },
        }
    }

    fn record(&self, f: impl FnOnce(&mut RunnerStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
