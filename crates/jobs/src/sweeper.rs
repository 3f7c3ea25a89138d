//! Retention sweeper: evicts terminal jobs past the retention window.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::config::JobsConfig;
use super::store::{JobStore, JobStoreError};

/// Remove terminal jobs whose completion is older than `max_age`.
///
/// Returns the number of removed jobs.
pub fn sweep<S: JobStore + ?Sized>(store: &S, max_age: Duration) -> Result<usize, JobStoreError> {
    let removed = store.sweep(max_age)?;
    if removed.is_empty() {
        debug!(max_age_secs = max_age.as_secs(), "no jobs to clean up");
    } else {
        info!(count = removed.len(), max_age_secs = max_age.as_secs(), "cleaned up old jobs");
    }
    Ok(removed.len())
}

/// Handle to stop a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Request shutdown and wait for the sweeper task to stop.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        // A dropped handle must not leave the timer running forever.
        self.shutdown.cancel();
    }
}

/// Periodic background sweeper.
#[derive(Debug, Clone)]
pub struct RetentionSweeper<S> {
    store: S,
    retention: Duration,
    interval: Duration,
}

impl<S: JobStore + Clone + 'static> RetentionSweeper<S> {
    pub fn new(store: S, retention: Duration, interval: Duration) -> Self {
        Self {
            store,
            retention,
            interval,
        }
    }

    pub fn from_config(store: S, config: &JobsConfig) -> Self {
        Self::new(store, config.retention, config.sweep_interval)
    }

    /// Run one sweep with the configured retention window.
    pub fn sweep_once(&self) -> Result<usize, JobStoreError> {
        sweep(&self.store, self.retention)
    }

    /// Spawn the sweeper on the current tokio runtime.
    ///
    /// The first sweep happens one full interval after spawning.
    pub fn spawn(self) -> SweeperHandle {
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        let join = tokio::spawn(async move {
            info!(
                retention_secs = self.retention.as_secs(),
                interval_secs = self.interval.as_secs(),
                "job sweeper started"
            );

            // tokio intervals cannot have a zero period
            let period = self.interval.max(Duration::from_millis(1));
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep_once() {
                            error!(error = %e, "error during job cleanup");
                        }
                    }
                }
            }

            info!("job sweeper stopped");
        });

        SweeperHandle {
            shutdown,
            join: Some(join),
        }
    }
}
