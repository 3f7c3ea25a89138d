//! Core job types and the job state machine.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque input parameters captured when a job is submitted.
pub type JobInputs = serde_json::Map<String, serde_json::Value>;

/// Unique job identifier.
///
/// Uses UUIDv7 so identifiers sort roughly by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for JobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for JobId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Error returned when a job id string is not a valid UUID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid job id `{input}`: {reason}")]
pub struct ParseJobIdError {
    pub input: String,
    pub reason: String,
}

impl FromStr for JobId {
    type Err = ParseJobIdError;

    /// Accepts both the hyphenated and the simple (32 hex digits) forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s.trim())
            .map(Self)
            .map_err(|e| ParseJobIdError {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Job execution status.
///
/// ```text
/// Pending ──► Running ──► Completed
///    │           ├──────► Failed
///    └───────────┴──────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, waiting for the runner to pick it up
    Pending,
    /// Work function is executing
    Running,
    /// Work returned a value
    Completed,
    /// Work raised an error (or panicked)
    Failed,
    /// Cancelled by a caller before completion
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status `{0}` (expected pending, running, completed, failed or cancelled)")]
pub struct ParseJobStatusError(pub String);

impl FromStr for JobStatus {
    type Err = ParseJobStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseJobStatusError(s.to_string()))
    }
}

/// Attempted a status change the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job {id}: invalid transition {from} -> {to}")]
pub struct InvalidTransition {
    pub id: JobId,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Partial update reported by a running job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub message: Option<String>,
    /// Unclamped; values outside 0..=100 are clamped when applied.
    pub progress: Option<i64>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn progress(mut self, progress: i64) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// A tracked unit of asynchronous work.
///
/// Values handed out by the store are snapshots; mutating one does not
/// affect the stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Free-form tag naming the operation (e.g. `"data_analysis"`)
    pub operation_type: String,
    pub status: JobStatus,
    /// Percentage in 0..=100
    pub progress: u8,
    pub status_message: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    /// Set iff `status` is terminal
    pub completed_at: Option<DateTime<Utc>>,
    /// Only present when `Completed`
    pub result: Option<serde_json::Value>,
    /// Only present when `Failed`
    pub error: Option<String>,
    pub inputs: JobInputs,
    pub initiated_by: Option<String>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(
        operation_type: impl Into<String>,
        inputs: JobInputs,
        initiated_by: Option<String>,
    ) -> Self {
        Self {
            id: JobId::new(),
            operation_type: operation_type.into(),
            status: JobStatus::Pending,
            progress: 0,
            status_message: "Job created, waiting to start".to_string(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            inputs,
            initiated_by,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Time since creation, frozen at completion for terminal jobs.
    pub fn elapsed(&self) -> chrono::Duration {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        end - self.created_at
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(to) {
            return Err(InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Mark job as running. `started_at` is only ever set once.
    pub fn mark_running(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Running)?;
        self.started_at.get_or_insert_with(Utc::now);
        self.status_message = "Job is running".to_string();
        Ok(())
    }

    /// Mark job as completed with its result.
    pub fn mark_completed(&mut self, result: serde_json::Value) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        self.progress = 100;
        self.status_message = "Job completed successfully".to_string();
        Ok(())
    }

    /// Mark job as failed.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        let error = error.into();
        self.transition(JobStatus::Failed)?;
        self.completed_at = Some(Utc::now());
        self.status_message = format!("Job failed: {error}");
        self.error = Some(error);
        Ok(())
    }

    /// Mark job as cancelled. Never records a result or an error.
    pub fn mark_cancelled(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Cancelled)?;
        self.completed_at = Some(Utc::now());
        self.status_message = "Job was cancelled".to_string();
        Ok(())
    }

    /// Apply a progress/status update from the work function.
    ///
    /// Terminal jobs are immutable. A status in the update may only move a
    /// pending job to running (or restate the current status); terminal
    /// statuses are reached through the dedicated `mark_*` methods.
    /// Progress is clamped to 0..=100 and never moves backwards.
    pub fn apply_update(&mut self, update: JobUpdate) -> Result<(), InvalidTransition> {
        let target = update.status.unwrap_or(self.status);

        let restates = target == self.status;
        if self.is_terminal() || !(restates || target == JobStatus::Running) {
            return Err(InvalidTransition {
                id: self.id,
                from: self.status,
                to: target,
            });
        }

        if !restates {
            self.mark_running()?;
        }

        if let Some(message) = update.message {
            self.status_message = message;
        }

        if let Some(progress) = update.progress {
            let clamped = progress.clamp(0, 100) as u8;
            self.progress = self.progress.max(clamped);
        }

        Ok(())
    }
}
