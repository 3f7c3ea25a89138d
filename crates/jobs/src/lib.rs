//! Background jobs for the async request-reply pattern.
//!
//! ## Design
//!
//! - A caller submits work and gets a job id back immediately
//! - Work runs on its own tokio task and reports progress into the store
//! - Callers poll status/result by id and may cancel cooperatively
//! - Terminal jobs are swept after a retention window
//!
//! ## Components
//!
//! - `Job`: the tracked record and its state machine
//! - `JobStore`: concurrent storage for records (in-memory)
//! - `JobRunner`: runs one unit of work and records exactly one outcome
//! - `RetentionSweeper`: periodic removal of old terminal jobs
//! - `JobService`: the facade tying the above together

pub mod config;
pub mod context;
pub mod report;
pub mod runner;
pub mod service;
pub mod store;
pub mod sweeper;
pub mod types;

pub use config::JobsConfig;
pub use context::{JobContext, JobError, JobOutcome};
pub use report::{JobResultView, JobStatusReport};
pub use runner::{JobRunner, RunnerStats};
pub use service::{JobService, JobServiceError};
pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use sweeper::{RetentionSweeper, SweeperHandle};
pub use types::{
    InvalidTransition, Job, JobId, JobInputs, JobStatus, JobUpdate, ParseJobIdError,
    ParseJobStatusError,
};
