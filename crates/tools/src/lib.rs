//! `asyncops-tools`
//!
//! Long-running demo operations built on the job service. Each `start_*`
//! call validates its inputs, submits the work and returns right away with a
//! job id the caller can poll.

pub mod analysis;
pub mod batch;
pub mod report;
mod simulate;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use asyncops_jobs::{
    InMemoryJobStore, JobId, JobInputs, JobServiceError, JobService, JobStore,
};

pub use analysis::AnalysisType;

/// Returned by every `start_*` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStarted {
    pub job_id: JobId,
    pub operation_type: String,
    pub inputs: JobInputs,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Job(#[from] JobServiceError),
}

/// Entry point for the demo operations.
pub struct LongRunningTools<S = Arc<InMemoryJobStore>> {
    service: Arc<JobService<S>>,
    step_delay: Duration,
}

impl<S: JobStore + Clone + 'static> LongRunningTools<S> {
    pub fn new(service: Arc<JobService<S>>) -> Self {
        Self {
            service,
            step_delay: Duration::from_millis(500),
        }
    }

    /// Simulated time spent on each unit of work.
    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    pub fn service(&self) -> &Arc<JobService<S>> {
        &self.service
    }

    pub fn start_data_analysis(
        &self,
        dataset_name: &str,
        analysis_type: &str,
        record_count: i64,
    ) -> Result<JobStarted, ToolError> {
        let request = analysis::AnalysisRequest::new(dataset_name, analysis_type, record_count)?;
        let inputs = request.inputs();
        let delay = self.step_delay;
        let job = self.service.submit(
            analysis::OPERATION,
            inputs.clone(),
            None,
            move |ctx| analysis::run(ctx, request, delay),
        )?;
        Ok(started(job.id, analysis::OPERATION, inputs))
    }

    pub fn start_report_generation(
        &self,
        title: &str,
        format: &str,
        include_charts: bool,
    ) -> Result<JobStarted, ToolError> {
        let request = report::ReportRequest::new(title, format, include_charts);
        let inputs = request.inputs();
        let delay = self.step_delay;
        let job = self.service.submit(
            report::OPERATION,
            inputs.clone(),
            None,
            move |ctx| report::run(ctx, request, delay),
        )?;
        Ok(started(job.id, report::OPERATION, inputs))
    }

    pub fn start_batch_processing(
        &self,
        item_ids: &str,
        operation: &str,
    ) -> Result<JobStarted, ToolError> {
        let request = batch::BatchRequest::new(item_ids, operation)?;
        let inputs = request.inputs();
        let delay = self.step_delay;
        let job = self.service.submit(
            batch::OPERATION,
            inputs.clone(),
            None,
            move |ctx| batch::run(ctx, request, delay),
        )?;
        Ok(started(job.id, batch::OPERATION, inputs))
    }
}

fn started(job_id: JobId, operation_type: &str, inputs: JobInputs) -> JobStarted {
    JobStarted {
        job_id,
        operation_type: operation_type.to_string(),
        inputs,
    }
}
