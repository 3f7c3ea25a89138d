//! Runs the three demo operations against an in-memory job service and
//! prints what a polling client would see.

use std::sync::Arc;
use std::time::Duration;

use asyncops_jobs::{JobId, JobService, JobsConfig};
use asyncops_tools::LongRunningTools;
use tracing::info;

const WAIT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    asyncops_observability::init();

    let config = JobsConfig::from_env();
    info!(
        retention_secs = config.retention.as_secs(),
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "starting demo"
    );

    let service = Arc::new(JobService::in_memory(config));
    service.start_sweeper();

    let tools = LongRunningTools::new(service.clone()).with_step_delay(Duration::from_millis(200));

    let analysis = tools.start_data_analysis("customer_events", "comprehensive", 2_500)?;
    let report = tools.start_report_generation("Monthly Operations", "markdown", true)?;
    let batch = tools.start_batch_processing("ord-1,ord-2,ord-3,ord-4,ord-5,ord-6", "reconcile")?;

    for started in [&analysis, &report, &batch] {
        println!("{}", serde_json::to_string_pretty(started)?);
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    if let Some(status) = service.get_status(report.job_id)? {
        println!("{}", serde_json::to_string_pretty(&status)?);
    }
    let cancelled = service.cancel(report.job_id)?;
    info!(job_id = %report.job_id, cancelled, "requested report cancellation");

    for job_id in [analysis.job_id, report.job_id, batch.job_id] {
        print_outcome(&service, job_id).await?;
    }

    let summary: Vec<_> = service
        .list(None, None)?
        .iter()
        .map(|job| format!("{} {} {}", job.id, job.operation_type, job.status))
        .collect();
    println!("{}", summary.join("\n"));
    println!("{}", serde_json::to_string_pretty(&service.stats()?)?);

    service.shutdown().await?;
    Ok(())
}

async fn print_outcome(service: &JobService, job_id: JobId) -> anyhow::Result<()> {
    service.wait_for_terminal(job_id, WAIT).await?;
    if let Some(status) = service.get_status(job_id)? {
        println!("{}", serde_json::to_string_pretty(&status)?);
    }
    if let Some(result) = service.get_result(job_id)? {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}
