use std::sync::{Arc, Mutex};
use std::time::Duration;

use asyncops_jobs::{
    JobContext, JobError, JobInputs, JobOutcome, JobService, JobStatus, JobsConfig,
};
use serde_json::json;

const WAIT: Duration = Duration::from_secs(5);

fn service() -> JobService {
    JobService::in_memory(JobsConfig::default())
}

async fn echo(ctx: JobContext) -> JobOutcome {
    ctx.sleep(Duration::from_millis(30)).await?;
    ctx.report_progress(50, "echoing");
    ctx.sleep(Duration::from_millis(30)).await?;
    Ok(json!("hello"))
}

async fn wait_for_status(service: &JobService, id: asyncops_jobs::JobId, status: JobStatus) {
    // Status changes happen on the runner task; poll briefly until visible.
    for _ in 0..500 {
        if service.get_status(id).unwrap().map(|r| r.status) == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("job {id} never reached {status}");
}

#[tokio::test]
async fn echo_job_moves_through_every_state() {
    let service = service();
    let mut inputs = JobInputs::new();
    inputs.insert("text".to_string(), json!("hello"));

    let job = service
        .submit("echo", inputs.clone(), Some("tester".to_string()), echo)
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.completed_at.is_none());

    wait_for_status(&service, job.id, JobStatus::Running).await;
    let running = service.get(job.id).unwrap().unwrap();
    assert!(running.started_at.is_some());
    assert!(running.completed_at.is_none());

    let done = service.wait_for_terminal(job.id, WAIT).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.inputs, inputs);
    assert_eq!(done.initiated_by.as_deref(), Some("tester"));
    assert!(done.completed_at.is_some());

    let result = service.get_result(job.id).unwrap().unwrap();
    assert_eq!(result.result, Some(json!("hello")));
    assert!(result.error.is_none());
    assert_eq!(result.progress, 100);
}

#[tokio::test]
async fn cancel_before_work_starts() {
    // Single-threaded runtime: the runner task cannot start before we cancel.
    let service = service();
    let job = service.submit("echo", JobInputs::new(), None, echo).unwrap();

    assert!(service.cancel(job.id).unwrap());
    let status = service.get_status(job.id).unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Cancelled);
    assert!(status.is_complete);

    let done = service.wait_for_terminal(job.id, WAIT).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Cancelled);
    assert!(done.started_at.is_none());

    let result = service.get_result(job.id).unwrap().unwrap();
    assert!(result.result.is_none());
    assert!(result.error.is_none());
}

#[tokio::test]
async fn failing_work_becomes_failed_job() {
    let service = service();
    let job = service
        .submit("explode", JobInputs::new(), None, |_ctx| async move {
            Err(JobError::from(anyhow::anyhow!("boom")))
        })
        .unwrap();

    let done = service.wait_for_terminal(job.id, WAIT).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.error.as_deref(), Some("boom"));
    assert!(done.result.is_none());
    assert!(done.completed_at.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_running_job_wins_over_late_result() {
    let service = service();
    let job = service
        .submit("stubborn", JobInputs::new(), None, |ctx| async move {
            ctx.report_progress(10, "started");
            // Deliberately ignores the signal and returns a value anyway.
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(json!("should be discarded"))
        })
        .unwrap();

    wait_for_status(&service, job.id, JobStatus::Running).await;
    assert!(service.cancel(job.id).unwrap());
    assert_eq!(
        service.get_status(job.id).unwrap().unwrap().status,
        JobStatus::Cancelled
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    let done = service.get(job.id).unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Cancelled);
    assert!(done.result.is_none());
    assert!(done.error.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cooperative_work_stops_promptly_on_cancel() {
    let service = service();
    let steps = Arc::new(Mutex::new(0u32));
    let seen = steps.clone();

    let job = service
        .submit("batches", JobInputs::new(), None, move |ctx| async move {
            for batch in 1..=100 {
                ctx.sleep(Duration::from_millis(10)).await?;
                *seen.lock().unwrap() += 1;
                ctx.report_progress(batch, format!("batch {batch}/100"));
            }
            Ok(json!("all batches"))
        })
        .unwrap();

    wait_for_status(&service, job.id, JobStatus::Running).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(service.cancel(job.id).unwrap());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let after_cancel = *steps.lock().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*steps.lock().unwrap(), after_cancel, "work kept running after cancel");
    assert!(after_cancel < 100);

    let done = service.get(job.id).unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Cancelled);
    assert!(done.progress <= 100);
}

#[tokio::test]
async fn cancel_on_terminal_job_changes_nothing() {
    let service = service();
    let job = service.submit("echo", JobInputs::new(), None, echo).unwrap();
    let done = service.wait_for_terminal(job.id, WAIT).await.unwrap().unwrap();

    assert!(!service.cancel(job.id).unwrap());
    assert_eq!(service.get(job.id).unwrap().unwrap(), done);
}

#[tokio::test]
async fn list_filters_by_status_newest_first() {
    let service = service();
    let mut ids = Vec::new();
    for _ in 0..3 {
        let job = service
            .submit("wait", JobInputs::new(), None, |ctx| async move {
                ctx.sleep(Duration::from_secs(60)).await?;
                Ok(json!(null))
            })
            .unwrap();
        ids.push(job.id);
    }
    service.cancel(ids[1]).unwrap();

    let cancelled = service.list(Some(JobStatus::Cancelled), None).unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, ids[1]);

    let all = service.list(None, None).unwrap();
    let listed: Vec<_> = all.iter().map(|j| j.id).collect();
    assert_eq!(listed, vec![ids[2], ids[1], ids[0]]);

    assert_eq!(service.list(None, Some(2)).unwrap().len(), 2);
    assert!(service.list(None, Some(0)).unwrap().is_empty());

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn sweep_removes_only_old_terminal_jobs() {
    let service = service();
    let mut ids = Vec::new();
    for i in 0..3 {
        let job = service
            .submit("quick", JobInputs::new(), None, move |_ctx| async move {
                Ok(json!(i))
            })
            .unwrap();
        ids.push(job.id);
    }
    for id in &ids {
        let done = service.wait_for_terminal(*id, WAIT).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
    }

    let active = service
        .submit("active", JobInputs::new(), None, |ctx| async move {
            ctx.sleep(Duration::from_secs(60)).await?;
            Ok(json!(null))
        })
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(service.sweep(Duration::from_secs(3600)).unwrap(), 0);
    assert_eq!(service.stats().unwrap().completed, 3);

    assert_eq!(service.sweep(Duration::from_millis(5)).unwrap(), 3);
    assert_eq!(service.stats().unwrap().completed, 0);
    for id in &ids {
        assert!(service.get_status(*id).unwrap().is_none());
    }
    assert!(service.get(active.id).unwrap().is_some());

    service.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_jobs_each_reach_one_terminal_state() {
    let service = service();
    let mut ids = Vec::new();

    for i in 0..40u64 {
        let job = service
            .submit("mixed", JobInputs::new(), None, move |ctx| async move {
                for step in 0..5 {
                    ctx.sleep(Duration::from_millis(2)).await?;
                    ctx.report_progress(step * 20, format!("step {step}"));
                }
                match i % 3 {
                    0 => Ok(json!(i)),
                    1 => Err(JobError::failed(format!("job {i} failed"))),
                    _ => Err(JobError::Cancelled),
                }
            })
            .unwrap();
        ids.push(job.id);
    }

    for id in ids {
        let done = service.wait_for_terminal(id, WAIT).await.unwrap().unwrap();
        assert!(done.is_terminal());
        assert!(done.completed_at.is_some());
        match done.status {
            JobStatus::Completed => assert!(done.result.is_some() && done.error.is_none()),
            JobStatus::Failed => assert!(done.error.is_some() && done.result.is_none()),
            JobStatus::Cancelled => assert!(done.error.is_none() && done.result.is_none()),
            other => panic!("unexpected status {other}"),
        }
    }

    let stats = service.stats().unwrap();
    assert_eq!(stats.completed, 14);
    assert_eq!(stats.failed, 13);
    assert_eq!(stats.cancelled, 13);
}
