//! Worker outcome policy: success, bounded retries, dead-lettering, and
//! recovery after a lost lease.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobq::db::JobStore;
use jobq::models::JobStatus;
use jobq::services::{HandlerError, JobHandler, WorkerService};
use tokio_util::sync::CancellationToken;

use helpers::{expire_lease, test_queue};

const LEASE: Duration = Duration::from_secs(30);

#[tokio::test]
async fn poll_once_reports_idle_queue() {
    let queue = test_queue().await;
    let worker = queue.worker();

    assert!(!worker.poll_once().await.unwrap());
}

#[tokio::test]
async fn successful_job_is_marked_done() {
    let queue = test_queue().await;
    let worker = queue.worker();

    let created = queue.insert_pending("t1", "hello", 3).await;
    assert!(worker.poll_once().await.unwrap());

    let done = queue.store.get_job(&created.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Done);
    assert_eq!(done.retry_count, 0);
    assert_eq!(queue.metrics.snapshot().completed_jobs, 1);
}

#[tokio::test]
async fn failed_job_is_reset_for_retry() {
    let queue = test_queue().await;
    let worker = queue.worker();

    let created = queue.insert_pending("t1", "fail", 2).await;
    assert!(worker.poll_once().await.unwrap());

    let retried = queue.store.get_job(&created.id).await.unwrap().unwrap();
    assert_eq!(retried.status, JobStatus::Pending);
    assert_eq!(retried.retry_count, 1);

    let snapshot = queue.metrics.snapshot();
    assert_eq!(snapshot.retried_jobs, 1);
    assert_eq!(snapshot.failed_jobs, 0);
}

#[tokio::test]
async fn zero_max_retries_goes_straight_to_dlq() {
    let queue = test_queue().await;
    let worker = queue.worker();

    let created = queue.insert_pending("t1", "fail", 0).await;
    assert!(worker.poll_once().await.unwrap());

    assert!(queue.store.get_job(&created.id).await.unwrap().is_none());

    let dlq = queue.store.list_dead_letter_jobs().await.unwrap();
    assert_eq!(dlq.len(), 1);
    assert_eq!(dlq[0].job_id, created.id);
    assert!(dlq[0].failure_reason.starts_with("max retries exceeded:"));

    let snapshot = queue.metrics.snapshot();
    assert_eq!(snapshot.retried_jobs, 0);
    assert_eq!(snapshot.failed_jobs, 1);
}

#[tokio::test]
async fn retries_exhaust_into_dead_letter_queue() {
    let queue = test_queue().await;
    let worker = queue.worker();

    let created = queue.insert_pending("t1", "fail", 2).await;

    // Attempts one and two fail and reset the job to PENDING.
    for expected_retry in 1..=2 {
        assert!(worker.poll_once().await.unwrap());
        let job = queue.store.get_job(&created.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, expected_retry);
    }

    // The third failure exhausts the budget.
    assert!(worker.poll_once().await.unwrap());
    assert!(queue.store.get_job(&created.id).await.unwrap().is_none());

    let dlq = queue.store.list_dead_letter_jobs().await.unwrap();
    assert_eq!(dlq.len(), 1);
    assert_eq!(dlq[0].job_id, created.id);
    assert_eq!(
        dlq[0].failure_reason,
        "max retries exceeded: payload is 'fail'"
    );

    let snapshot = queue.metrics.snapshot();
    assert_eq!(snapshot.retried_jobs, 2);
    assert_eq!(snapshot.failed_jobs, 1);
    assert_eq!(snapshot.completed_jobs, 0);
}

#[tokio::test]
async fn job_abandoned_by_crashed_worker_is_recovered() {
    let queue = test_queue().await;
    let worker = queue.worker();

    let created = queue.insert_pending("t1", "hello", 3).await;

    // Another worker leased the job and died without writing an outcome.
    queue.store.lease_next_job(LEASE).await.unwrap().unwrap();
    expire_lease(&queue.store, &created.id).await;

    assert!(worker.poll_once().await.unwrap());

    let done = queue.store.get_job(&created.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Done);
    assert_eq!(done.retry_count, 0);
}

#[tokio::test]
async fn configured_lease_duration_is_applied() {
    let queue = test_queue().await;
    let worker = queue.worker().with_lease_duration(Duration::from_secs(60));

    // A failing job with retries left stays in the table, keeping the
    // lease timestamps from its attempt visible.
    let created = queue.insert_pending("t1", "fail", 3).await;
    assert!(worker.poll_once().await.unwrap());

    let job = queue.store.get_job(&created.id).await.unwrap().unwrap();
    let leased_at = job.leased_at.expect("leased_at should be set");
    let expires_at = job
        .lease_expires_at
        .expect("lease_expires_at should be set");
    assert_eq!((expires_at - leased_at).num_seconds(), 60);
}

struct PanickingHandler;

#[async_trait]
impl JobHandler for PanickingHandler {
    async fn execute(&self, _payload: &str) -> Result<(), HandlerError> {
        panic!("boom");
    }
}

#[tokio::test]
async fn panicking_handler_counts_as_failure() {
    let queue = test_queue().await;
    let worker = WorkerService::new(
        queue.store.clone(),
        queue.metrics.clone(),
        Arc::new(PanickingHandler),
    );

    let created = queue.insert_pending("t1", "anything", 0).await;
    assert!(worker.poll_once().await.unwrap());

    assert!(queue.store.get_job(&created.id).await.unwrap().is_none());

    let dlq = queue.store.list_dead_letter_jobs().await.unwrap();
    assert_eq!(dlq.len(), 1);
    assert_eq!(
        dlq[0].failure_reason,
        "max retries exceeded: handler panicked: boom"
    );
    assert_eq!(queue.metrics.snapshot().failed_jobs, 1);
}

#[tokio::test]
async fn run_exits_on_cancellation() {
    let queue = test_queue().await;
    let worker = queue.worker();

    let cancel = CancellationToken::new();
    let run_token = cancel.clone();
    let handle = tokio::spawn(async move { worker.run(run_token).await });

    // Let the loop reach its idle sleep before cancelling.
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker did not stop after cancellation")
        .unwrap();
}

#[tokio::test]
async fn run_drains_pending_jobs() {
    let queue = test_queue().await;
    let worker = queue.worker();

    for i in 0..3 {
        queue.insert_pending("t1", &format!("job {i}"), 3).await;
    }

    let cancel = CancellationToken::new();
    let run_token = cancel.clone();
    let handle = tokio::spawn(async move { worker.run(run_token).await });

    // Three instant jobs drain well before the first idle sleep ends.
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if queue.metrics.snapshot().completed_jobs == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("jobs were not drained in time");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker did not stop")
        .unwrap();

    let done = queue
        .store
        .list_jobs_by_status(JobStatus::Done)
        .await
        .unwrap();
    assert_eq!(done.len(), 3);
}
