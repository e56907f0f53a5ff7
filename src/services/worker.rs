use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::db::{JobStore, StoreError};
use crate::metrics::Metrics;
use crate::models::{Job, JobStatus};
use crate::services::handler::JobHandler;

pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Leases and executes jobs one at a time.
///
/// Multiple worker processes can run against the same database; lease
/// atomicity in the store keeps them from double-processing. Errors never
/// escape the loop, so one bad row cannot stall the queue.
pub struct WorkerService {
    store: Arc<dyn JobStore>,
    metrics: Arc<Metrics>,
    handler: Arc<dyn JobHandler>,
    lease_duration: Duration,
}

impl WorkerService {
    pub fn new(
        store: Arc<dyn JobStore>,
        metrics: Arc<Metrics>,
        handler: Arc<dyn JobHandler>,
    ) -> Self {
        Self {
            store,
            metrics,
            handler,
            lease_duration: DEFAULT_LEASE_DURATION,
        }
    }

    /// Override the lease horizon. It must comfortably exceed the expected
    /// handler duration.
    pub fn with_lease_duration(mut self, lease_duration: Duration) -> Self {
        self.lease_duration = lease_duration;
        self
    }

    /// Poll for jobs until cancelled.
    ///
    /// Cancellation is observed at iteration boundaries; an in-flight
    /// handler finishes its current job first.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.poll_once().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(POLL_INTERVAL) => {}
                    }
                }
                Err(error) => {
                    tracing::error!(%error, "failed to lease job, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        tracing::info!("worker loop stopped");
    }

    /// Lease and process at most one job.
    ///
    /// Returns `Ok(true)` when a job was processed, `Ok(false)` when the
    /// queue had nothing leasable.
    pub async fn poll_once(&self) -> Result<bool, StoreError> {
        let Some(job) = self.store.lease_next_job(self.lease_duration).await? else {
            return Ok(false);
        };

        tracing::info!(job_id = %job.id, tenant_id = %job.tenant_id, "job leased");
        self.process_job(&job).await;

        Ok(true)
    }

    async fn process_job(&self, job: &Job) {
        // A panicking handler counts as a failure; it must not take the
        // worker loop down with it.
        let outcome = AssertUnwindSafe(self.handler.execute(&job.payload))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                if let Err(error) = self.store.update_job_status(&job.id, JobStatus::Done).await {
                    tracing::error!(job_id = %job.id, %error, "failed to mark job DONE");
                    return;
                }
                self.metrics.incr_completed_jobs();
                tracing::info!(job_id = %job.id, "job completed");
            }
            Ok(Err(failure)) => self.handle_failure(job, failure.reason()).await,
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                self.handle_failure(job, &reason).await;
            }
        }
    }

    async fn handle_failure(&self, job: &Job, reason: &str) {
        if job.retry_count < job.max_retries {
            if let Err(error) = self.store.increment_retry_count(&job.id).await {
                tracing::error!(job_id = %job.id, %error, "failed to increment retry count");
                return;
            }
            // Back to PENDING makes the row immediately leasable again.
            if let Err(error) = self
                .store
                .update_job_status(&job.id, JobStatus::Pending)
                .await
            {
                tracing::error!(job_id = %job.id, %error, "failed to reset job to PENDING");
                return;
            }
            self.metrics.incr_retried_jobs();
            tracing::warn!(
                job_id = %job.id,
                attempt = job.retry_count + 1,
                max_retries = job.max_retries,
                reason,
                "job failed, retrying"
            );
            return;
        }

        let dlq_reason = format!("max retries exceeded: {reason}");
        if let Err(error) = self.store.move_to_dead_letter(job, &dlq_reason).await {
            tracing::error!(job_id = %job.id, %error, "failed to move job to dead letter queue");
            return;
        }
        self.metrics.incr_failed_jobs();
        tracing::warn!(job_id = %job.id, reason, "job moved to dead letter queue");
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}
