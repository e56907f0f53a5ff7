use std::sync::Arc;
use uuid::Uuid;

use crate::db::{JobStore, StoreError};
use crate::metrics::Metrics;
use crate::models::{CreateJobRequest, DeadLetterJob, Job, JobStatus};
use crate::services::{RateLimiter, ServiceError};

pub const DEFAULT_MAX_RETRIES: i64 = 3;

/// Admission pipeline and job queries.
pub struct JobService {
    store: Arc<dyn JobStore>,
    limiter: RateLimiter,
    metrics: Arc<Metrics>,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>, limiter: RateLimiter, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            limiter,
            metrics,
        }
    }

    /// Admit a submission.
    ///
    /// Order matters: the submission-rate check runs before the
    /// idempotency lookup, and a replayed key returns the existing job
    /// without touching the store again or counting toward `total_jobs`.
    pub async fn create_job(&self, req: CreateJobRequest) -> Result<Job, ServiceError> {
        self.limiter.check_submission_rate(&req.tenant_id)?;

        // An empty key means "no key"; only concrete keys deduplicate.
        let idempotency_key = req.idempotency_key.filter(|key| !key.is_empty());

        if let Some(key) = idempotency_key.as_deref() {
            if let Some(existing) = self
                .store
                .get_job_by_idempotency_key(&req.tenant_id, Some(key))
                .await?
            {
                tracing::info!(
                    job_id = %existing.id,
                    idempotency_key = key,
                    "duplicate submission, returning existing job"
                );
                return Ok(existing);
            }
        }

        let running = self.store.count_running_by_tenant(&req.tenant_id).await?;
        self.limiter.check_concurrent(&req.tenant_id, running)?;

        let now = chrono::Utc::now();
        let job = Job {
            id: Uuid::new_v4().to_string(),
            tenant_id: req.tenant_id,
            idempotency_key,
            payload: req.payload,
            status: JobStatus::Pending,
            max_retries: req.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_count: 0,
            leased_at: None,
            lease_expires_at: None,
            created_at: now,
            updated_at: now,
        };

        let job = match self.store.create_job(job).await {
            Ok(job) => job,
            Err(StoreError::DuplicateIdempotencyKey { tenant, key }) => {
                // Lost a race with a concurrent submitter; the winner's
                // row is authoritative.
                match self
                    .store
                    .get_job_by_idempotency_key(&tenant, Some(&key))
                    .await?
                {
                    Some(existing) => {
                        tracing::info!(
                            job_id = %existing.id,
                            idempotency_key = %key,
                            "duplicate submission race, returning existing job"
                        );
                        return Ok(existing);
                    }
                    None => {
                        return Err(StoreError::DuplicateIdempotencyKey { tenant, key }.into())
                    }
                }
            }
            Err(err) => return Err(err.into()),
        };

        self.metrics.incr_total_jobs();
        tracing::info!(job_id = %job.id, tenant_id = %job.tenant_id, "job submitted");

        Ok(job)
    }

    pub async fn get_job(&self, id: &str) -> Result<Job, ServiceError> {
        self.store.get_job(id).await?.ok_or(ServiceError::NotFound)
    }

    pub async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, ServiceError> {
        Ok(self.store.list_jobs_by_status(status).await?)
    }

    pub async fn list_dead_letter_jobs(&self) -> Result<Vec<DeadLetterJob>, ServiceError> {
        Ok(self.store.list_dead_letter_jobs().await?)
    }
}
