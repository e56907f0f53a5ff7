use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::{DeadLetterJob, Job, JobStatus};

/// Errors surfaced by the job store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job with idempotency_key {key} already exists for tenant {tenant}")]
    DuplicateIdempotencyKey { tenant: String, key: String },

    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable job storage.
///
/// The store is the coordination point between the API and worker
/// processes: `lease_next_job` and `move_to_dead_letter` are atomic, and
/// the lease is the only mutual-exclusion primitive over job ownership.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new PENDING job, stamping `created_at` and `updated_at`.
    ///
    /// Returns [`StoreError::DuplicateIdempotencyKey`] when the tenant
    /// already has a job with the same key. Jobs without a key never
    /// conflict.
    async fn create_job(&self, job: Job) -> Result<Job, StoreError>;

    /// Fetch a job by id.
    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError>;

    /// Fetch the tenant's job with the given idempotency key.
    ///
    /// `None` matches jobs stored without a key.
    async fn get_job_by_idempotency_key(
        &self,
        tenant_id: &str,
        key: Option<&str>,
    ) -> Result<Option<Job>, StoreError>;

    /// All jobs in the given status, oldest first.
    async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError>;

    /// Number of RUNNING jobs owned by the tenant.
    async fn count_running_by_tenant(&self, tenant_id: &str) -> Result<i64, StoreError>;

    /// Atomically lease the oldest leasable job.
    ///
    /// A job is leasable when it is PENDING, or RUNNING with an expired
    /// lease (a crashed worker's job re-enters the pool this way). The
    /// selected row transitions to RUNNING with fresh lease timestamps in
    /// the same statement; concurrent callers never receive the same row.
    async fn lease_next_job(&self, lease_duration: Duration) -> Result<Option<Job>, StoreError>;

    /// Set a job's status and bump `updated_at`.
    async fn update_job_status(&self, id: &str, status: JobStatus) -> Result<(), StoreError>;

    /// Increment a job's retry count and bump `updated_at`.
    async fn increment_retry_count(&self, id: &str) -> Result<(), StoreError>;

    /// Move a job to the dead letter queue.
    ///
    /// Inserts the DLQ record and deletes the job row in one transaction;
    /// either both happen or neither.
    async fn move_to_dead_letter(&self, job: &Job, reason: &str) -> Result<(), StoreError>;

    /// All dead letter records, most recent failure first.
    async fn list_dead_letter_jobs(&self) -> Result<Vec<DeadLetterJob>, StoreError>;
}
