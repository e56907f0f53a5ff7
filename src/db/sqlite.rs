use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::time::Duration;

use crate::db::store::{JobStore, StoreError};
use crate::models::{DeadLetterJob, Job, JobStatus};

/// SQLite-backed [`JobStore`].
///
/// Every mutation is a single statement or a single transaction, so the
/// database file itself provides the cross-process atomicity the lease
/// protocol needs.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

const JOB_COLUMNS: &str = "id, tenant_id, idempotency_key, payload, status, max_retries, \
     retry_count, leased_at, lease_expires_at, created_at, updated_at";

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Raw row shape; timestamps are integer epoch seconds.
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    tenant_id: String,
    idempotency_key: Option<String>,
    payload: String,
    status: String,
    max_retries: i64,
    retry_count: i64,
    leased_at: Option<i64>,
    lease_expires_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl JobRow {
    fn into_job(self) -> Result<Job, StoreError> {
        let status: JobStatus = self
            .status
            .parse()
            .map_err(|e| StoreError::CorruptRow(format!("job {}: {e}", self.id)))?;

        Ok(Job {
            id: self.id,
            tenant_id: self.tenant_id,
            idempotency_key: self.idempotency_key,
            payload: self.payload,
            status,
            max_retries: self.max_retries,
            retry_count: self.retry_count,
            leased_at: self.leased_at.map(from_epoch),
            lease_expires_at: self.lease_expires_at.map(from_epoch),
            created_at: from_epoch(self.created_at),
            updated_at: from_epoch(self.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DeadLetterRow {
    id: String,
    job_id: String,
    tenant_id: String,
    payload: String,
    failure_reason: String,
    failed_at: i64,
}

impl DeadLetterRow {
    fn into_record(self) -> DeadLetterJob {
        DeadLetterJob {
            id: self.id,
            job_id: self.job_id,
            tenant_id: self.tenant_id,
            payload: self.payload,
            failure_reason: self.failure_reason,
            failed_at: from_epoch(self.failed_at),
        }
    }
}

fn from_epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Current time truncated to whole seconds, matching the stored precision.
fn now_epoch() -> (DateTime<Utc>, i64) {
    let secs = Utc::now().timestamp();
    (from_epoch(secs), secs)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn create_job(&self, mut job: Job) -> Result<Job, StoreError> {
        let (now, now_secs) = now_epoch();
        job.created_at = now;
        job.updated_at = now;

        let result = sqlx::query(
            "INSERT INTO jobs (id, tenant_id, idempotency_key, payload, status, max_retries, \
             retry_count, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id)
        .bind(&job.tenant_id)
        .bind(&job.idempotency_key)
        .bind(&job.payload)
        .bind(job.status.as_str())
        .bind(job.max_retries)
        .bind(job.retry_count)
        .bind(now_secs)
        .bind(now_secs)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(job),
            Err(err) if is_unique_violation(&err) => {
                // NULL keys admit duplicates, so a violation implies a
                // concrete key collided.
                match job.idempotency_key {
                    Some(key) => Err(StoreError::DuplicateIdempotencyKey {
                        tenant: job.tenant_id,
                        key,
                    }),
                    None => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobRow::into_job).transpose()
    }

    async fn get_job_by_idempotency_key(
        &self,
        tenant_id: &str,
        key: Option<&str>,
    ) -> Result<Option<Job>, StoreError> {
        let row = match key {
            Some(key) => {
                sqlx::query_as::<_, JobRow>(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE tenant_id = ? AND idempotency_key = ?"
                ))
                .bind(tenant_id)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, JobRow>(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs \
                     WHERE tenant_id = ? AND idempotency_key IS NULL"
                ))
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(JobRow::into_job).transpose()
    }

    async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status = ? ORDER BY created_at ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn count_running_by_tenant(&self, tenant_id: &str) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM jobs WHERE tenant_id = ? AND status = 'RUNNING'",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn lease_next_job(&self, lease_duration: Duration) -> Result<Option<Job>, StoreError> {
        let (_, now_secs) = now_epoch();
        let expires_secs = now_secs + lease_duration.as_secs() as i64;

        // Selection and transition happen in one statement, so SQLite's
        // write serialization guarantees no two callers claim the same row.
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "UPDATE jobs \
             SET status = 'RUNNING', leased_at = ?1, lease_expires_at = ?2, updated_at = ?1 \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE status = 'PENDING' \
                    OR (status = 'RUNNING' AND lease_expires_at < ?1) \
                 ORDER BY created_at ASC, id ASC \
                 LIMIT 1 \
             ) \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(now_secs)
        .bind(expires_secs)
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobRow::into_job).transpose()
    }

    async fn update_job_status(&self, id: &str, status: JobStatus) -> Result<(), StoreError> {
        let (_, now_secs) = now_epoch();
        sqlx::query("UPDATE jobs SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now_secs)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn increment_retry_count(&self, id: &str) -> Result<(), StoreError> {
        let (_, now_secs) = now_epoch();
        sqlx::query("UPDATE jobs SET retry_count = retry_count + 1, updated_at = ? WHERE id = ?")
            .bind(now_secs)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn move_to_dead_letter(&self, job: &Job, reason: &str) -> Result<(), StoreError> {
        let (_, now_secs) = now_epoch();
        let dlq_id = format!("dlq_{}_{}", job.id, now_secs);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO dead_letter_jobs (id, job_id, tenant_id, payload, failure_reason, \
             failed_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&dlq_id)
        .bind(&job.id)
        .bind(&job.tenant_id)
        .bind(&job.payload)
        .bind(reason)
        .bind(now_secs)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(&job.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_dead_letter_jobs(&self) -> Result<Vec<DeadLetterJob>, StoreError> {
        let rows = sqlx::query_as::<_, DeadLetterRow>(
            "SELECT id, job_id, tenant_id, payload, failure_reason, failed_at \
             FROM dead_letter_jobs ORDER BY failed_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DeadLetterRow::into_record).collect())
    }
}
