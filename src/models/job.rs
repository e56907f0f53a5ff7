use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// State of a job in the queue.
///
/// FAILED is transient between attempts; a permanently failed job is
/// removed from the jobs table and recorded in the dead letter queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = InvalidJobStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "DONE" => Ok(JobStatus::Done),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(InvalidJobStatus(other.to_string())),
        }
    }
}

/// Error returned when parsing an unknown job status string.
#[derive(Debug, thiserror::Error)]
#[error("invalid job status: {0}")]
pub struct InvalidJobStatus(pub String);

/// A job owned by a tenant.
///
/// Lease timestamps are set only while the job is RUNNING.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub tenant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub payload: String,
    pub status: JobStatus,
    pub max_retries: i64,
    pub retry_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leased_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of POST /jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobRequest {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub max_retries: Option<i64>,
}
