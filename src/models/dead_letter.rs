use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A job that exhausted its retries and will not run again.
///
/// The record carries its own id; `job_id` is the id the job had while it
/// was live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterJob {
    pub id: String,
    pub job_id: String,
    pub tenant_id: String,
    pub payload: String,
    pub failure_reason: String,
    pub failed_at: DateTime<Utc>,
}
