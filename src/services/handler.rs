use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Why a payload execution failed.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct HandlerError {
    reason: String,
}

impl HandlerError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Executes a job payload.
///
/// The queue guarantees at-least-once invocation, so implementations must
/// be idempotent: an expired lease can hand the same payload to a second
/// worker.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, payload: &str) -> Result<(), HandlerError>;
}

/// Stand-in handler: sleeps for a fixed duration, then fails iff the
/// payload is the literal string `fail`.
#[derive(Debug, Clone)]
pub struct FixedDelayHandler {
    delay: Duration,
}

impl FixedDelayHandler {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl JobHandler for FixedDelayHandler {
    async fn execute(&self, payload: &str) -> Result<(), HandlerError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if payload == "fail" {
            return Err(HandlerError::new("payload is 'fail'"));
        }

        Ok(())
    }
}
