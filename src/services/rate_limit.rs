use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::services::ServiceError;

pub const DEFAULT_MAX_CONCURRENT_RUNNING: i64 = 5;
pub const DEFAULT_MAX_SUBMISSIONS_PER_MINUTE: u32 = 10;

const SUBMISSION_WINDOW: Duration = Duration::from_secs(60);

/// Per-tenant admission control.
///
/// In-memory and per-process: each API node enforces its own view of the
/// limits. Submission windows are fixed, not rolling; the first admission
/// starts the clock and the slot resets when the window elapses.
#[derive(Debug)]
pub struct RateLimiter {
    max_concurrent_running: i64,
    max_submissions_per_minute: u32,
    window_length: Duration,
    windows: Mutex<HashMap<String, SubmissionWindow>>,
}

#[derive(Debug)]
struct SubmissionWindow {
    count: u32,
    window_end: Instant,
}

impl RateLimiter {
    pub fn new(max_concurrent_running: i64, max_submissions_per_minute: u32) -> Self {
        Self::with_window(
            max_concurrent_running,
            max_submissions_per_minute,
            SUBMISSION_WINDOW,
        )
    }

    pub(crate) fn with_window(
        max_concurrent_running: i64,
        max_submissions_per_minute: u32,
        window_length: Duration,
    ) -> Self {
        Self {
            max_concurrent_running,
            max_submissions_per_minute,
            window_length,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count this submission against the tenant's current window.
    ///
    /// A call landing exactly at window expiry opens the next window.
    pub fn check_submission_rate(&self, tenant_id: &str) -> Result<(), ServiceError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");

        match windows.get_mut(tenant_id) {
            Some(window) if now < window.window_end => {
                if window.count >= self.max_submissions_per_minute {
                    return Err(ServiceError::RateLimited);
                }
                window.count += 1;
                Ok(())
            }
            _ => {
                windows.insert(
                    tenant_id.to_string(),
                    SubmissionWindow {
                        count: 1,
                        window_end: now + self.window_length,
                    },
                );
                Ok(())
            }
        }
    }

    /// Reject when the tenant is already at the concurrent-running cap.
    ///
    /// `running_count` comes from the store; the limiter holds no state
    /// for this check.
    pub fn check_concurrent(&self, _tenant_id: &str, running_count: i64) -> Result<(), ServiceError> {
        if running_count >= self.max_concurrent_running {
            return Err(ServiceError::RateLimited);
        }
        Ok(())
    }
}
