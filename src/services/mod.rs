use thiserror::Error;

use crate::db::StoreError;

pub mod handler;
pub mod jobs;
pub mod rate_limit;
pub mod worker;

pub use handler::{FixedDelayHandler, HandlerError, JobHandler};
pub use jobs::JobService;
pub use rate_limit::RateLimiter;
pub use worker::WorkerService;

/// Errors surfaced by the admission and query paths.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("job not found")]
    NotFound,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error(transparent)]
    Store(#[from] StoreError),
}
