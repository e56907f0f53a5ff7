use sqlx::SqlitePool;
use std::sync::Arc;

use crate::metrics::Metrics;
use crate::services::JobService;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub jobs: Arc<JobService>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(db: SqlitePool, jobs: JobService, metrics: Arc<Metrics>) -> Self {
        Self {
            db,
            jobs: Arc::new(jobs),
            metrics,
        }
    }
}
