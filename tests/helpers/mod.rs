//! Shared setup for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use jobq::app_state::AppState;
use jobq::db::{self, JobStore, SqliteStore};
use jobq::metrics::Metrics;
use jobq::models::{Job, JobStatus};
use jobq::routes::build_router;
use jobq::services::{FixedDelayHandler, JobService, RateLimiter, WorkerService};

/// A store plus metrics backed by a throwaway database file.
pub struct TestQueue {
    pub store: Arc<SqliteStore>,
    pub metrics: Arc<Metrics>,
    _db_dir: TempDir,
}

pub async fn test_queue() -> TestQueue {
    let db_dir = tempfile::tempdir().expect("failed to create temp dir");
    let pool = db::init_pool(&db_dir.path().join("jobs.db"))
        .await
        .expect("failed to open database");
    db::init_schema(&pool).await.expect("failed to init schema");

    TestQueue {
        store: Arc::new(SqliteStore::new(pool)),
        metrics: Arc::new(Metrics::new()),
        _db_dir: db_dir,
    }
}

impl TestQueue {
    /// Worker with a zero-delay handler, sharing this queue's metrics.
    pub fn worker(&self) -> WorkerService {
        WorkerService::new(
            self.store.clone(),
            self.metrics.clone(),
            Arc::new(FixedDelayHandler::new(Duration::ZERO)),
        )
    }

    pub fn service(&self, limiter: RateLimiter) -> JobService {
        JobService::new(self.store.clone(), limiter, self.metrics.clone())
    }

    /// Insert a PENDING job directly, bypassing the admission pipeline.
    pub async fn insert_pending(&self, tenant: &str, payload: &str, max_retries: i64) -> Job {
        self.store
            .create_job(pending_job(tenant, payload, max_retries))
            .await
            .expect("failed to insert job")
    }
}

pub fn pending_job(tenant: &str, payload: &str, max_retries: i64) -> Job {
    let now = chrono::Utc::now();
    Job {
        id: uuid::Uuid::new_v4().to_string(),
        tenant_id: tenant.to_string(),
        idempotency_key: None,
        payload: payload.to_string(),
        status: JobStatus::Pending,
        max_retries,
        retry_count: 0,
        leased_at: None,
        lease_expires_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn keyed_job(tenant: &str, payload: &str, key: &str) -> Job {
    let mut job = pending_job(tenant, payload, 3);
    job.idempotency_key = Some(key.to_string());
    job
}

/// Shift a job's creation time into the past to control lease ordering.
pub async fn backdate_created_at(store: &SqliteStore, id: &str, secs_ago: i64) {
    let then = chrono::Utc::now().timestamp() - secs_ago;
    sqlx::query("UPDATE jobs SET created_at = ? WHERE id = ?")
        .bind(then)
        .bind(id)
        .execute(store.pool())
        .await
        .expect("failed to backdate created_at");
}

/// Force a RUNNING job's lease into the past, as if its worker crashed.
pub async fn expire_lease(store: &SqliteStore, id: &str) {
    let then = chrono::Utc::now().timestamp() - 5;
    sqlx::query("UPDATE jobs SET lease_expires_at = ? WHERE id = ?")
        .bind(then)
        .bind(id)
        .execute(store.pool())
        .await
        .expect("failed to expire lease");
}

/// Full API server on an ephemeral port.
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub queue: TestQueue,
}

pub async fn spawn_app() -> TestApp {
    let queue = test_queue().await;
    let limiter = RateLimiter::new(5, 10);
    let service = queue.service(limiter);
    let state = AppState::new(queue.store.pool().clone(), service, queue.metrics.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("missing local addr");

    tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .await
            .expect("test server error");
    });

    TestApp {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
        queue,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn post_job(&self, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/jobs"))
            .json(body)
            .send()
            .await
            .expect("POST /jobs failed")
    }
}
