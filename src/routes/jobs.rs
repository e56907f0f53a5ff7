use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::db::StoreError;
use crate::models::{CreateJobRequest, Job, JobStatus};
use crate::services::ServiceError;

/// POST /jobs — admit a new job for a tenant.
pub async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), (StatusCode, String)> {
    if req.tenant_id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "tenant_id is required".to_string()));
    }
    if req.payload.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "payload is required".to_string()));
    }
    if req.max_retries.is_some_and(|n| n < 0) {
        return Err((
            StatusCode::BAD_REQUEST,
            "max_retries must not be negative".to_string(),
        ));
    }

    let job = state.jobs.create_job(req).await.map_err(map_service_error)?;

    // A replayed idempotency key also lands here: the existing job comes
    // back with 201 so submitters cannot distinguish the retry.
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /jobs/{id} — fetch a single job.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, (StatusCode, String)> {
    if id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "job id is required".to_string()));
    }

    let job = state.jobs.get_job(&id).await.map_err(map_service_error)?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    status: Option<String>,
}

/// GET /jobs?status=X — list jobs in a given status, oldest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<Job>>, (StatusCode, String)> {
    let status = query.status.ok_or((
        StatusCode::BAD_REQUEST,
        "status query parameter is required".to_string(),
    ))?;

    let status: JobStatus = status
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "invalid status".to_string()))?;

    let jobs = state
        .jobs
        .list_jobs_by_status(status)
        .await
        .map_err(map_service_error)?;

    Ok(Json(jobs))
}

/// Translate service errors into HTTP responses.
pub(crate) fn map_service_error(err: ServiceError) -> (StatusCode, String) {
    match err {
        ServiceError::NotFound => (StatusCode::NOT_FOUND, "job not found".to_string()),
        ServiceError::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            "rate limit exceeded".to_string(),
        ),
        ServiceError::Store(StoreError::DuplicateIdempotencyKey { .. }) => (
            StatusCode::CONFLICT,
            "job creation failed: duplicate idempotency key".to_string(),
        ),
        ServiceError::Store(error) => {
            tracing::error!(%error, "store error while handling request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal storage error".to_string(),
            )
        }
    }
}
