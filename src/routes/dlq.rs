use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::models::DeadLetterJob;
use crate::routes::jobs::map_service_error;

/// GET /dlq — all permanently failed jobs, most recent first.
pub async fn list_dead_letter_jobs(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeadLetterJob>>, (StatusCode, String)> {
    let records = state
        .jobs
        .list_dead_letter_jobs()
        .await
        .map_err(map_service_error)?;

    Ok(Json(records))
}
