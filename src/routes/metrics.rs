use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::metrics::MetricsSnapshot;

/// GET /metrics — process-local job counters.
pub async fn metrics_snapshot(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
