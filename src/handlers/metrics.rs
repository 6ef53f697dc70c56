use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::handlers::error::ApiError;

pub async fn get_metrics(State(state): State<AppState>) -> Json<Value> {
    let metrics = state.checkout.metrics();
    let poll = state.checkout.poll_config();

    Json(json!({
        "open_sessions": state.checkout.session_count(),
        "counters": metrics.snapshot(),
        "conversion_rate": metrics.conversion_rate(),
        "polling": {
            "max_attempts": poll.max_attempts(),
            "interval_ms": poll.interval().as_millis() as u64,
        }
    }))
}

pub async fn get_diagnostics(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let registry = state.diagnostics.as_ref().ok_or(ApiError::DiagnosticsDisabled)?;
    let reports = registry.run_all().await;
    let healthy = reports.iter().all(|r| r.healthy);

    Ok(Json(json!({ "healthy": healthy, "probes": reports })))
}
