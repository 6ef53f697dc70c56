use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::handlers::error::ApiError;
use crate::services::payment_controller::PaymentSnapshot;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub amount: u64,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    info!("Received checkout request for amount {}", request.amount);

    let opened = state.checkout.open_session(request.amount).await?;
    match opened.error {
        None => Ok((
            StatusCode::CREATED,
            Json(json!({
                "session_id": opened.session_id,
                "snapshot": opened.snapshot,
            })),
        )),
        Some(e) => {
            warn!("Session {} opened without an order: {}", opened.session_id, e);
            Ok((
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "session_id": opened.session_id,
                    "error": { "message": e.message(), "status": e.status() },
                    "snapshot": opened.snapshot,
                })),
            ))
        }
    }
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentSnapshot>, ApiError> {
    Ok(Json(state.checkout.snapshot(id)?))
}

pub async fn generate_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentSnapshot>, ApiError> {
    Ok(Json(state.checkout.generate(id).await?))
}

pub async fn start_check(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<PaymentSnapshot>), ApiError> {
    let snapshot = state.checkout.start_check(id)?;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

pub async fn go_back(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.checkout.back(id)?;
    Ok(Json(json!({ "session_id": id, "closed": true })))
}

pub async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.checkout.close(id)?;
    Ok(StatusCode::NO_CONTENT)
}
