use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::checkout_service::ServiceError;
use crate::services::payment_controller::ControllerError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("diagnostics are disabled")]
    DiagnosticsDisabled,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Service(ServiceError::Controller(ControllerError::Gateway(e))) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": e.message(), "status": e.status() }),
            ),
            ApiError::Service(e) => {
                let status = match e {
                    ServiceError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                    ServiceError::Controller(ControllerError::InvalidAmount) => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    ServiceError::Controller(ControllerError::Disposed) => StatusCode::GONE,
                    ServiceError::Controller(ControllerError::Interrupted) => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    ServiceError::Controller(_) => StatusCode::CONFLICT,
                };
                (status, json!({ "error": e.to_string() }))
            }
            ApiError::DiagnosticsDisabled => {
                (StatusCode::NOT_FOUND, json!({ "error": self.to_string() }))
            }
        };

        (status, Json(body)).into_response()
    }
}
