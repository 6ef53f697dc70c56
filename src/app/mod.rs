pub mod config;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::diagnostics::DiagnosticsRegistry;
use crate::handlers::{checkout, metrics};
use crate::services::CheckoutService;

#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<CheckoutService>,
    /// `None` unless diagnostics are enabled.
    pub diagnostics: Option<Arc<DiagnosticsRegistry>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics::get_metrics))
        .route("/diagnostics", get(metrics::get_diagnostics))
        .route("/checkout/sessions", post(checkout::create_session))
        .route(
            "/checkout/sessions/:id",
            get(checkout::get_session).delete(checkout::close_session),
        )
        .route("/checkout/sessions/:id/generate", post(checkout::generate_order))
        .route("/checkout/sessions/:id/check", post(checkout::start_check))
        .route("/checkout/sessions/:id/back", post(checkout::go_back))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}
