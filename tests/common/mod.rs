#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct RecordedCreate {
    pub body: Value,
    pub content_type: Option<String>,
    pub accept: Option<String>,
}

#[derive(Default)]
pub struct GatewayLog {
    pub creates: Mutex<Vec<RecordedCreate>>,
    pub status_checks: Mutex<Vec<String>>,
    statuses: Mutex<VecDeque<&'static str>>,
    create_failure: Mutex<Option<(u16, String)>>,
    malformed_status: Mutex<bool>,
}

/// Stand-in QR payment gateway served from an ephemeral local port.
pub struct FakeGateway {
    pub addr: SocketAddr,
    pub log: Arc<GatewayLog>,
}

impl FakeGateway {
    pub async fn start() -> Self {
        let log = Arc::new(GatewayLog::default());
        let app = Router::new()
            .route("/api/orders", post(create_order))
            .route("/api/orders/:id/status", get(order_status))
            .with_state(log.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, log }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn script_statuses(&self, statuses: &[&'static str]) {
        self.log.statuses.lock().extend(statuses.iter().copied());
    }

    pub fn fail_creates(&self, status: u16, body: &str) {
        *self.log.create_failure.lock() = Some((status, body.to_string()));
    }

    pub fn send_malformed_status(&self) {
        *self.log.malformed_status.lock() = true;
    }

    pub fn creates(&self) -> Vec<RecordedCreate> {
        self.log.creates.lock().clone()
    }

    pub fn status_checks(&self) -> Vec<String> {
        self.log.status_checks.lock().clone()
    }
}

/// A base URL where nothing is listening.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api", addr)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn create_order(
    State(log): State<Arc<GatewayLog>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    log.creates.lock().push(RecordedCreate {
        body: body.clone(),
        content_type: header(&headers, "content-type"),
        accept: header(&headers, "accept"),
    });

    if let Some((status, message)) = log.create_failure.lock().clone() {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, message).into_response();
    }

    let count = log.creates.lock().len();
    let order_id = if count == 1 {
        "abc123".to_string()
    } else {
        format!("abc123-{}", count)
    };

    Json(json!({
        "order_id": order_id,
        "amount": body["amount"],
        "currency": "KHR",
        "qr_image": "data:image/png;base64,iVBORw0KGgo=",
        "status": "UNPAID",
    }))
    .into_response()
}

async fn order_status(State(log): State<Arc<GatewayLog>>, Path(id): Path<String>) -> Response {
    log.status_checks.lock().push(id);

    if *log.malformed_status.lock() {
        return (StatusCode::OK, "<html>maintenance</html>").into_response();
    }

    let status = log.statuses.lock().pop_front().unwrap_or("UNPAID");
    Json(json!({ "status": status })).into_response()
}
