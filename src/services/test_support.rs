//! In-process gateway double for unit tests.

use crate::models::payment::{PaymentOrder, PaymentStatus, StatusResponse};
use crate::services::gateway_client::{GatewayError, PaymentGateway};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn unpaid() -> Result<StatusResponse, GatewayError> {
    Ok(StatusResponse {
        status: PaymentStatus::Unpaid,
    })
}

pub fn paid() -> Result<StatusResponse, GatewayError> {
    Ok(StatusResponse {
        status: PaymentStatus::Paid,
    })
}

pub fn transport_error() -> Result<StatusResponse, GatewayError> {
    Err(GatewayError::Transport("connection refused".into()))
}

pub fn order(order_id: &str, amount: u64) -> PaymentOrder {
    PaymentOrder {
        order_id: order_id.to_string(),
        amount,
        currency: "KHR".to_string(),
        qr_image: "data:image/png;base64,iVBORw0KGgo=".to_string(),
        status: PaymentStatus::Unpaid,
    }
}

/// Replays scripted responses. Once a script runs dry, orders are created
/// as `order-N` and statuses read `UNPAID`.
#[derive(Default)]
pub struct ScriptedGateway {
    orders: Mutex<VecDeque<Result<PaymentOrder, GatewayError>>>,
    statuses: Mutex<VecDeque<Result<StatusResponse, GatewayError>>>,
    create_delay: Duration,
    status_delay: Duration,
    create_calls: AtomicUsize,
    status_calls: AtomicUsize,
    requested_amounts: Mutex<Vec<u64>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(self, orders: Vec<Result<PaymentOrder, GatewayError>>) -> Self {
        *self.orders.lock() = orders.into();
        self
    }

    pub fn with_statuses(self, statuses: Vec<Result<StatusResponse, GatewayError>>) -> Self {
        *self.statuses.lock() = statuses.into();
        self
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn requested_amounts(&self) -> Vec<u64> {
        self.requested_amounts.lock().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_order(&self, amount: u64) -> Result<PaymentOrder, GatewayError> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requested_amounts.lock().push(amount);
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }

        let scripted = self.orders.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(order(&format!("order-{}", call), amount)))
    }

    async fn check_status(&self, _order_id: &str) -> Result<StatusResponse, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if !self.status_delay.is_zero() {
            tokio::time::sleep(self.status_delay).await;
        }

        let scripted = self.statuses.lock().pop_front();
        scripted.unwrap_or_else(unpaid)
    }
}
