use crate::services::gateway_client::{GatewayError, GatewayHandle};
use crate::services::metrics::CheckoutMetrics;
use crate::services::payment_controller::{
    ControllerError, PaymentController, PaymentSnapshot, ViewState,
};
use crate::services::poller::{PollConfig, Poller};
use crate::utils::money::validate_amount;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};
use uuid::Uuid;

pub type SessionStorage = Arc<DashMap<Uuid, Arc<CheckoutSession>>>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("checkout session {0} not found")]
    SessionNotFound(Uuid),
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

/// One payment step of one storefront checkout.
pub struct CheckoutSession {
    pub id: Uuid,
    pub amount: u64,
    pub created_at: DateTime<Utc>,
    last_seen: Mutex<Instant>,
    controller: Arc<PaymentController>,
}

impl CheckoutSession {
    fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_seen.lock())
    }

    pub fn controller(&self) -> &Arc<PaymentController> {
        &self.controller
    }
}

pub struct OpenedSession {
    pub session_id: Uuid,
    pub snapshot: PaymentSnapshot,
    /// Set when the first order generation failed; the session stays open
    /// so the caller can retry.
    pub error: Option<GatewayError>,
}

pub struct CheckoutService {
    sessions: SessionStorage,
    gateway: GatewayHandle,
    poll_config: PollConfig,
    session_ttl: Duration,
    metrics: Arc<CheckoutMetrics>,
}

impl CheckoutService {
    pub fn new(gateway: GatewayHandle, poll_config: PollConfig, session_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            gateway,
            poll_config,
            session_ttl,
            metrics: Arc::new(CheckoutMetrics::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<CheckoutMetrics> {
        &self.metrics
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll_config
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Opens a checkout session and generates its QR order.
    pub async fn open_session(&self, amount: u64) -> Result<OpenedSession, ServiceError> {
        let amount = validate_amount(amount).ok_or(ControllerError::InvalidAmount)?;

        let controller = Arc::new(PaymentController::new(
            self.gateway.clone(),
            Poller::new(self.gateway.clone(), self.poll_config),
            self.metrics.clone(),
        ));
        let session = Arc::new(CheckoutSession {
            id: Uuid::new_v4(),
            amount,
            created_at: Utc::now(),
            last_seen: Mutex::new(Instant::now()),
            controller: controller.clone(),
        });
        let session_id = session.id;
        self.sessions.insert(session_id, session);
        info!("Opened checkout session {} for amount {}", session_id, amount);

        match controller.generate(amount).await {
            Ok(snapshot) => Ok(OpenedSession {
                session_id,
                snapshot,
                error: None,
            }),
            Err(ControllerError::Gateway(e)) => Ok(OpenedSession {
                session_id,
                snapshot: controller.snapshot(),
                error: Some(e),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn session(&self, id: Uuid) -> Result<Arc<CheckoutSession>, ServiceError> {
        let session = self
            .sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(ServiceError::SessionNotFound(id))?;
        session.touch();
        Ok(session)
    }

    pub fn snapshot(&self, id: Uuid) -> Result<PaymentSnapshot, ServiceError> {
        Ok(self.session(id)?.controller.snapshot())
    }

    /// Retries order generation; a no-op if the session already has an order.
    pub async fn generate(&self, id: Uuid) -> Result<PaymentSnapshot, ServiceError> {
        let session = self.session(id)?;
        Ok(session.controller.generate(session.amount).await?)
    }

    /// Starts (or, while one runs, ignores) a status poll for the session.
    pub fn start_check(&self, id: Uuid) -> Result<PaymentSnapshot, ServiceError> {
        let session = self.session(id)?;
        if session.controller.start_check()?.is_none() {
            debug!("Session {} check request ignored", id);
        }
        Ok(session.controller.snapshot())
    }

    /// Leaves the payment step and closes the session.
    pub fn back(&self, id: Uuid) -> Result<(), ServiceError> {
        let session = self.session(id)?;
        session.controller.back()?;
        self.close(id)
    }

    pub fn close(&self, id: Uuid) -> Result<(), ServiceError> {
        let (_, session) = self
            .sessions
            .remove(&id)
            .ok_or(ServiceError::SessionNotFound(id))?;
        session.controller.dispose();
        info!("Closed checkout session {}", id);
        Ok(())
    }

    pub fn close_all(&self) {
        let ids: Vec<Uuid> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            let _ = self.close(id);
        }
    }

    /// When the oldest open session was created, if any is open.
    pub fn oldest_session_opened_at(&self) -> Option<DateTime<Utc>> {
        self.sessions.iter().map(|entry| entry.value().created_at).min()
    }

    /// Closes sessions nobody has touched for longer than the TTL. A session
    /// with a poll in flight is never swept.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| {
                let session = entry.value();
                session.idle_for(now) > self.session_ttl
                    && session.controller.state() != ViewState::Polling
            })
            .map(|entry| *entry.key())
            .collect();

        let swept = expired
            .into_iter()
            .filter(|id| self.close(*id).is_ok())
            .count();
        if swept > 0 {
            info!("Swept {} idle checkout sessions", swept);
        }
        swept
    }

    pub async fn run_sweeper(self: Arc<Self>, every: Duration) {
        loop {
            sleep(every).await;
            self.sweep_expired();
        }
    }
}
