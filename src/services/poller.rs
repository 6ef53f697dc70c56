use crate::models::payment::PaymentStatus;
use crate::services::cancel::CancelToken;
use crate::services::gateway_client::{GatewayError, GatewayHandle};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    max_attempts: u32,
    interval: Duration,
}

impl PollConfig {
    /// `max_attempts` is clamped to at least one check.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on how long a poll can wait between its first and last check.
    pub fn window(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_INTERVAL)
    }
}

/// How a poll ended. Every call to [`Poller::poll`] resolves to exactly one.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Paid,
    /// Every attempt got an answer but none of them was `PAID`.
    Timeout,
    /// The final attempt itself failed.
    Error(GatewayError),
    Cancelled,
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Paid)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Paid => "PAID",
            PollOutcome::Timeout => "TIMEOUT",
            PollOutcome::Error(_) => "ERROR",
            PollOutcome::Cancelled => "CANCELLED",
        }
    }
}

/// Attempt bookkeeping for one running poll.
#[derive(Debug)]
pub struct PollSession {
    attempts: u32,
    max_attempts: u32,
}

impl PollSession {
    fn new(config: &PollConfig) -> Self {
        Self {
            attempts: 0,
            max_attempts: config.max_attempts,
        }
    }

    fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Checks an order's status on a fixed cadence until it is paid, the attempt
/// budget runs out, or the caller cancels.
#[derive(Clone)]
pub struct Poller {
    gateway: GatewayHandle,
    config: PollConfig,
}

impl Poller {
    pub fn new(gateway: GatewayHandle, config: PollConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Runs one poll session for `order_id`.
    ///
    /// `on_status` sees every status the gateway reports, in attempt order,
    /// and is never called once `cancel` has fired. Errors on intermediate
    /// attempts are retried after the usual interval; an error on the last
    /// attempt resolves as [`PollOutcome::Error`] instead of a timeout.
    pub async fn poll<F>(&self, order_id: &str, cancel: &CancelToken, mut on_status: F) -> PollOutcome
    where
        F: FnMut(PaymentStatus) + Send,
    {
        let mut session = PollSession::new(&self.config);

        loop {
            if cancel.is_cancelled() {
                return self.cancelled(order_id, &session);
            }

            let attempt = session.begin_attempt();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(order_id, &session),
                result = self.gateway.check_status(order_id) => result,
            };

            match result {
                Ok(response) => {
                    if cancel.is_cancelled() {
                        return self.cancelled(order_id, &session);
                    }

                    debug!(
                        "Order {} attempt {}/{}: {}",
                        order_id, attempt, self.config.max_attempts, response.status
                    );
                    let paid = response.status.is_paid();
                    on_status(response.status);

                    if paid {
                        info!("Order {} paid after {} checks", order_id, attempt);
                        return PollOutcome::Paid;
                    }
                    if session.is_exhausted() {
                        warn!("Order {} still unpaid after {} checks", order_id, attempt);
                        return PollOutcome::Timeout;
                    }
                }
                Err(e) => {
                    if session.is_exhausted() {
                        warn!("Order {} final status check failed: {}", order_id, e);
                        return PollOutcome::Error(e);
                    }
                    debug!(
                        "Order {} attempt {}/{} failed, retrying: {}",
                        order_id, attempt, self.config.max_attempts, e
                    );
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(order_id, &session),
                _ = sleep(self.config.interval) => {}
            }
        }
    }

    fn cancelled(&self, order_id: &str, session: &PollSession) -> PollOutcome {
        info!(
            "Polling for order {} cancelled after {} checks",
            order_id,
            session.attempts()
        );
        PollOutcome::Cancelled
    }
}
