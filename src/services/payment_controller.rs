use crate::models::payment::{PaymentOrder, PaymentStatus};
use crate::services::cancel::CancelToken;
use crate::services::gateway_client::{GatewayError, GatewayHandle};
use crate::services::metrics::CheckoutMetrics;
use crate::services::poller::{PollOutcome, Poller};
use crate::utils::money::{format_amount, validate_amount};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("amount must be positive")]
    InvalidAmount,
    #[error("no payment order has been generated yet")]
    NoOrder,
    #[error("cannot leave while the payment is being checked")]
    BackWhilePolling,
    #[error("checkout session has been closed")]
    Disposed,
    #[error("order generation was interrupted")]
    Interrupted,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewState {
    NoOrder,
    Generating,
    GenerationFailed,
    AwaitingScan,
    Polling,
    Confirmed,
    TimedOut,
    PollFailed,
}

impl ViewState {
    fn can_generate(self) -> bool {
        matches!(self, ViewState::NoOrder | ViewState::GenerationFailed)
    }

    fn can_check(self) -> bool {
        matches!(
            self,
            ViewState::AwaitingScan | ViewState::TimedOut | ViewState::PollFailed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub message: String,
    pub status: Option<u16>,
}

impl From<&GatewayError> for ErrorInfo {
    fn from(e: &GatewayError) -> Self {
        Self {
            message: e.message(),
            status: Some(e.status()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AvailableActions {
    pub generate: bool,
    pub check: bool,
    pub back: bool,
}

/// Everything a checkout page needs to render the payment step.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSnapshot {
    pub state: ViewState,
    pub order: Option<PaymentOrder>,
    pub display_amount: Option<String>,
    pub last_status: Option<PaymentStatus>,
    pub error: Option<ErrorInfo>,
    pub actions: AvailableActions,
}

#[derive(Debug)]
struct ViewModel {
    state: ViewState,
    order: Option<PaymentOrder>,
    last_status: Option<PaymentStatus>,
    error: Option<ErrorInfo>,
}

/// Drives the QR payment step of one checkout: generates at most one order,
/// polls it on request, and refuses to be left mid-poll.
///
/// The lock is never held across an `.await`; the `Generating` and `Polling`
/// states are what keep duplicate triggers out while I/O is in flight.
pub struct PaymentController {
    model: Mutex<ViewModel>,
    gateway: GatewayHandle,
    poller: Poller,
    cancel: CancelToken,
    metrics: Arc<CheckoutMetrics>,
}

impl PaymentController {
    pub fn new(gateway: GatewayHandle, poller: Poller, metrics: Arc<CheckoutMetrics>) -> Self {
        Self {
            model: Mutex::new(ViewModel {
                state: ViewState::NoOrder,
                order: None,
                last_status: None,
                error: None,
            }),
            gateway,
            poller,
            cancel: CancelToken::new(),
            metrics,
        }
    }

    pub fn state(&self) -> ViewState {
        self.model.lock().state
    }

    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Creates the payment order for this checkout.
    ///
    /// No-op once an order exists or while one is being created. On gateway
    /// failure the view moves to `GenerationFailed`, from which it can retry.
    /// The gateway call runs on its own task, so a caller that stops waiting
    /// does not strand the view in `Generating`.
    pub async fn generate(self: &Arc<Self>, amount: u64) -> Result<PaymentSnapshot, ControllerError> {
        let amount = validate_amount(amount).ok_or(ControllerError::InvalidAmount)?;
        if self.is_disposed() {
            return Err(ControllerError::Disposed);
        }

        {
            let mut model = self.model.lock();
            if !model.state.can_generate() {
                debug!("Ignoring generate request in state {:?}", model.state);
                return Ok(self.snapshot_of(&model));
            }
            model.state = ViewState::Generating;
            model.error = None;
        }

        let controller = Arc::clone(self);
        let creation = tokio::spawn(async move {
            let result = controller.gateway.create_order(amount).await;
            controller.finish_generation(result)
        });

        match creation.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Order generation task failed: {}", e);
                let mut model = self.model.lock();
                if model.state == ViewState::Generating {
                    model.state = ViewState::GenerationFailed;
                    model.error = Some(ErrorInfo {
                        message: ControllerError::Interrupted.to_string(),
                        status: None,
                    });
                }
                Err(ControllerError::Interrupted)
            }
        }
    }

    fn finish_generation(
        &self,
        result: Result<PaymentOrder, GatewayError>,
    ) -> Result<PaymentSnapshot, ControllerError> {
        let mut model = self.model.lock();
        if self.is_disposed() {
            return Err(ControllerError::Disposed);
        }

        match result {
            Ok(order) => {
                info!("QR payment order {} ready", order.order_id);
                self.metrics.increment_orders_created();
                model.last_status = Some(order.status.clone());
                model.order = Some(order);
                model.state = ViewState::AwaitingScan;
                Ok(self.snapshot_of(&model))
            }
            Err(e) => {
                warn!("Could not generate QR payment: {}", e);
                self.metrics.increment_order_failures();
                model.error = Some(ErrorInfo::from(&e));
                model.state = ViewState::GenerationFailed;
                Err(ControllerError::Gateway(e))
            }
        }
    }

    /// Starts polling the gateway for the stored order.
    ///
    /// Returns `Ok(None)` when a poll is already running or the payment is
    /// confirmed. Retrying after a timeout or poll error reuses the same order.
    pub fn start_check(self: &Arc<Self>) -> Result<Option<JoinHandle<PollOutcome>>, ControllerError> {
        if self.is_disposed() {
            return Err(ControllerError::Disposed);
        }

        let order_id = {
            let mut model = self.model.lock();
            match model.state {
                ViewState::Polling | ViewState::Confirmed => {
                    debug!("Ignoring check request in state {:?}", model.state);
                    return Ok(None);
                }
                state if state.can_check() => {}
                _ => return Err(ControllerError::NoOrder),
            }
            let order_id = match model.order.as_ref() {
                Some(order) => order.order_id.clone(),
                None => return Err(ControllerError::NoOrder),
            };
            model.state = ViewState::Polling;
            model.error = None;
            order_id
        };

        self.metrics.increment_polls_started();
        let controller = Arc::clone(self);

        Ok(Some(tokio::spawn(async move {
            let outcome = controller
                .poller
                .poll(&order_id, &controller.cancel, |status| {
                    controller.on_status_change(status)
                })
                .await;
            controller.finish_poll(&outcome);
            outcome
        })))
    }

    /// Records a status read from the gateway. `PAID` confirms the checkout.
    pub fn on_status_change(&self, status: PaymentStatus) {
        if self.is_disposed() {
            return;
        }

        let mut model = self.model.lock();
        if let Some(order) = model.order.as_mut() {
            order.status = status.clone();
        }
        if status.is_paid() && model.state != ViewState::Confirmed {
            model.state = ViewState::Confirmed;
            self.metrics.increment_paid();
        }
        model.last_status = Some(status);
    }

    /// Leaves the payment step. Refused while a poll is running.
    pub fn back(&self) -> Result<(), ControllerError> {
        let model = self.model.lock();
        if model.state == ViewState::Polling {
            return Err(ControllerError::BackWhilePolling);
        }
        Ok(())
    }

    /// Tears the view down: stops any running poll and drops late results.
    pub fn dispose(&self) {
        if !self.is_disposed() {
            debug!("Disposing payment controller in state {:?}", self.state());
            self.cancel.cancel();
        }
    }

    pub fn snapshot(&self) -> PaymentSnapshot {
        let model = self.model.lock();
        self.snapshot_of(&model)
    }

    fn finish_poll(&self, outcome: &PollOutcome) {
        let mut model = self.model.lock();
        match outcome {
            PollOutcome::Paid => model.state = ViewState::Confirmed,
            PollOutcome::Timeout => {
                self.metrics.increment_timeouts();
                model.state = ViewState::TimedOut;
                model.error = Some(ErrorInfo {
                    message: format!(
                        "Payment was not confirmed within {} seconds",
                        self.poller.config().window().as_secs()
                    ),
                    status: None,
                });
            }
            PollOutcome::Error(e) => {
                self.metrics.increment_poll_errors();
                model.state = ViewState::PollFailed;
                model.error = Some(ErrorInfo::from(e));
            }
            PollOutcome::Cancelled => self.metrics.increment_polls_cancelled(),
        }
    }

    fn snapshot_of(&self, model: &ViewModel) -> PaymentSnapshot {
        let open = !self.is_disposed();
        PaymentSnapshot {
            state: model.state,
            display_amount: model
                .order
                .as_ref()
                .map(|order| format_amount(order.amount, &order.currency)),
            order: model.order.clone(),
            last_status: model.last_status.clone(),
            error: model.error.clone(),
            actions: AvailableActions {
                generate: open && model.state.can_generate(),
                check: open && model.state.can_check(),
                back: open && model.state != ViewState::Polling,
            },
        }
    }
}
