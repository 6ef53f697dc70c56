pub mod cancel;
pub mod checkout_service;
pub mod gateway_client;
pub mod metrics;
pub mod payment_controller;
pub mod poller;

#[cfg(test)]
pub(crate) mod test_support;

pub use checkout_service::{CheckoutService, ServiceError};
pub use gateway_client::{GatewayError, PaymentGateway, QrPaymentClient};
pub use poller::{PollConfig, PollOutcome, Poller};
