use crate::app::config::Config;
use crate::models::payment::{CreateOrderRequest, PaymentOrder, StatusResponse};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

const JSON: &str = "application/json";

/// Every failure the gateway client can report.
///
/// `status()` is the HTTP status code when the gateway answered and `0` when
/// no HTTP response was obtained.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(u64),
    #[error("order id must not be empty")]
    EmptyOrderId,
    #[error("invalid gateway base url: {0}")]
    InvalidBaseUrl(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("gateway responded with HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("malformed gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::Http { status, .. } => *status,
            _ => 0,
        }
    }

    /// User-facing message. Gateway errors carry the raw response body.
    pub fn message(&self) -> String {
        match self {
            GatewayError::Transport(message) | GatewayError::Decode(message)
                if !message.is_empty() =>
            {
                message.clone()
            }
            GatewayError::Http { status, body } if body.trim().is_empty() => {
                format!("HTTP {}", status)
            }
            GatewayError::Http { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }
}

/// The two operations the checkout flow needs from the QR payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, amount: u64) -> Result<PaymentOrder, GatewayError>;
    async fn check_status(&self, order_id: &str) -> Result<StatusResponse, GatewayError>;
}

pub type GatewayHandle = Arc<dyn PaymentGateway>;

/// reqwest-backed gateway client. Holds no state besides the base URL and
/// the connection pool, so one instance is shared by every checkout session.
#[derive(Clone)]
pub struct QrPaymentClient {
    client: Client,
    base_url: Url,
}

impl QrPaymentClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, GatewayError> {
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let base_url = config
            .gateway_url()
            .map_err(|e| GatewayError::InvalidBaseUrl(e.to_string()))?;
        Self::new(base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(CONTENT_TYPE, JSON)
            .header(ACCEPT, JSON)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    /// Tries the base URL; any HTTP answer counts as reachable.
    pub async fn ping(&self) -> Result<u16, GatewayError> {
        self.client
            .get(self.base_url.clone())
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|response| response.status().as_u16())
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for QrPaymentClient {
    async fn create_order(&self, amount: u64) -> Result<PaymentOrder, GatewayError> {
        if amount == 0 {
            return Err(GatewayError::InvalidAmount(amount));
        }

        let url = self.endpoint(&["orders"])?;
        let request = self
            .request(Method::POST, url)
            .json(&CreateOrderRequest { amount });

        match self.send::<PaymentOrder>(request).await {
            Ok(order) => {
                info!(
                    "Created payment order {} for {} {}",
                    order.order_id, order.amount, order.currency
                );
                Ok(order)
            }
            Err(e) => {
                warn!("Failed to create payment order for amount {}: {}", amount, e);
                Err(e)
            }
        }
    }

    async fn check_status(&self, order_id: &str) -> Result<StatusResponse, GatewayError> {
        if order_id.is_empty() {
            return Err(GatewayError::EmptyOrderId);
        }

        let url = self.endpoint(&["orders", order_id, "status"])?;
        let status = self
            .send::<StatusResponse>(self.request(Method::GET, url))
            .await?;
        debug!("Order {} status: {}", order_id, status.status);
        Ok(status)
    }
}
