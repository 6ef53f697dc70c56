//! Operator diagnostics. Probes are registered explicitly at startup and
//! served from `/diagnostics` when enabled in the configuration.

use crate::app::config::Config;
use crate::services::checkout_service::CheckoutService;
use crate::services::gateway_client::QrPaymentClient;
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DiagnosticsError {
    #[error("a probe named {0:?} is already registered")]
    DuplicateProbe(&'static str),
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub name: &'static str,
    pub healthy: bool,
    pub detail: Value,
}

#[async_trait]
pub trait DiagnosticProbe: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self) -> ProbeReport;
}

#[derive(Default)]
pub struct DiagnosticsRegistry {
    probes: Vec<Box<dyn DiagnosticProbe>>,
}

impl DiagnosticsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P>(&mut self, probe: P) -> Result<&mut Self, DiagnosticsError>
    where
        P: DiagnosticProbe + 'static,
    {
        let name = probe.name();
        if self.probes.iter().any(|p| p.name() == name) {
            return Err(DiagnosticsError::DuplicateProbe(name));
        }
        debug!("Registered diagnostic probe {}", name);
        self.probes.push(Box::new(probe));
        Ok(self)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// Runs every probe concurrently; reports come back in registration order.
    pub async fn run_all(&self) -> Vec<ProbeReport> {
        join_all(self.probes.iter().map(|p| p.run())).await
    }
}

/// Effective configuration as loaded at startup.
pub struct ConfigProbe {
    config: Config,
}

impl ConfigProbe {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl DiagnosticProbe for ConfigProbe {
    fn name(&self) -> &'static str {
        "config"
    }

    async fn run(&self) -> ProbeReport {
        ProbeReport {
            name: self.name(),
            healthy: self.config.validate().is_ok(),
            detail: json!({
                "gateway_base_url": self.config.gateway_base_url,
                "request_timeout_ms": self.config.request_timeout_ms,
                "poll_max_attempts": self.config.poll_max_attempts,
                "poll_interval_ms": self.config.poll_interval_ms,
                "session_ttl_secs": self.config.session_ttl_secs,
            }),
        }
    }
}

pub struct SessionProbe {
    service: Arc<CheckoutService>,
}

impl SessionProbe {
    pub fn new(service: Arc<CheckoutService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl DiagnosticProbe for SessionProbe {
    fn name(&self) -> &'static str {
        "sessions"
    }

    async fn run(&self) -> ProbeReport {
        ProbeReport {
            name: self.name(),
            healthy: true,
            detail: json!({
                "open_sessions": self.service.session_count(),
                "oldest_opened_at": self.service.oldest_session_opened_at(),
                "counters": self.service.metrics().snapshot(),
            }),
        }
    }
}

pub struct GatewayProbe {
    client: QrPaymentClient,
}

impl GatewayProbe {
    pub fn new(client: QrPaymentClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DiagnosticProbe for GatewayProbe {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn run(&self) -> ProbeReport {
        let url = self.client.base_url().to_string();
        match self.client.ping().await {
            Ok(status) => ProbeReport {
                name: self.name(),
                healthy: true,
                detail: json!({ "url": url, "http_status": status }),
            },
            Err(e) => ProbeReport {
                name: self.name(),
                healthy: false,
                detail: json!({ "url": url, "error": e.message() }),
            },
        }
    }
}
