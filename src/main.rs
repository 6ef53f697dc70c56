use anyhow::Context;
use clap::Parser;
use qr_checkout::app::{self, config::Config, AppState};
use qr_checkout::diagnostics::{ConfigProbe, DiagnosticsRegistry, GatewayProbe, SessionProbe};
use qr_checkout::services::{CheckoutService, QrPaymentClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Base URL of the QR payment gateway
    #[arg(long)]
    gateway_url: Option<String>,

    /// Serve /diagnostics
    #[arg(long)]
    diagnostics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server_port = port;
    }
    if let Some(url) = cli.gateway_url {
        config.gateway_base_url = url;
    }
    config.diagnostics_enabled |= cli.diagnostics;
    config.validate()?;

    info!(
        "Starting QR checkout on port {} against gateway {}",
        config.server_port, config.gateway_base_url
    );

    let client = QrPaymentClient::from_config(&config).context("building gateway client")?;
    let checkout = Arc::new(CheckoutService::new(
        Arc::new(client.clone()),
        config.poll_config(),
        config.session_ttl(),
    ));

    let diagnostics = if config.diagnostics_enabled {
        let mut registry = DiagnosticsRegistry::new();
        registry
            .register(ConfigProbe::new(&config))?
            .register(SessionProbe::new(checkout.clone()))?
            .register(GatewayProbe::new(client))?;
        info!("Diagnostics enabled: {:?}", registry.names());
        Some(Arc::new(registry))
    } else {
        None
    };

    // Idle session sweeper
    let sweep_every = (config.session_ttl() / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(checkout.clone().run_sweeper(sweep_every));

    let app = app::router(AppState {
        checkout: checkout.clone(),
        diagnostics,
    });

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    checkout.close_all();
    info!("Shut down, all checkout sessions closed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
