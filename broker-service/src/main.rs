//! Broker Service - routes inbound actions to auth, mail and logging.
//!
//! On startup the service connects to RabbitMQ (retrying while the broker
//! comes up), then serves the broker endpoints until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use broker::queue::Connectivity;
use broker::{web, AppState, BrokerConnection, Config, Dispatcher, LogTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("broker_starting");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        port = config.port,
        log_transport = ?config.log_transport,
        log_exchange = %config.log_exchange,
        log_severity = %config.log_severity,
        auth_service_url = %config.auth_service_url,
        mail_service_url = %config.mail_service_url,
        "config_loaded"
    );

    // The broker is only needed when log events go through the exchange
    let broker = match config.log_transport {
        LogTransport::RabbitMq => Some(
            BrokerConnection::connect(&config.rabbitmq_url, &config.connect_policy())
                .await
                .context("RabbitMQ is required for the rabbitmq log transport")?,
        ),
        LogTransport::Http => None,
    };

    // Create a shared HTTP client for all downstream requests
    let client = Client::builder()
        .pool_max_idle_per_host(100)
        .build()
        .context("Failed to create HTTP client")?;

    let dispatcher = Dispatcher::from_config(&config, client, broker.clone())?;
    let connectivity = broker
        .clone()
        .map(|broker| Arc::new(broker) as Arc<dyn Connectivity>);
    let app = web::router(AppState::new(dispatcher, connectivity));

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "broker_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(broker) = broker {
        broker.close().await;
    }

    info!("broker_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("broker_shutting_down");
}
