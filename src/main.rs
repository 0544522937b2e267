//! Lorabridge - ThingsBoard/ChirpStack device bridge
//!
//! Bridges MQTT device sessions on a ThingsBoard instance to LoRaWAN
//! devices behind ChirpStack: downlinks go through the ChirpStack gRPC
//! enqueue API, uplinks come back over the ChirpStack MQTT event stream.

mod api;
mod bridge;
mod chirpstack;
mod common;
mod config;

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use bridge::{radio_session, Registry, UplinkHandle, UplinkListener};
use chirpstack::EnqueueClient;
use config::{env::get_config_path, load_and_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Lorabridge v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        error!("See lorabridge.conf.example for reference.");
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  ThingsBoard MQTT: {}:{}", config.thingsboard.host, config.thingsboard.port);
    info!("  ChirpStack MQTT: {}:{}", config.chirpstack.mqtt_host, config.chirpstack.mqtt_port);
    info!("  ChirpStack API: {}", config.chirpstack.api_server);
    info!("  fPorts: uplink {}, downlink {}", config.ports.uplink, config.ports.downlink);

    // ============================================================
    // Build the bridging core
    // ============================================================

    // Downlink enqueue client; the channel connects on first use
    let enqueue = EnqueueClient::new(&config.chirpstack, config.ports.downlink)?;

    // Shared ChirpStack uplink session
    let (radio_client, radio_eventloop) = radio_session(&config.chirpstack);
    let uplinks = UplinkHandle::new(radio_client);

    let registry = Arc::new(Registry::new(
        config.thingsboard.clone(),
        enqueue,
        uplinks.clone(),
    ));

    // Broadcast shutdown for the listener and the HTTP server; device
    // sessions have per-device channels owned by the registry
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener = UplinkListener::new(uplinks, registry.clone(), config.ports.uplink);
    let mut listener_task = tokio::spawn(listener.run(radio_eventloop, shutdown_rx.clone()));

    // ============================================================
    // Start the control-plane HTTP server
    // ============================================================
    let app = api::router(registry.clone());
    let addr = format!("0.0.0.0:{}", config.http.port);
    let http_listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Control plane listening on http://{}", addr);

    let mut http_shutdown = shutdown_rx.clone();
    let mut http_task = tokio::spawn(async move {
        let shutdown = async move {
            // A true value or a dropped sender both end the server
            while !*http_shutdown.borrow() {
                if http_shutdown.changed().await.is_err() {
                    break;
                }
            }
        };

        if let Err(e) = axum::serve(http_listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("HTTP server error: {}", e);
        }
    });

    // ============================================================
    // Run until a shutdown signal or a task exits
    // ============================================================
    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - closing sessions...");
            true
        }
        _ = &mut listener_task => false,
        _ = &mut http_task => false,
    };

    // Handle graceful shutdown
    if shutdown {
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed (tasks already exited): {}", e);
        }
        registry.shutdown().await;

        let timeout = tokio::time::Duration::from_secs(5);
        match tokio::time::timeout(timeout, async { tokio::join!(listener_task, http_task) }).await
        {
            Ok((listener_result, http_result)) => {
                if let Err(e) = listener_result {
                    warn!("Uplink listener task panicked: {}", e);
                }
                if let Err(e) = http_result {
                    warn!("HTTP server task panicked: {}", e);
                }
                info!("Uplink listener and control plane stopped");
            }
            Err(_) => warn!("Timed out waiting for tasks to stop"),
        }
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
