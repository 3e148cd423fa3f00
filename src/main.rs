//! FocusGuard - Biosignal Attention Monitor
//!
//! Connects to a concentration telemetry feed, watches for attention drops,
//! and runs guided recovery exercises when concentration falls below the
//! configured threshold.
//!
//! # Usage
//!
//! ```bash
//! # Run against a local feed with a config file
//! cargo run --release -- --config focusguard.toml
//!
//! # Run against the bundled simulator
//! cargo run --release --bin feed_simulator &
//! cargo run --release
//! ```
//!
//! # Environment Variables
//!
//! - `FOCUSGUARD_CONFIG`: Path to the TOML config file
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use focusguard::coordinator::{LoggingCueSink, LoggingNavigator};
use focusguard::stream::TcpTransport;
use focusguard::{MonitorConfig, SessionCoordinator, TelemetryStreamClient};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "focusguard")]
#[command(about = "Biosignal attention monitor with guided interventions")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config file (overrides FOCUSGUARD_CONFIG)
    #[arg(long)]
    config: Option<String>,

    /// Feed host (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Feed port (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Playback speed for recorded feeds (0.5, 1, 2 or 5)
    #[arg(long)]
    speed: Option<f64>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => MonitorConfig::from_path(std::path::Path::new(path))
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => MonitorConfig::load().context("Failed to load configuration")?,
    };
    if let Some(host) = args.host {
        config.feed_host = host;
    }
    if let Some(port) = args.port {
        config.feed_port = port;
    }
    if let Some(speed) = args.speed {
        config.stream_speed = speed;
    }
    config.validate().context("Invalid configuration")?;

    info!(
        feed = %config.feed_addr(),
        threshold = config.concentration_threshold,
        "Starting FocusGuard"
    );

    let transport = TcpTransport::new(&config.feed_host, config.feed_port);
    let client = TelemetryStreamClient::new(transport)
        .with_ack_timeout(std::time::Duration::from_secs(config.ack_timeout_secs))
        .with_reconnect_delay(std::time::Duration::from_secs(config.reconnect_delay_secs));
    let mut coordinator =
        SessionCoordinator::new(client, config, LoggingCueSink, LoggingNavigator);

    coordinator
        .start()
        .await
        .context("Failed to start monitoring")?;

    // Ctrl+C triggers a clean shutdown
    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl+C received, shutting down");
        signal_token.cancel();
    });

    coordinator.run(cancel_token).await;
    Ok(())
}
