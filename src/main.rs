mod activity;
mod bridge;
mod catalog;
mod config;
mod discovery;
mod dispatch;
mod error;
mod features;
mod host;
mod registry;
mod topics;
mod transport;
use bridge::Bridge;
use bridge::scheduler::TokioScheduler;
use catalog::InMemoryCatalog;
use config::BridgeConfig;
use eyre::Result;
use host::stdio::StdioHost;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{Layer, layer::SubscriberExt};
use transport::mqtt::MqttTransport;

/// Log target for per-message topic/payload dumps.
pub const WIRE_TARGET: &str = "mqtt_urc_bridge::wire";

pub fn build_logger() -> Result<()> {
    // Defaults to "info" if RUST_LOG is not set, with the MQTT client and payload
    // dumps held back to warnings
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::new("info")
            .add_directive("rumqttc=warn".parse()?)
            .add_directive(format!("{WIRE_TARGET}=warn").parse()?),
    };

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .with_filter(env_filter),
        ),
    )
    .map_err(|e| eyre::eyre!("Failed to initialize logger: {}", e))?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    build_logger()?;
    tracing::info!("mqtt-urc-bridge version: {}", env!("CARGO_PKG_VERSION"));
    tracing::debug!(
        "Override with RUST_LOG environment variable if needed (e.g., RUST_LOG={WIRE_TARGET}=trace)"
    );

    // Load configuration
    let config = BridgeConfig::load_or_default(std::env::args_os().nth(1).map(PathBuf::from));
    tracing::debug!("Active configuration: {:?}", config);
    tracing::info!(
        integration = %config.integration.id,
        name = %config.integration.friendly_name,
        "Integration configured"
    );

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let transport = Arc::new(MqttTransport::new(
        config.timing.keep_alive(),
        events_tx.clone(),
    ));
    let scheduler = Arc::new(TokioScheduler::new(events_tx));
    let catalog = Arc::new(InMemoryCatalog::new());
    let bridge = Arc::new(Bridge::new(config, transport, scheduler, catalog));
    let event_loop = tokio::spawn(bridge.clone().run(events_rx));

    if let Err(e) = bridge.connect().await {
        tracing::warn!(error = %e, "Initial connect failed");
    }

    // Stdout carries host replies; logs go to stderr
    let host = StdioHost::new(bridge.clone());
    tokio::select! {
        result = host.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Host channel failed");
            }
        }
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    if let Err(e) = bridge.disconnect().await {
        tracing::warn!(error = %e, "Disconnect failed");
    }
    event_loop.abort();

    tracing::info!("Application shutdown complete");
    Ok(())
}
