//! Dummy battery host
//!
//! Publishes the dummy battery on an in-process registry for the lifetime of
//! the process: load on start, unload on SIGINT/SIGTERM.
//!
//! Lifecycle:
//! 1. Setup logging
//! 2. Initialize the battery on the registry
//! 3. Report the published supplies
//! 4. Wait for shutdown, logging supply events
//! 5. Tear the battery down

use anyhow::{Context, Result};
use dummy_battery::{DummyBattery, LocalRegistry, SupplyEvent};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    info!("Dummy battery host starting...");

    let registry = Arc::new(LocalRegistry::new());
    let events = registry.subscribe();

    let battery =
        DummyBattery::initialize(registry.clone()).context("Failed to initialize battery")?;
    if let Some(e) = battery.registration_error() {
        warn!("Battery is not published: {}", e);
    }

    report_supplies(&registry)?;

    wait_for_shutdown(events).await?;

    info!("Shutting down...");
    battery.teardown();
    info!("{} power supplies remain registered", registry.live_registrations());

    Ok(())
}

/// Setup logging to console
fn setup_logging() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_ansi(false))
        .init();
}

/// Log the uevent block and JSON snapshot of every registered supply
fn report_supplies(registry: &LocalRegistry) -> Result<()> {
    for name in registry.supplies() {
        for line in registry.uevent(&name)? {
            info!("{}", line);
        }

        let snapshot = registry.snapshot(&name)?;
        let json = serde_json::to_string(&snapshot).context("Failed to serialize snapshot")?;
        info!("{}: {}", name, json);
    }

    Ok(())
}

/// Block until SIGINT or SIGTERM, logging supply events meanwhile
async fn wait_for_shutdown(mut events: broadcast::Receiver<SupplyEvent>) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for SIGINT")?;
                info!("Received SIGINT");
                return Ok(());
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(SupplyEvent::Registered(name)) => info!("Power supply {} registered", name),
                Ok(SupplyEvent::Unregistered(name)) => info!("Power supply {} unregistered", name),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Missed {} supply events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("Registry event channel closed");
                    return Ok(());
                }
            },
        }
    }
}
