//! # boneiod
//!
//! Composition root that wires the pin driver, the board manager and the
//! MQTT bus together and runs the board.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialise logging
//! - Pick the pin driver (`gpio` or `virtual`)
//! - Build the scheduler, the manager and the MQTT bus
//! - Run the cooperative loop until Ctrl-C
//! - Publish `offline` and disconnect on shutdown
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boneio_adapter_gpio::RppalDriver;
use boneio_adapter_mqtt::{MqttBus, MqttError};
use boneio_adapter_virtual::VirtualPins;
use boneio_app::manager::Manager;
use boneio_app::ports::PinDriver;
use boneio_app::scheduler;

use config::{Config, DriverKind};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.logging.filter)
                .unwrap_or_else(|_| "boneiod=info,boneio=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        driver = ?config.board.driver,
        "starting boneiod"
    );

    match config.board.driver {
        DriverKind::Gpio => {
            let driver = RppalDriver::new().context("failed to open gpio")?;
            run(&config, driver).await
        }
        DriverKind::Virtual => run(&config, VirtualPins::new()).await,
    }
}

async fn run<D: PinDriver>(config: &Config, driver: D) -> anyhow::Result<()> {
    let (scheduler, handle) = scheduler::channel();

    let manager = Manager::new(&config.board.layout, Arc::new(driver), handle.clone())
        .context("failed to set up board")?;
    let (bus, event_loop) = MqttBus::connect(&config.mqtt, manager.topics(), handle)
        .map_err(MqttError::into_domain)
        .context("failed to set up mqtt")?;

    tokio::select! {
        () = manager.run(scheduler, &bus) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            tracing::info!("shutdown requested");
        }
    }

    if let Err(err) = bus.shutdown(SHUTDOWN_GRACE).await {
        tracing::warn!(error = %err, "failed to announce offline");
    }
    if tokio::time::timeout(SHUTDOWN_GRACE, event_loop).await.is_err() {
        tracing::warn!("mqtt event loop did not stop in time");
    }
    tracing::info!("boneiod stopped");
    Ok(())
}
