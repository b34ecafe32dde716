//! strikethrough-daemon: types Markdown strikethrough markers on a hotkey
//!
//! Runs in the background and provides:
//! - Global hotkey detection via CGEventTap
//! - `~~` injection with the cursor placed between the markers
//! - A second hotkey (or SIGINT/SIGTERM) to stop
//!
//! Status lines go to stdout; diagnostics go to stderr via tracing.

mod config;
mod hotkey;
mod inject;
mod lifecycle;
mod state;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::hotkey::HotkeyListener;
use crate::inject::{Injector, SystemSink};
use crate::lifecycle::ShutdownSignal;
use crate::state::{StateMachine, StopReason};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "strikethrough-daemon starting"
    );

    let config = Config::load()?;
    let bindings = config.bindings()?;
    info!(
        activation = %config.activation,
        exit = %config.exit,
        delay_ms = config.activation_delay.as_millis() as u64,
        "configuration loaded"
    );

    let sink = SystemSink::new().context("failed to set up keystroke injection")?;
    let mut state_machine = StateMachine::new(Injector::new(sink, config.activation_delay));

    // Hotkey listener -> state machine
    let (hotkey_tx, hotkey_rx) = mpsc::channel(32);

    // Released on every path out of main when dropped
    let mut hotkey_listener = HotkeyListener::new(bindings, hotkey_tx);
    hotkey_listener
        .start()
        .context("failed to start hotkey listener")?;

    // Installed before the stop instructions are printed
    let mut shutdown = ShutdownSignal::new().context("failed to install signal handlers")?;

    println!("Strikethrough daemon running in the background.");
    println!("Listening for hotkey: {}", config.activation);
    println!(
        "Press Ctrl+C in this terminal or {} to stop.",
        config.exit
    );

    let reason = tokio::select! {
        reason = state_machine.run(hotkey_rx) => reason,
        _ = shutdown.wait() => StopReason::Interrupted,
    };
    state_machine.stop(reason);

    info!(
        reason = ?state_machine.stop_reason(),
        activations = state_machine.activations(),
        "shutting down..."
    );
    hotkey_listener.stop();

    println!("Exiting strikethrough daemon.");
    info!("strikethrough-daemon stopped");

    Ok(())
}
