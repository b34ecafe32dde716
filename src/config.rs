//! Configuration loading and management
//!
//! Both hotkeys are fixed at build time. The activation delay is the one
//! tunable: how long to wait after the hotkey fires before typing, so the
//! focused app has processed the hotkey's own key release.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::hotkey::{Bindings, KeyCombo};

/// Hotkey that types the strikethrough markers
pub const ACTIVATION_HOTKEY: &str = "<cmd>+<alt>+s";

/// Hotkey that stops the daemon
pub const EXIT_HOTKEY: &str = "<ctrl>+<cmd>+q";

/// Pause between hotkey detection and the first injected keystroke
pub const DEFAULT_ACTIVATION_DELAY: Duration = Duration::from_millis(50);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Combination that triggers strikethrough insertion
    pub activation: KeyCombo,

    /// Combination that stops the listener
    pub exit: KeyCombo,

    /// Delay before injecting the sequence
    pub activation_delay: Duration,
}

impl Config {
    /// Load configuration from the built-in defaults
    pub fn load() -> Result<Self> {
        Self::from_hotkeys(ACTIVATION_HOTKEY, EXIT_HOTKEY)
    }

    /// Build a configuration from two key-combination strings
    pub fn from_hotkeys(activation: &str, exit: &str) -> Result<Self> {
        let activation = activation
            .parse()
            .with_context(|| format!("invalid activation hotkey {:?}", activation))?;
        let exit = exit
            .parse()
            .with_context(|| format!("invalid exit hotkey {:?}", exit))?;

        Ok(Self {
            activation,
            exit,
            activation_delay: DEFAULT_ACTIVATION_DELAY,
        })
    }

    #[cfg(test)]
    pub fn with_activation_delay(mut self, delay: Duration) -> Self {
        self.activation_delay = delay;
        self
    }

    /// Build the immutable binding table handed to the listener
    pub fn bindings(&self) -> Result<Bindings> {
        Ok(Bindings::new(self.activation, self.exit)?)
    }
}
