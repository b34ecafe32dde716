//! Core state machine implementation
//!
//! Two states: Listening and Stopped. Hotkey events are handled one at a
//! time, so an activation always finishes before the next event is seen.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::hotkey::{Action, HotkeyEvent};
use crate::inject::{Injector, KeySink};

/// The two possible states of the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Waiting for hotkeys
    #[default]
    Listening,
    /// Terminal; the process exits
    Stopped,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Listening => write!(f, "Listening"),
            State::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Why the listener left the Listening state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The exit hotkey was pressed
    ExitHotkey,
    /// SIGINT or SIGTERM
    Interrupted,
    /// The hotkey listener went away
    ListenerClosed,
}

/// Dispatches hotkey events to the injector
pub struct StateMachine<S> {
    state: State,
    stop_reason: Option<StopReason>,
    injector: Injector<S>,
    activations: u64,
}

impl<S: KeySink> StateMachine<S> {
    /// Create a new state machine in the Listening state
    pub fn new(injector: Injector<S>) -> Self {
        Self {
            state: State::Listening,
            stop_reason: None,
            injector,
            activations: 0,
        }
    }

    /// Get the current state
    pub fn state(&self) -> State {
        self.state
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Number of strikethrough activations handled so far
    pub fn activations(&self) -> u64 {
        self.activations
    }

    #[cfg(test)]
    pub fn injector(&self) -> &Injector<S> {
        &self.injector
    }

    /// Run the state machine until it stops
    pub async fn run(&mut self, mut hotkey_rx: mpsc::Receiver<HotkeyEvent>) -> StopReason {
        info!(state = %self.state, "state machine started");

        while self.state == State::Listening {
            match hotkey_rx.recv().await {
                Some(event) => self.handle_event(event).await,
                None => self.stop(StopReason::ListenerClosed),
            }
        }

        let reason = self.stop_reason.unwrap_or(StopReason::ListenerClosed);
        info!(?reason, activations = self.activations, "state machine stopped");
        reason
    }

    /// Handle one hotkey event
    pub async fn handle_event(&mut self, event: HotkeyEvent) {
        if self.state == State::Stopped {
            debug!(?event, "ignoring event after stop");
            return;
        }

        match event {
            HotkeyEvent::Triggered(Action::Strikethrough) => self.activate().await,
            HotkeyEvent::Triggered(Action::Exit) => self.stop(StopReason::ExitHotkey),
            HotkeyEvent::TapDisabled => {
                warn!("hotkey tap was disabled, events may have been missed");
            }
        }
    }

    /// Move to Stopped; later calls keep the first reason
    pub fn stop(&mut self, reason: StopReason) {
        if self.state == State::Stopped {
            return;
        }

        info!(from = %self.state, to = %State::Stopped, ?reason, "state transition");
        self.state = State::Stopped;
        self.stop_reason = Some(reason);
    }

    async fn activate(&mut self) {
        self.activations += 1;
        println!("Hotkey activated. Typing strikethrough.");
        debug!(
            activation = self.activations,
            delay_ms = self.injector.delay().as_millis() as u64,
            "injecting strikethrough"
        );

        // Fire and forget: a failed injection is not retried
        if let Err(e) = self.injector.strikethrough().await {
            error!(?e, "failed to inject strikethrough keystrokes");
        }
    }
}
