//! State machine module for listener lifecycle
//!
//! Provides an explicit state machine with two states:
//! - Listening: Waiting for hotkeys, injecting on activation
//! - Stopped: Terminal, entered on the exit hotkey or an interrupt

mod machine;

pub use machine::{StateMachine, StopReason};
