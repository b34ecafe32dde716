//! Hotkey module for global keyboard event listening
//!
//! Uses macOS CGEventTap to watch key-down events and resolves them
//! against an immutable activation/exit binding table.

mod bindings;
mod keys;
mod listener;

pub use bindings::{Action, Bindings};
pub use keys::{Key, KeyCombo, NamedKey};
#[cfg(target_os = "macos")]
pub use keys::{char_keystroke, ModifierState};
pub use listener::{HotkeyError, HotkeyEvent, HotkeyListener};
