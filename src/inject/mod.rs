//! Synthetic keystroke injection
//!
//! The strikethrough action is a fixed eight-event sequence. Events go
//! through a [`KeySink`] so the sequence can be exercised without posting
//! anything to the OS.

#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(target_os = "macos"))]
mod unsupported;

#[cfg(target_os = "macos")]
pub use macos::CGEventSink as SystemSink;
#[cfg(not(target_os = "macos"))]
pub use unsupported::UnsupportedSink as SystemSink;

use std::time::Duration;

use tracing::debug;

use crate::hotkey::{Key, NamedKey};

/// Marker written into the user-data field of every injected event
///
/// The event tap skips events carrying it.
pub const INJECTED_EVENT_MARKER: i64 = 0x7e7e_0001;

/// Key press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Press,
    Release,
}

/// One synthetic key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keystroke {
    pub key: Key,
    pub direction: Direction,
}

impl Keystroke {
    pub const fn press(key: Key) -> Self {
        Self {
            key,
            direction: Direction::Press,
        }
    }

    pub const fn release(key: Key) -> Self {
        Self {
            key,
            direction: Direction::Release,
        }
    }
}

const TILDE: Key = Key::Char('~');
const LEFT: Key = Key::Named(NamedKey::Left);

/// `~~` followed by two left arrows, leaving the cursor between the tildes
pub const STRIKETHROUGH_SEQUENCE: [Keystroke; 8] = [
    Keystroke::press(TILDE),
    Keystroke::release(TILDE),
    Keystroke::press(TILDE),
    Keystroke::release(TILDE),
    Keystroke::press(LEFT),
    Keystroke::release(LEFT),
    Keystroke::press(LEFT),
    Keystroke::release(LEFT),
];

/// Errors that can occur while injecting keystrokes
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("failed to create event source - check Accessibility permissions")]
    SourceCreation,

    #[error("failed to create keyboard event for {0:?}")]
    EventCreation(Keystroke),

    #[error("no key code for {0}")]
    UnmappedKey(Key),

    #[error("keystroke injection is only supported on macOS")]
    Unsupported,
}

/// Destination for synthetic key events
pub trait KeySink {
    fn send(&mut self, stroke: Keystroke) -> Result<(), InjectError>;
}

/// Runs the strikethrough sequence after the activation delay
pub struct Injector<S> {
    sink: S,
    delay: Duration,
}

impl<S: KeySink> Injector<S> {
    pub fn new(sink: S, delay: Duration) -> Self {
        Self { sink, delay }
    }

    /// Delay between hotkey detection and the first injected event
    pub fn delay(&self) -> Duration {
        self.delay
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Wait for the hotkey's own key release to settle, then type `~~` and
    /// step back one position
    pub async fn strikethrough(&mut self) -> Result<(), InjectError> {
        tokio::time::sleep(self.delay).await;
        self.inject(&STRIKETHROUGH_SEQUENCE)
    }

    /// Send keystrokes in order, stopping at the first failure
    pub fn inject(&mut self, strokes: &[Keystroke]) -> Result<(), InjectError> {
        for stroke in strokes {
            self.sink.send(*stroke)?;
        }
        debug!(events = strokes.len(), "keystrokes injected");
        Ok(())
    }
}
