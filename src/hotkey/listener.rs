//! Global hotkey listener using macOS CGEventTap
//!
//! Monitors system-wide key-down events and resolves them against the
//! binding table. Runs on a dedicated thread with its own CFRunLoop. The
//! thread is stopped and joined when the listener is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::bindings::{Action, Bindings};

/// Events sent from the hotkey listener to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// A bound combination was pressed
    Triggered(Action),
    /// Event tap was disabled by macOS and has been re-enabled
    TapDisabled,
}

/// Global hotkey listener owning the event tap thread
pub struct HotkeyListener {
    bindings: Bindings,
    event_tx: mpsc::Sender<HotkeyEvent>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl HotkeyListener {
    /// Create a new hotkey listener for the given bindings
    pub fn new(bindings: Bindings, event_tx: mpsc::Sender<HotkeyEvent>) -> Self {
        Self {
            bindings,
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    #[cfg(test)]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Start the hotkey listener
    ///
    /// Spawns the listener thread and waits until the event tap is installed,
    /// so a missing Accessibility permission is reported here rather than
    /// on the thread.
    pub fn start(&mut self) -> Result<(), HotkeyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let bindings = self.bindings;
        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let spawned = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                if let Err(e) = run_event_loop(bindings, event_tx, running.clone(), ready_tx) {
                    error!(?e, "hotkey listener error");
                }

                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(HotkeyError::ThreadSpawn(e.to_string()));
            }
        };

        let ready = ready_rx.recv().unwrap_or(Err(HotkeyError::ThreadExited));
        if let Err(e) = ready {
            self.running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(e);
        }

        self.thread = Some(handle);
        Ok(())
    }

    /// Stop the hotkey listener and wait for its thread to exit
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            // The run loop wakes at least every RUN_LOOP_SLICE
            if handle.join().is_err() {
                warn!("hotkey listener thread panicked");
            }
            info!("hotkey listener released");
        }
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to attach event tap to the run loop")]
    RunLoopSource,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("listener thread exited before the event tap was ready")]
    ThreadExited,

    #[error("global hotkeys are only supported on macOS")]
    Unsupported,
}

type ReadySender = std::sync::mpsc::Sender<Result<(), HotkeyError>>;

#[cfg(target_os = "macos")]
const RUN_LOOP_SLICE: std::time::Duration = std::time::Duration::from_millis(100);

/// Messages from the tap callback to the run loop thread
#[cfg(target_os = "macos")]
enum TapMessage {
    Key(super::keys::KeyPress),
    Disabled,
}

/// Whether a key-down from the tap is matched against the bindings
///
/// Auto-repeats and events carrying the injection marker are skipped.
#[cfg(any(test, target_os = "macos"))]
fn accept_key_down(user_data: i64, autorepeat: i64) -> bool {
    user_data != crate::inject::INJECTED_EVENT_MARKER && autorepeat == 0
}

/// Run the CFRunLoop with the event tap
#[cfg(target_os = "macos")]
fn run_event_loop(
    bindings: Bindings,
    event_tx: mpsc::Sender<HotkeyEvent>,
    running: Arc<AtomicBool>,
    ready_tx: ReadySender,
) -> Result<(), HotkeyError> {
    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
        CGEventTapProxy, CGEventType, EventField,
    };
    use tracing::debug;

    use super::keys::{KeyCode, KeyPress, ModifierState};

    let (callback_tx, callback_rx) = std::sync::mpsc::channel::<TapMessage>();

    // CGEventTap callback - must be fast and non-blocking
    let callback = move |_proxy: CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
                         -> Option<CGEvent> {
        match event_type {
            CGEventType::KeyDown => {
                let user_data = event.get_integer_value_field(EventField::EVENT_SOURCE_USER_DATA);
                let autorepeat =
                    event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT);
                if accept_key_down(user_data, autorepeat) {
                    let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE)
                        as KeyCode;
                    let modifiers = ModifierState::from_flags(event.get_flags());
                    let _ = callback_tx.send(TapMessage::Key(KeyPress::new(code, modifiers)));
                }
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                let _ = callback_tx.send(TapMessage::Disabled);
            }
            _ => {}
        }
        Some(event.clone())
    };

    let tap = match CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        callback,
    ) {
        Ok(tap) => tap,
        Err(()) => {
            error!("failed to create event tap - is Accessibility permission granted?");
            let _ = ready_tx.send(Err(HotkeyError::EventTapCreation));
            return Ok(());
        }
    };

    let run_loop_source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            let _ = ready_tx.send(Err(HotkeyError::RunLoopSource));
            return Ok(());
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }
    tap.enable();

    info!(
        activation = %bindings.activation(),
        exit = %bindings.exit(),
        "event tap created and enabled"
    );
    let _ = ready_tx.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, true);
        }

        while let Ok(message) = callback_rx.try_recv() {
            let event = match message {
                TapMessage::Key(press) => match bindings.resolve(&press) {
                    Some(action) => {
                        debug!(?press, %action, "hotkey matched");
                        HotkeyEvent::Triggered(action)
                    }
                    None => continue,
                },
                TapMessage::Disabled => {
                    warn!("event tap disabled by the system, re-enabling");
                    tap.enable();
                    HotkeyEvent::TapDisabled
                }
            };

            // Not in an async context, so block on the bounded channel
            if event_tx.blocking_send(event).is_err() {
                warn!("failed to send hotkey event - channel closed?");
                return Ok(());
            }
        }
    }

    // Tap is removed from the run loop when it goes out of scope
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn run_event_loop(
    _bindings: Bindings,
    _event_tx: mpsc::Sender<HotkeyEvent>,
    _running: Arc<AtomicBool>,
    ready_tx: ReadySender,
) -> Result<(), HotkeyError> {
    let _ = ready_tx.send(Err(HotkeyError::Unsupported));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> Bindings {
        Bindings::new(
            "<cmd>+<alt>+s".parse().unwrap(),
            "<ctrl>+<cmd>+q".parse().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_listener_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(bindings(), tx);
        assert!(!listener.is_running());
        assert_eq!(listener.bindings(), &bindings());
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let (tx, _rx) = mpsc::channel(32);
        let mut listener = HotkeyListener::new(bindings(), tx);
        listener.stop();
        assert!(!listener.is_running());
    }

    #[test]
    fn test_accepts_plain_key_down() {
        assert!(accept_key_down(0, 0));
    }

    #[test]
    fn test_skips_auto_repeat() {
        assert!(!accept_key_down(0, 1));
    }

    #[test]
    fn test_skips_injected_events() {
        assert!(!accept_key_down(crate::inject::INJECTED_EVENT_MARKER, 0));
        assert!(!accept_key_down(crate::inject::INJECTED_EVENT_MARKER, 1));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_start_unsupported() {
        let (tx, _rx) = mpsc::channel(32);
        let mut listener = HotkeyListener::new(bindings(), tx);
        assert!(matches!(listener.start(), Err(HotkeyError::Unsupported)));
        assert!(!listener.is_running());
    }
}
