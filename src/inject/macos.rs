//! Keystroke injection through CoreGraphics keyboard events
//!
//! Requires Accessibility permission. Without it macOS drops posted events
//! silently.

use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation, EventField};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

use super::{Direction, InjectError, KeySink, Keystroke, INJECTED_EVENT_MARKER};
use crate::hotkey::{char_keystroke, Key, ModifierState};

/// Posts keyboard events at the HID level
pub struct CGEventSink {
    source: CGEventSource,
}

impl CGEventSink {
    pub fn new() -> Result<Self, InjectError> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| InjectError::SourceCreation)?;
        Ok(Self { source })
    }
}

impl KeySink for CGEventSink {
    fn send(&mut self, stroke: Keystroke) -> Result<(), InjectError> {
        // Flags are set explicitly so the still-held hotkey modifiers do not
        // combine with the synthetic keys.
        let (code, event_flags) = match stroke.key {
            Key::Char(c) => {
                let (code, shift) =
                    char_keystroke(c).ok_or(InjectError::UnmappedKey(stroke.key))?;
                let modifiers = if shift {
                    ModifierState::shift_only()
                } else {
                    ModifierState::default()
                };
                (code, modifiers.to_flags())
            }
            Key::Named(named) => (named.code(), CGEventFlags::CGEventFlagNull),
        };

        let event = CGEvent::new_keyboard_event(
            self.source.clone(),
            code,
            stroke.direction == Direction::Press,
        )
        .map_err(|_| InjectError::EventCreation(stroke))?;

        event.set_flags(event_flags);
        if let Key::Char(c) = stroke.key {
            // Layout-independent: the receiving app sees this character
            event.set_string(&c.to_string());
        }
        event.set_integer_value_field(EventField::EVENT_SOURCE_USER_DATA, INJECTED_EVENT_MARKER);
        event.post(CGEventTapLocation::HID);

        Ok(())
    }
}
