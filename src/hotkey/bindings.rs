//! Immutable hotkey-to-action table
//!
//! Exactly two bindings exist: the activation combination and the exit
//! combination. The table is built once at startup and handed to the
//! listener, so it can be inspected without touching the OS hook.

use std::fmt;

use super::keys::{KeyCombo, KeyPress};

/// What a matched hotkey does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Type `~~` and move the cursor back between the markers
    Strikethrough,
    /// Stop listening and exit
    Exit,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Strikethrough => write!(f, "strikethrough"),
            Action::Exit => write!(f, "exit"),
        }
    }
}

/// Errors from building the binding table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("activation and exit hotkeys are both {0}")]
    DuplicateCombo(KeyCombo),
}

/// The activation and exit bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bindings {
    activation: KeyCombo,
    exit: KeyCombo,
}

impl Bindings {
    /// Create the binding table, rejecting combinations that fire on the
    /// same key-down
    pub fn new(activation: KeyCombo, exit: KeyCombo) -> Result<Self, BindingError> {
        if activation.same_trigger(&exit) {
            return Err(BindingError::DuplicateCombo(activation));
        }
        Ok(Self { activation, exit })
    }

    pub fn activation(&self) -> &KeyCombo {
        &self.activation
    }

    pub fn exit(&self) -> &KeyCombo {
        &self.exit
    }

    /// All bindings in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&KeyCombo, Action)> {
        [
            (&self.activation, Action::Strikethrough),
            (&self.exit, Action::Exit),
        ]
        .into_iter()
    }

    /// Resolve a key-down to the bound action, if any
    pub fn resolve(&self, press: &KeyPress) -> Option<Action> {
        self.iter()
            .find(|(combo, _)| combo.matches(press))
            .map(|(_, action)| action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::keys::{codes, ModifierState};

    fn bindings() -> Bindings {
        Bindings::new(
            "<cmd>+<alt>+s".parse().unwrap(),
            "<ctrl>+<cmd>+q".parse().unwrap(),
        )
        .unwrap()
    }

    fn cmd_alt() -> ModifierState {
        ModifierState {
            command: true,
            option: true,
            ..ModifierState::default()
        }
    }

    fn ctrl_cmd() -> ModifierState {
        ModifierState {
            control: true,
            command: true,
            ..ModifierState::default()
        }
    }

    #[test]
    fn test_exactly_two_bindings() {
        let bindings = bindings();
        let actions: Vec<Action> = bindings.iter().map(|(_, action)| action).collect();
        assert_eq!(actions, vec![Action::Strikethrough, Action::Exit]);
    }

    #[test]
    fn test_resolve_activation() {
        let press = KeyPress::new(codes::S, cmd_alt());
        assert_eq!(bindings().resolve(&press), Some(Action::Strikethrough));
    }

    #[test]
    fn test_resolve_exit() {
        let press = KeyPress::new(codes::Q, ctrl_cmd());
        assert_eq!(bindings().resolve(&press), Some(Action::Exit));
    }

    #[test]
    fn test_non_matching_input_resolves_to_nothing() {
        let bindings = bindings();
        let misses = [
            KeyPress::new(codes::S, ModifierState::default()),
            KeyPress::new(codes::S, ctrl_cmd()),
            KeyPress::new(codes::Q, cmd_alt()),
            KeyPress::new(codes::Q, ModifierState { shift: true, ..ctrl_cmd() }),
            KeyPress::new(codes::GRAVE, ModifierState::shift_only()),
            KeyPress::new(codes::LEFT_ARROW, ModifierState::default()),
        ];
        for press in misses {
            assert_eq!(bindings.resolve(&press), None, "{:?}", press);
        }
    }

    #[test]
    fn test_duplicate_combo_rejected() {
        let combo: KeyCombo = "<cmd>+<alt>+s".parse().unwrap();
        assert_eq!(
            Bindings::new(combo, combo),
            Err(BindingError::DuplicateCombo(combo))
        );
    }

    #[test]
    fn test_equivalent_spellings_rejected() {
        let tilde: KeyCombo = "<ctrl>+<cmd>+~".parse().unwrap();
        let shift_backtick: KeyCombo = "<shift>+<ctrl>+<cmd>+`".parse().unwrap();
        assert!(Bindings::new(tilde, shift_backtick).is_err());
    }

    #[test]
    fn test_shifted_symbol_binding_reaches_exit() {
        let bindings = Bindings::new(
            "<ctrl>+<cmd>+`".parse().unwrap(),
            "<ctrl>+<cmd>+~".parse().unwrap(),
        )
        .unwrap();

        let plain = KeyPress::new(codes::GRAVE, ctrl_cmd());
        let shifted = KeyPress::new(codes::GRAVE, ModifierState { shift: true, ..ctrl_cmd() });
        assert_eq!(bindings.resolve(&plain), Some(Action::Strikethrough));
        assert_eq!(bindings.resolve(&shifted), Some(Action::Exit));
    }
}
