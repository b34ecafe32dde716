//! Key definitions, modifier state tracking and key-combination parsing
//!
//! Key codes are macOS virtual key codes (ANSI layout). Combinations use
//! the `<cmd>+<alt>+s` notation: modifier and named-key tokens in angle
//! brackets, a literal key as a single character, joined by `+`.

use std::fmt;
use std::str::FromStr;

/// macOS virtual key code
pub type KeyCode = u16;

/// Virtual key codes from the HIToolbox ANSI table
pub mod codes {
    use super::KeyCode;

    pub const A: KeyCode = 0x00;
    pub const S: KeyCode = 0x01;
    pub const D: KeyCode = 0x02;
    pub const F: KeyCode = 0x03;
    pub const H: KeyCode = 0x04;
    pub const G: KeyCode = 0x05;
    pub const Z: KeyCode = 0x06;
    pub const X: KeyCode = 0x07;
    pub const C: KeyCode = 0x08;
    pub const V: KeyCode = 0x09;
    pub const B: KeyCode = 0x0B;
    pub const Q: KeyCode = 0x0C;
    pub const W: KeyCode = 0x0D;
    pub const E: KeyCode = 0x0E;
    pub const R: KeyCode = 0x0F;
    pub const Y: KeyCode = 0x10;
    pub const T: KeyCode = 0x11;
    pub const NUM_1: KeyCode = 0x12;
    pub const NUM_2: KeyCode = 0x13;
    pub const NUM_3: KeyCode = 0x14;
    pub const NUM_4: KeyCode = 0x15;
    pub const NUM_6: KeyCode = 0x16;
    pub const NUM_5: KeyCode = 0x17;
    pub const EQUAL: KeyCode = 0x18;
    pub const NUM_9: KeyCode = 0x19;
    pub const NUM_7: KeyCode = 0x1A;
    pub const MINUS: KeyCode = 0x1B;
    pub const NUM_8: KeyCode = 0x1C;
    pub const NUM_0: KeyCode = 0x1D;
    pub const RIGHT_BRACKET: KeyCode = 0x1E;
    pub const O: KeyCode = 0x1F;
    pub const U: KeyCode = 0x20;
    pub const LEFT_BRACKET: KeyCode = 0x21;
    pub const I: KeyCode = 0x22;
    pub const P: KeyCode = 0x23;
    pub const RETURN: KeyCode = 0x24;
    pub const L: KeyCode = 0x25;
    pub const J: KeyCode = 0x26;
    pub const QUOTE: KeyCode = 0x27;
    pub const K: KeyCode = 0x28;
    pub const SEMICOLON: KeyCode = 0x29;
    pub const BACKSLASH: KeyCode = 0x2A;
    pub const COMMA: KeyCode = 0x2B;
    pub const SLASH: KeyCode = 0x2C;
    pub const N: KeyCode = 0x2D;
    pub const M: KeyCode = 0x2E;
    pub const PERIOD: KeyCode = 0x2F;
    pub const TAB: KeyCode = 0x30;
    pub const SPACE: KeyCode = 0x31;
    pub const GRAVE: KeyCode = 0x32;
    pub const BACKSPACE: KeyCode = 0x33;
    pub const ESCAPE: KeyCode = 0x35;
    pub const F5: KeyCode = 0x60;
    pub const F6: KeyCode = 0x61;
    pub const F7: KeyCode = 0x62;
    pub const F3: KeyCode = 0x63;
    pub const F8: KeyCode = 0x64;
    pub const F9: KeyCode = 0x65;
    pub const F11: KeyCode = 0x67;
    pub const F10: KeyCode = 0x6D;
    pub const F12: KeyCode = 0x6F;
    pub const FORWARD_DELETE: KeyCode = 0x75;
    pub const F4: KeyCode = 0x76;
    pub const F2: KeyCode = 0x78;
    pub const F1: KeyCode = 0x7A;
    pub const LEFT_ARROW: KeyCode = 0x7B;
    pub const RIGHT_ARROW: KeyCode = 0x7C;
    pub const DOWN_ARROW: KeyCode = 0x7D;
    pub const UP_ARROW: KeyCode = 0x7E;
}

/// Modifier key flag masks from macOS CGEventFlags
#[cfg(target_os = "macos")]
pub mod flags {
    use core_graphics::event::CGEventFlags;

    /// Control key modifier flag
    pub const CONTROL: CGEventFlags = CGEventFlags::CGEventFlagControl;
    /// Option/Alt key modifier flag
    pub const OPTION: CGEventFlags = CGEventFlags::CGEventFlagAlternate;
    /// Command key modifier flag
    pub const COMMAND: CGEventFlags = CGEventFlags::CGEventFlagCommand;
    /// Shift key modifier flag
    pub const SHIFT: CGEventFlags = CGEventFlags::CGEventFlagShift;
}

/// Tracks which modifier keys are currently pressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModifierState {
    /// Control key is held
    pub control: bool,
    /// Option/Alt key is held
    pub option: bool,
    /// Command key is held
    pub command: bool,
    /// Shift key is held
    pub shift: bool,
}

impl ModifierState {
    /// Create a new ModifierState from CGEventFlags
    #[cfg(target_os = "macos")]
    pub fn from_flags(event_flags: core_graphics::event::CGEventFlags) -> Self {
        Self {
            control: event_flags.contains(flags::CONTROL),
            option: event_flags.contains(flags::OPTION),
            command: event_flags.contains(flags::COMMAND),
            shift: event_flags.contains(flags::SHIFT),
        }
    }

    /// Convert back into CGEventFlags for synthetic events
    #[cfg(target_os = "macos")]
    pub fn to_flags(self) -> core_graphics::event::CGEventFlags {
        use core_graphics::event::CGEventFlags;

        let mut out = CGEventFlags::CGEventFlagNull;
        if self.control {
            out |= flags::CONTROL;
        }
        if self.option {
            out |= flags::OPTION;
        }
        if self.command {
            out |= flags::COMMAND;
        }
        if self.shift {
            out |= flags::SHIFT;
        }
        out
    }

    /// Shift held, nothing else
    #[cfg(any(test, target_os = "macos"))]
    pub fn shift_only() -> Self {
        Self {
            shift: true,
            ..Self::default()
        }
    }

    /// Check if all modifiers are released
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        !self.control && !self.option && !self.command && !self.shift
    }
}

/// Non-character keys that can appear in a combination or a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Left,
    Right,
    Up,
    Down,
    Space,
    Tab,
    Return,
    Escape,
    Backspace,
    Delete,
    /// Function key F1..=F12
    F(FunctionKey),
}

/// Function key number, always in 1..=12
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionKey(u8);

impl FunctionKey {
    pub fn new(n: u8) -> Option<Self> {
        (1..=12).contains(&n).then_some(Self(n))
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl NamedKey {
    fn from_name(name: &str) -> Option<Self> {
        let key = match name {
            "left" => Self::Left,
            "right" => Self::Right,
            "up" => Self::Up,
            "down" => Self::Down,
            "space" => Self::Space,
            "tab" => Self::Tab,
            "enter" | "return" => Self::Return,
            "esc" => Self::Escape,
            "backspace" => Self::Backspace,
            "delete" => Self::Delete,
            _ => {
                let n: u8 = name.strip_prefix('f')?.parse().ok()?;
                Self::F(FunctionKey::new(n)?)
            }
        };
        Some(key)
    }

    /// Virtual key code for this key
    pub fn code(self) -> KeyCode {
        match self {
            Self::Left => codes::LEFT_ARROW,
            Self::Right => codes::RIGHT_ARROW,
            Self::Up => codes::UP_ARROW,
            Self::Down => codes::DOWN_ARROW,
            Self::Space => codes::SPACE,
            Self::Tab => codes::TAB,
            Self::Return => codes::RETURN,
            Self::Escape => codes::ESCAPE,
            Self::Backspace => codes::BACKSPACE,
            Self::Delete => codes::FORWARD_DELETE,
            Self::F(n) => {
                const F_KEYS: [KeyCode; 12] = [
                    codes::F1,
                    codes::F2,
                    codes::F3,
                    codes::F4,
                    codes::F5,
                    codes::F6,
                    codes::F7,
                    codes::F8,
                    codes::F9,
                    codes::F10,
                    codes::F11,
                    codes::F12,
                ];
                F_KEYS[usize::from(n.number() - 1)]
            }
        }
    }
}

impl fmt::Display for NamedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "<left>"),
            Self::Right => write!(f, "<right>"),
            Self::Up => write!(f, "<up>"),
            Self::Down => write!(f, "<down>"),
            Self::Space => write!(f, "<space>"),
            Self::Tab => write!(f, "<tab>"),
            Self::Return => write!(f, "<enter>"),
            Self::Escape => write!(f, "<esc>"),
            Self::Backspace => write!(f, "<backspace>"),
            Self::Delete => write!(f, "<delete>"),
            Self::F(n) => write!(f, "<f{}>", n.number()),
        }
    }
}

/// A single key, either a printable character or a named key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Named(NamedKey),
}

impl Key {
    /// Virtual key code, or None for characters off the ANSI layout
    pub fn code(self) -> Option<KeyCode> {
        match self {
            Key::Char(c) => char_keystroke(c).map(|(code, _)| code),
            Key::Named(named) => Some(named.code()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c),
            Key::Named(named) => write!(f, "{}", named),
        }
    }
}

/// Shifted symbols paired with the character on the same key
const SHIFTED_SYMBOLS: [(char, char); 20] = [
    ('~', '`'),
    ('!', '1'),
    ('@', '2'),
    ('#', '3'),
    ('$', '4'),
    ('%', '5'),
    ('^', '6'),
    ('&', '7'),
    ('*', '8'),
    ('(', '9'),
    (')', '0'),
    ('_', '-'),
    ('+', '='),
    ('{', '['),
    ('}', ']'),
    ('|', '\\'),
    (':', ';'),
    ('"', '\''),
    ('<', ','),
    ('>', '.'),
];

/// Character typed by the same key without Shift, for shifted symbols
fn unshifted_symbol(c: char) -> Option<char> {
    SHIFTED_SYMBOLS
        .iter()
        .find(|(shifted, _)| *shifted == c)
        .map(|(_, base)| *base)
}

/// Map a character to its ANSI key code and whether Shift is needed
pub fn char_keystroke(c: char) -> Option<(KeyCode, bool)> {
    use codes::*;

    if let Some(base) = unshifted_symbol(c) {
        return char_keystroke(base).map(|(code, _)| (code, true));
    }

    let lower = c.to_ascii_lowercase();
    let shifted = c.is_ascii_uppercase();
    let code = match lower {
        'a' => A,
        'b' => B,
        'c' => C,
        'd' => D,
        'e' => E,
        'f' => F,
        'g' => G,
        'h' => H,
        'i' => I,
        'j' => J,
        'k' => K,
        'l' => L,
        'm' => M,
        'n' => N,
        'o' => O,
        'p' => P,
        'q' => Q,
        'r' => R,
        's' => S,
        't' => T,
        'u' => U,
        'v' => V,
        'w' => W,
        'x' => X,
        'y' => Y,
        'z' => Z,
        '0' => NUM_0,
        '1' => NUM_1,
        '2' => NUM_2,
        '3' => NUM_3,
        '4' => NUM_4,
        '5' => NUM_5,
        '6' => NUM_6,
        '7' => NUM_7,
        '8' => NUM_8,
        '9' => NUM_9,
        '`' => GRAVE,
        '-' => MINUS,
        '=' => EQUAL,
        '[' => LEFT_BRACKET,
        ']' => RIGHT_BRACKET,
        '\\' => BACKSLASH,
        ';' => SEMICOLON,
        '\'' => QUOTE,
        ',' => COMMA,
        '.' => PERIOD,
        '/' => SLASH,
        ' ' => SPACE,
        _ => return None,
    };
    Some((code, shifted))
}

/// A physical key-down observed by the event tap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub code: KeyCode,
    pub modifiers: ModifierState,
}

impl KeyPress {
    pub fn new(code: KeyCode, modifiers: ModifierState) -> Self {
        Self { code, modifiers }
    }
}

/// Errors from parsing a key-combination string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComboParseError {
    #[error("key combination is empty")]
    Empty,

    #[error("empty token in key combination {0:?}")]
    EmptyToken(String),

    #[error("unknown key token {0:?}")]
    UnknownToken(String),

    #[error("character {0:?} has no key on the ANSI layout")]
    UnmappedChar(char),

    #[error("modifier {0} given more than once")]
    DuplicateModifier(String),

    #[error("key combination {0:?} has no non-modifier key")]
    MissingKey(String),

    #[error("key combination {0:?} has more than one non-modifier key")]
    MultipleKeys(String),
}

/// A set of modifiers plus exactly one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub modifiers: ModifierState,
    pub key: Key,
}

impl KeyCombo {
    /// Check whether a key-down is exactly this combination
    ///
    /// Extra held modifiers prevent a match.
    pub fn matches(&self, press: &KeyPress) -> bool {
        self.key.code() == Some(press.code) && self.modifiers == press.modifiers
    }

    /// Check whether both combinations fire on the same key-down
    pub fn same_trigger(&self, other: &KeyCombo) -> bool {
        self.key.code() == other.key.code() && self.modifiers == other.modifiers
    }
}

impl FromStr for KeyCombo {
    type Err = ComboParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ComboParseError::Empty);
        }

        let mut modifiers = ModifierState::default();
        let mut key: Option<Key> = None;

        for token in s.split('+') {
            let token = token.trim();
            if token.is_empty() {
                return Err(ComboParseError::EmptyToken(s.to_string()));
            }

            let modifier = match token {
                "<cmd>" => Some(&mut modifiers.command),
                "<alt>" | "<option>" => Some(&mut modifiers.option),
                "<ctrl>" => Some(&mut modifiers.control),
                "<shift>" => Some(&mut modifiers.shift),
                _ => None,
            };
            if let Some(held) = modifier {
                if *held {
                    return Err(ComboParseError::DuplicateModifier(token.to_string()));
                }
                *held = true;
                continue;
            }

            let parsed = parse_key_token(token)?;
            if key.replace(parsed).is_some() {
                return Err(ComboParseError::MultipleKeys(s.to_string()));
            }
        }

        let mut key = key.ok_or_else(|| ComboParseError::MissingKey(s.to_string()))?;

        // `~` is Shift+` on the keyboard, so store it that way
        if let Key::Char(c) = key {
            if let Some(base) = unshifted_symbol(c) {
                key = Key::Char(base);
                modifiers.shift = true;
            }
        }

        Ok(Self { modifiers, key })
    }
}

fn parse_key_token(token: &str) -> Result<Key, ComboParseError> {
    if let Some(name) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return NamedKey::from_name(&name.to_ascii_lowercase())
            .map(Key::Named)
            .ok_or_else(|| ComboParseError::UnknownToken(token.to_string()));
    }

    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => {
            let c = c.to_ascii_lowercase();
            if char_keystroke(c).is_none() {
                return Err(ComboParseError::UnmappedChar(c));
            }
            Ok(Key::Char(c))
        }
        _ => Err(ComboParseError::UnknownToken(token.to_string())),
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.control {
            write!(f, "<ctrl>+")?;
        }
        if self.modifiers.command {
            write!(f, "<cmd>+")?;
        }
        if self.modifiers.option {
            write!(f, "<alt>+")?;
        }
        if self.modifiers.shift {
            write!(f, "<shift>+")?;
        }
        write!(f, "{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state() {
        let state = ModifierState::default();
        assert!(state.is_empty());
        assert!(!ModifierState::shift_only().is_empty());
    }

    #[test]
    fn test_parse_activation_combo() {
        let combo: KeyCombo = "<cmd>+<alt>+s".parse().unwrap();
        assert!(combo.modifiers.command);
        assert!(combo.modifiers.option);
        assert!(!combo.modifiers.control);
        assert!(!combo.modifiers.shift);
        assert_eq!(combo.key, Key::Char('s'));
        assert_eq!(combo.key.code(), Some(codes::S));
    }

    #[test]
    fn test_parse_is_order_independent() {
        let a: KeyCombo = "<ctrl>+<cmd>+q".parse().unwrap();
        let b: KeyCombo = "q+<cmd>+<ctrl>".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_display_is_canonical() {
        let combo: KeyCombo = "<alt>+<cmd>+S".parse().unwrap();
        assert_eq!(combo.to_string(), "<cmd>+<alt>+s");

        let combo: KeyCombo = "<cmd>+<ctrl>+q".parse().unwrap();
        assert_eq!(combo.to_string(), "<ctrl>+<cmd>+q");

        let combo: KeyCombo = "<option>+<F5>".parse().unwrap();
        assert_eq!(combo.to_string(), "<alt>+<f5>");
    }

    #[test]
    fn test_parse_named_keys() {
        let combo: KeyCombo = "<shift>+<left>".parse().unwrap();
        assert_eq!(combo.key, Key::Named(NamedKey::Left));
        assert_eq!(combo.key.code(), Some(codes::LEFT_ARROW));

        let combo: KeyCombo = "<ctrl>+<f12>".parse().unwrap();
        assert_eq!(combo.key.code(), Some(codes::F12));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<KeyCombo>(), Err(ComboParseError::Empty));
        assert!(matches!(
            "<cmd>++s".parse::<KeyCombo>(),
            Err(ComboParseError::EmptyToken(_))
        ));
        assert!(matches!(
            "<hyper>+s".parse::<KeyCombo>(),
            Err(ComboParseError::UnknownToken(_))
        ));
        assert!(matches!(
            "<cmd>+<cmd>+s".parse::<KeyCombo>(),
            Err(ComboParseError::DuplicateModifier(_))
        ));
        assert!(matches!(
            "<cmd>+<alt>".parse::<KeyCombo>(),
            Err(ComboParseError::MissingKey(_))
        ));
        assert!(matches!(
            "<cmd>+s+q".parse::<KeyCombo>(),
            Err(ComboParseError::MultipleKeys(_))
        ));
        assert!(matches!(
            "<cmd>+é".parse::<KeyCombo>(),
            Err(ComboParseError::UnmappedChar('é'))
        ));
        assert!(matches!(
            "<cmd>+<f13>".parse::<KeyCombo>(),
            Err(ComboParseError::UnknownToken(_))
        ));
    }

    #[test]
    fn test_matches_requires_exact_modifiers() {
        let combo: KeyCombo = "<cmd>+<alt>+s".parse().unwrap();
        let exact = ModifierState {
            command: true,
            option: true,
            ..ModifierState::default()
        };
        assert!(combo.matches(&KeyPress::new(codes::S, exact)));

        let extra_shift = ModifierState { shift: true, ..exact };
        assert!(!combo.matches(&KeyPress::new(codes::S, extra_shift)));

        let missing_option = ModifierState {
            command: true,
            ..ModifierState::default()
        };
        assert!(!combo.matches(&KeyPress::new(codes::S, missing_option)));
        assert!(!combo.matches(&KeyPress::new(codes::D, exact)));
    }

    #[test]
    fn test_shifted_symbol_implies_shift() {
        let combo: KeyCombo = "<cmd>+~".parse().unwrap();
        assert_eq!(combo.key, Key::Char('`'));
        assert!(combo.modifiers.shift);
        assert_eq!(combo.to_string(), "<cmd>+<shift>+`");

        let command = ModifierState {
            command: true,
            ..ModifierState::default()
        };
        let command_shift = ModifierState { shift: true, ..command };
        assert!(combo.matches(&KeyPress::new(codes::GRAVE, command_shift)));
        assert!(!combo.matches(&KeyPress::new(codes::GRAVE, command)));

        let explicit: KeyCombo = "<cmd>+<shift>+~".parse().unwrap();
        assert_eq!(explicit, combo);
    }

    #[test]
    fn test_same_trigger() {
        let backtick: KeyCombo = "<ctrl>+<cmd>+`".parse().unwrap();
        let tilde: KeyCombo = "<ctrl>+<cmd>+~".parse().unwrap();
        let shift_backtick: KeyCombo = "<ctrl>+<cmd>+<shift>+`".parse().unwrap();
        assert!(!backtick.same_trigger(&tilde));
        assert!(tilde.same_trigger(&shift_backtick));
    }

    #[test]
    fn test_function_key_range() {
        assert!(FunctionKey::new(0).is_none());
        assert!(FunctionKey::new(13).is_none());
        let f1 = FunctionKey::new(1).unwrap();
        assert_eq!(NamedKey::F(f1).code(), codes::F1);
        assert_eq!(NamedKey::F(f1).to_string(), "<f1>");
    }

    #[test]
    fn test_char_keystroke() {
        assert_eq!(char_keystroke('~'), Some((codes::GRAVE, true)));
        assert_eq!(char_keystroke('`'), Some((codes::GRAVE, false)));
        assert_eq!(char_keystroke('S'), Some((codes::S, true)));
        assert_eq!(char_keystroke('s'), Some((codes::S, false)));
        assert_eq!(char_keystroke('ß'), None);
    }
}
