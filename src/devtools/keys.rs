//! Devtools trigger key combinations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    F12,
    Char(char),
    Named(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    /// Cmd on macOS, Super/Windows elsewhere
    pub meta: bool,
}

/// A key-down as seen at the capture phase, before default handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub fn f12() -> Self {
        Self::new(Key::F12, Modifiers::default())
    }
}

/// Parses chords like `F12`, `ctrl+shift+i`, `cmd+option+j`.
impl FromStr for KeyEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut modifiers = Modifiers::default();
        let mut key = None;

        for part in s.split('+').map(str::trim).filter(|p| !p.is_empty()) {
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "shift" => modifiers.shift = true,
                "alt" | "option" | "opt" => modifiers.alt = true,
                "meta" | "cmd" | "command" | "super" => modifiers.meta = true,
                "f12" => key = Some(Key::F12),
                other => {
                    let mut chars = other.chars();
                    key = match (chars.next(), chars.next()) {
                        (Some(c), None) => Some(Key::Char(c)),
                        _ => Some(Key::Named(part.to_string())),
                    };
                }
            }
        }

        key.map(|key| KeyEvent { key, modifiers })
            .ok_or_else(|| format!("no key in '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DevKey {
    I,
    J,
    C,
    D,
}

impl DevKey {
    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'I' => Some(DevKey::I),
            'J' => Some(DevKey::J),
            'C' => Some(DevKey::C),
            'D' => Some(DevKey::D),
            _ => None,
        }
    }

    fn as_char(&self) -> char {
        match self {
            DevKey::I => 'I',
            DevKey::J => 'J',
            DevKey::C => 'C',
            DevKey::D => 'D',
        }
    }
}

/// A key combination that opens debugging tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerCombo {
    F12,
    /// Ctrl+Shift (Windows/Linux) or Cmd+Shift
    ModShift(DevKey),
    /// Cmd+Option (macOS)
    CmdOption(DevKey),
}

impl TriggerCombo {
    pub fn detect(event: &KeyEvent) -> Option<Self> {
        let m = event.modifiers;
        match &event.key {
            Key::F12 => Some(TriggerCombo::F12),
            Key::Char(c) => {
                let dev_key = DevKey::from_char(*c)?;
                if (m.ctrl || m.meta) && m.shift {
                    Some(TriggerCombo::ModShift(dev_key))
                } else if m.meta && m.alt {
                    Some(TriggerCombo::CmdOption(dev_key))
                } else {
                    None
                }
            }
            Key::Named(_) => None,
        }
    }
}

impl fmt::Display for TriggerCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerCombo::F12 => write!(f, "F12"),
            TriggerCombo::ModShift(k) => write!(f, "Ctrl+Shift+{}", k.as_char()),
            TriggerCombo::CmdOption(k) => write!(f, "Cmd+Option+{}", k.as_char()),
        }
    }
}
