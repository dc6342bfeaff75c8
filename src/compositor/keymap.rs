//! US layout translation of evdev key codes

use crate::protocol::wire::{MOD_CTRL, MOD_SHIFT};

pub const KEY_ESC: u16 = 1;
pub const KEY_BACKSPACE: u16 = 14;
pub const KEY_ENTER: u16 = 28;
pub const KEY_LEFTCTRL: u16 = 29;
pub const KEY_LEFTSHIFT: u16 = 42;
pub const KEY_RIGHTSHIFT: u16 = 54;
pub const KEY_RIGHTCTRL: u16 = 97;

// Indexed by key code; 0 means no printable character.
const LOWER: &[u8; 58] = b"\0\x001234567890-=\0\tqwertyuiop[]\0\0asdfghjkl;'`\0\\zxcvbnm,./\0\0\0 ";
const UPPER: &[u8; 58] = b"\0\0!@#$%^&*()_+\0\tQWERTYUIOP{}\0\0ASDFGHJKL:\"~\0|ZXCVBNM<>?\0\0\0 ";

/// Held modifier keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

impl Modifiers {
    /// New state if `code` is a modifier key, `None` otherwise
    pub fn update(self, code: u16, held: bool) -> Option<Modifiers> {
        match code {
            KEY_LEFTSHIFT | KEY_RIGHTSHIFT => Some(Modifiers { shift: held, ..self }),
            KEY_LEFTCTRL | KEY_RIGHTCTRL => Some(Modifiers { ctrl: held, ..self }),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.shift {
            bits |= MOD_SHIFT;
        }
        if self.ctrl {
            bits |= MOD_CTRL;
        }
        bits
    }
}

/// Character produced by `code` under `mods`; ctrl+letter yields 1..=26
pub fn translate(code: u16, mods: Modifiers) -> Option<u8> {
    let lower = *LOWER.get(code as usize)?;
    if lower == 0 {
        return None;
    }
    if mods.ctrl {
        return lower.is_ascii_lowercase().then(|| lower - b'a' + 1);
    }
    if mods.shift {
        return Some(UPPER[code as usize]);
    }
    Some(lower)
}
