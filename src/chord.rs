//! Key normalization for unlock-chord detection.
//!
//! While the keyboard is suppressed, every raw key event is reduced to a
//! `ChordKey` symbol (`Ctrl`, `Alt`, or a lowercase character). The unlock
//! chord fires once `ctrl`, `alt` and `u` are held simultaneously.
//!
//! Normalization is a fallback chain: named modifiers first, then the
//! printable character the platform reports, then the named letter key /
//! raw code. The later steps matter because some platforms stop reporting
//! the character once modifiers are held (observed for `U` under ctrl+alt).

use rdev::Key;

/// Normalized key symbol used for chord tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChordKey {
    Ctrl,
    Alt,
    Char(char),
}

/// The unlock chord: ctrl + alt + u.
pub const UNLOCK_CHORD: [ChordKey; 3] = [ChordKey::Ctrl, ChordKey::Alt, ChordKey::Char('u')];

/// Raw key data as delivered by the platform hook: the named key identity
/// plus the printable character, when the platform reports one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKey {
    pub key: Key,
    pub ch: Option<char>,
}

impl RawKey {
    pub fn new(key: Key, ch: Option<char>) -> Self {
        Self { key, ch }
    }
}

/// Reduce a raw key to a chord symbol, or `None` if it is irrelevant to
/// chord tracking.
pub fn normalize(raw: &RawKey) -> Option<ChordKey> {
    // Named modifiers. Ctrl and alt are chord symbols; every other modifier
    // is ignored outright (it must not fall through to the character step).
    match raw.key {
        Key::ControlLeft | Key::ControlRight => return Some(ChordKey::Ctrl),
        Key::Alt | Key::AltGr => return Some(ChordKey::Alt),
        Key::ShiftLeft
        | Key::ShiftRight
        | Key::MetaLeft
        | Key::MetaRight
        | Key::CapsLock
        | Key::Function => return None,
        _ => {}
    }

    // Printable character reported by the platform.
    if let Some(ch) = raw.ch {
        if !ch.is_control() {
            return Some(ChordKey::Char(ch.to_ascii_lowercase()));
        }
    }

    // Named letter key. Covers the case where the character is suppressed
    // because modifiers are held.
    if let Some(ch) = letter_of(raw.key) {
        return Some(ChordKey::Char(ch));
    }

    // Raw codes in the ASCII letter range (some platforms only expose these).
    if let Key::Unknown(code) = raw.key {
        if let 65..=90 | 97..=122 = code {
            return Some(ChordKey::Char((code as u8).to_ascii_lowercase() as char));
        }
    }

    None
}

/// Letter for a named letter key.
fn letter_of(key: Key) -> Option<char> {
    let ch = match key {
        Key::KeyA => 'a',
        Key::KeyB => 'b',
        Key::KeyC => 'c',
        Key::KeyD => 'd',
        Key::KeyE => 'e',
        Key::KeyF => 'f',
        Key::KeyG => 'g',
        Key::KeyH => 'h',
        Key::KeyI => 'i',
        Key::KeyJ => 'j',
        Key::KeyK => 'k',
        Key::KeyL => 'l',
        Key::KeyM => 'm',
        Key::KeyN => 'n',
        Key::KeyO => 'o',
        Key::KeyP => 'p',
        Key::KeyQ => 'q',
        Key::KeyR => 'r',
        Key::KeyS => 's',
        Key::KeyT => 't',
        Key::KeyU => 'u',
        Key::KeyV => 'v',
        Key::KeyW => 'w',
        Key::KeyX => 'x',
        Key::KeyY => 'y',
        Key::KeyZ => 'z',
        _ => return None,
    };
    Some(ch)
}
