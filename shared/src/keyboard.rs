//! Keyboard key codes as seen by cores.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A core-facing keyboard key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(pub u16);

impl Key {
    pub const UNKNOWN: Key = Key(0);
    pub const BACKSPACE: Key = Key(8);
    pub const TAB: Key = Key(9);
    pub const RETURN: Key = Key(13);
    pub const PAUSE: Key = Key(19);
    pub const ESCAPE: Key = Key(27);
    pub const SPACE: Key = Key(32);
    pub const DELETE: Key = Key(127);
    pub const UP: Key = Key(273);
    pub const DOWN: Key = Key(274);
    pub const RIGHT: Key = Key(275);
    pub const LEFT: Key = Key(276);
    pub const INSERT: Key = Key(277);
    pub const HOME: Key = Key(278);
    pub const END: Key = Key(279);
    pub const PAGEUP: Key = Key(280);
    pub const PAGEDOWN: Key = Key(281);
    pub const F1: Key = Key(282);
    pub const RSHIFT: Key = Key(303);
    pub const LSHIFT: Key = Key(304);
    pub const RCTRL: Key = Key(305);
    pub const LCTRL: Key = Key(306);
    pub const RALT: Key = Key(307);
    pub const LALT: Key = Key(308);

    /// One past the highest key code.
    pub const LAST: usize = 324;

    /// Key for an ASCII letter or digit.
    pub const fn ascii(c: u8) -> Key {
        Key(c.to_ascii_lowercase() as u16)
    }

    /// Function key `F{n}` for `n` in 1..=15.
    pub const fn function(n: u16) -> Key {
        Key(Self::F1.0 + n - 1)
    }

    pub fn code(self) -> u16 {
        self.0
    }

    /// Index into a `[_; Key::LAST]` table, if in range.
    pub fn index(self) -> Option<usize> {
        let idx = self.0 as usize;
        (idx > 0 && idx < Self::LAST).then_some(idx)
    }

    /// Unicode character produced by this key without modifiers.
    pub fn character(self) -> u32 {
        match self.0 {
            32..=126 => self.0 as u32,
            13 => '\n' as u32,
            _ => 0,
        }
    }

    /// Parse a config-file key name such as `"a"`, `"f5"`, `"enter"` or `"num1"`.
    pub fn from_name(name: &str) -> Option<Key> {
        let lower = name.trim().to_ascii_lowercase();
        let named = match lower.as_str() {
            "" | "nul" | "none" => return None,
            "backspace" => Key::BACKSPACE,
            "tab" => Key::TAB,
            "enter" | "return" => Key::RETURN,
            "pause" => Key::PAUSE,
            "escape" | "esc" => Key::ESCAPE,
            "space" => Key::SPACE,
            "del" | "delete" => Key::DELETE,
            "up" => Key::UP,
            "down" => Key::DOWN,
            "left" => Key::LEFT,
            "right" => Key::RIGHT,
            "insert" => Key::INSERT,
            "home" => Key::HOME,
            "end" => Key::END,
            "pageup" => Key::PAGEUP,
            "pagedown" => Key::PAGEDOWN,
            "rshift" => Key::RSHIFT,
            "shift" | "lshift" => Key::LSHIFT,
            "rctrl" => Key::RCTRL,
            "ctrl" | "lctrl" => Key::LCTRL,
            "ralt" => Key::RALT,
            "alt" | "lalt" => Key::LALT,
            other => {
                let bytes = other.as_bytes();
                if bytes.len() == 1 && bytes[0].is_ascii_alphanumeric() {
                    return Some(Key::ascii(bytes[0]));
                }
                if let Some(digit) = other.strip_prefix("num") {
                    let n: u8 = digit.parse().ok()?;
                    return (n <= 9).then(|| Key::ascii(b'0' + n));
                }
                if let Some(n) = other.strip_prefix('f') {
                    let n: u16 = n.parse().ok()?;
                    return (1..=15).contains(&n).then(|| Key::function(n));
                }
                return None;
            }
        };
        Some(named)
    }

    /// Config-file name for this key, the inverse of [`Key::from_name`].
    pub fn name(self) -> String {
        match self {
            Key::BACKSPACE => "backspace".into(),
            Key::TAB => "tab".into(),
            Key::RETURN => "enter".into(),
            Key::PAUSE => "pause".into(),
            Key::ESCAPE => "escape".into(),
            Key::SPACE => "space".into(),
            Key::DELETE => "del".into(),
            Key::UP => "up".into(),
            Key::DOWN => "down".into(),
            Key::LEFT => "left".into(),
            Key::RIGHT => "right".into(),
            Key::INSERT => "insert".into(),
            Key::HOME => "home".into(),
            Key::END => "end".into(),
            Key::PAGEUP => "pageup".into(),
            Key::PAGEDOWN => "pagedown".into(),
            Key::RSHIFT => "rshift".into(),
            Key::LSHIFT => "shift".into(),
            Key::RCTRL => "rctrl".into(),
            Key::LCTRL => "ctrl".into(),
            Key::RALT => "ralt".into(),
            Key::LALT => "alt".into(),
            Key(code @ 48..=57) => format!("num{}", code - 48),
            Key(code @ 97..=122) => ((code as u8) as char).to_string(),
            Key(code @ 282..=296) => format!("f{}", code - 281),
            Key(code) => format!("key{}", code),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        if let Some(code) = name.strip_prefix("key").and_then(|n| n.parse().ok()) {
            return Ok(Key(code));
        }
        Key::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown key name '{}'", name)))
    }
}

bitflags::bitflags! {
    /// Modifier state passed alongside key events.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct KeyModifiers: u16 {
        const SHIFT = 0x01;
        const CTRL = 0x02;
        const ALT = 0x04;
        const META = 0x08;
    }
}
