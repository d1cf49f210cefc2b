//! Frontend hotkeys and their resolution from key binds

use bitflags::bitflags;
use hashbrown::HashMap;
use retrohost_shared::Key;

bitflags! {
    /// Hotkeys held during one tick.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Hotkeys: u32 {
        const FAST_FORWARD = 1 << 0;
        const FAST_FORWARD_HOLD = 1 << 1;
        const LOAD_STATE = 1 << 2;
        const SAVE_STATE = 1 << 3;
        const FULLSCREEN_TOGGLE = 1 << 4;
        const QUIT = 1 << 5;
        const STATE_SLOT_PLUS = 1 << 6;
        const STATE_SLOT_MINUS = 1 << 7;
        const REWIND = 1 << 8;
        const PAUSE_TOGGLE = 1 << 9;
        const FRAMEADVANCE = 1 << 10;
        const RESET = 1 << 11;
        const CHEAT_INDEX_PLUS = 1 << 12;
        const CHEAT_INDEX_MINUS = 1 << 13;
        const CHEAT_TOGGLE = 1 << 14;
        const SCREENSHOT = 1 << 15;
        const MUTE = 1 << 16;
        const NETPLAY_FLIP = 1 << 17;
        const SLOWMOTION = 1 << 18;
        const GRAB_MOUSE_TOGGLE = 1 << 19;
        const GAME_FOCUS_TOGGLE = 1 << 20;
        const MENU_TOGGLE = 1 << 21;
        const DISK_EJECT_TOGGLE = 1 << 22;
        const DISK_NEXT = 1 << 23;
        const DISK_PREV = 1 << 24;
    }
}

/// Config names of each hotkey.
const NAMES: [(&str, Hotkeys); 25] = [
    ("fast_forward", Hotkeys::FAST_FORWARD),
    ("fast_forward_hold", Hotkeys::FAST_FORWARD_HOLD),
    ("load_state", Hotkeys::LOAD_STATE),
    ("save_state", Hotkeys::SAVE_STATE),
    ("fullscreen_toggle", Hotkeys::FULLSCREEN_TOGGLE),
    ("quit", Hotkeys::QUIT),
    ("state_slot_plus", Hotkeys::STATE_SLOT_PLUS),
    ("state_slot_minus", Hotkeys::STATE_SLOT_MINUS),
    ("rewind", Hotkeys::REWIND),
    ("pause_toggle", Hotkeys::PAUSE_TOGGLE),
    ("frameadvance", Hotkeys::FRAMEADVANCE),
    ("reset", Hotkeys::RESET),
    ("cheat_index_plus", Hotkeys::CHEAT_INDEX_PLUS),
    ("cheat_index_minus", Hotkeys::CHEAT_INDEX_MINUS),
    ("cheat_toggle", Hotkeys::CHEAT_TOGGLE),
    ("screenshot", Hotkeys::SCREENSHOT),
    ("mute", Hotkeys::MUTE),
    ("netplay_flip", Hotkeys::NETPLAY_FLIP),
    ("slowmotion", Hotkeys::SLOWMOTION),
    ("grab_mouse_toggle", Hotkeys::GRAB_MOUSE_TOGGLE),
    ("game_focus_toggle", Hotkeys::GAME_FOCUS_TOGGLE),
    ("menu_toggle", Hotkeys::MENU_TOGGLE),
    ("disk_eject_toggle", Hotkeys::DISK_EJECT_TOGGLE),
    ("disk_next", Hotkeys::DISK_NEXT),
    ("disk_prev", Hotkeys::DISK_PREV),
];

impl Hotkeys {
    pub fn from_config_name(name: &str) -> Option<Self> {
        NAMES.iter().find(|(n, _)| *n == name).map(|(_, h)| *h)
    }

    pub fn config_name(self) -> Option<&'static str> {
        NAMES.iter().find(|(_, h)| *h == self).map(|(n, _)| *n)
    }
}

/// Hotkeys whose bound key is down.
pub fn resolve(binds: &HashMap<String, Key>, mut pressed: impl FnMut(Key) -> bool) -> Hotkeys {
    let mut held = Hotkeys::empty();
    for (name, key) in binds {
        let Some(hotkey) = Hotkeys::from_config_name(name) else {
            tracing::trace!(%name, "Unknown hotkey bind");
            continue;
        };
        if pressed(*key) {
            held |= hotkey;
        }
    }
    held
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for (name, hotkey) in NAMES {
            assert_eq!(Hotkeys::from_config_name(name), Some(hotkey));
            assert_eq!(hotkey.config_name(), Some(name));
        }
        assert!(Hotkeys::from_config_name("bogus").is_none());
    }

    #[test]
    fn test_resolve_only_pressed() {
        let mut binds = HashMap::new();
        binds.insert("pause_toggle".to_string(), Key::ascii(b'p'));
        binds.insert("quit".to_string(), Key::ESCAPE);
        binds.insert("bogus".to_string(), Key::ascii(b'z'));

        let held = resolve(&binds, |k| k == Key::ascii(b'p') || k == Key::ascii(b'z'));
        assert_eq!(held, Hotkeys::PAUSE_TOGGLE);
    }
}
