//! Joypad-to-keyboard translation for ports configured as keyboards
//!
//! Each of the 16 joypad buttons and 8 analog half-axes may drive any number
//! of keyboard keys; a key belongs to at most one button. Button transitions
//! on port 0 become key events for the core's keyboard callback.

use hashbrown::HashMap;
use retrohost_shared::device::{analog, joypad};
use retrohost_shared::{Key, KeyModifiers};
use smallvec::SmallVec;

use super::remap::{HALF_AXIS_KEYS, REMAP_KEYS};

/// Joypad buttons followed by analog half-axes.
pub const BUTTONS: usize = joypad::COUNT + analog::AXES * 2;

/// Analog deflection counted as "pressed".
pub const AXIS_THRESHOLD: i16 = 0x4000;

/// Button index for a bind name (`a`, `start`, `l_x_plus`, ...).
pub fn button_index(name: &str) -> Option<usize> {
    REMAP_KEYS[..joypad::COUNT]
        .iter()
        .chain(HALF_AXIS_KEYS.iter())
        .position(|n| *n == name)
}

/// A key transition produced for the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub down: bool,
    pub key: Key,
    pub character: u32,
    pub modifiers: KeyModifiers,
}

#[derive(Debug, Clone)]
pub struct JoyKbd {
    binds: Vec<SmallVec<[Key; 2]>>,
    owner: HashMap<Key, usize>,
    /// Button bits seen on the previous poll.
    previous: u32,
    keys_down: Vec<bool>,
    events: Vec<KeyEvent>,
}

impl Default for JoyKbd {
    fn default() -> Self {
        Self {
            binds: vec![SmallVec::new(); BUTTONS],
            owner: HashMap::new(),
            previous: 0,
            keys_down: vec![false; Key::LAST],
            events: Vec::new(),
        }
    }
}

impl JoyKbd {
    /// Build from `button name -> keys` config binds.
    pub fn from_binds(binds: &hashbrown::HashMap<String, Vec<Key>>) -> Self {
        let mut joykbd = Self::default();
        for (name, keys) in binds {
            let Some(button) = button_index(name) else {
                tracing::warn!(%name, "Unknown joypad button in keyboard binds");
                continue;
            };
            for key in keys {
                joykbd.bind(button, *key);
            }
        }
        joykbd
    }

    /// Bind `key` to `button`, moving it off any button it was bound to.
    pub fn bind(&mut self, button: usize, key: Key) {
        if button >= BUTTONS {
            return;
        }
        self.unbind(key);
        self.binds[button].push(key);
        self.owner.insert(key, button);
    }

    pub fn unbind(&mut self, key: Key) {
        if let Some(button) = self.owner.remove(&key) {
            self.binds[button].retain(|k| *k != key);
        }
    }

    pub fn keys_for(&self, button: usize) -> &[Key] {
        self.binds.get(button).map_or(&[], |k| k.as_slice())
    }

    pub fn button_for(&self, key: Key) -> Option<usize> {
        self.owner.get(&key).copied()
    }

    /// Mask of buttons with at least one bound key.
    pub fn bound_mask(&self) -> u32 {
        self.binds
            .iter()
            .enumerate()
            .filter(|(_, keys)| !keys.is_empty())
            .fold(0, |mask, (i, _)| mask | (1 << i))
    }

    /// Feed one frame of button state; `read` is only asked about bound
    /// buttons.
    pub fn poll(&mut self, mut read: impl FnMut(usize) -> bool) {
        let bound = self.bound_mask();
        let mut current = 0u32;
        for button in 0..BUTTONS {
            if bound & (1 << button) != 0 && read(button) {
                current |= 1 << button;
            }
        }

        let changed = current ^ self.previous;
        for button in 0..BUTTONS {
            if changed & (1 << button) == 0 {
                continue;
            }
            let down = current & (1 << button) != 0;
            for &key in &self.binds[button] {
                if let Some(idx) = key.index() {
                    self.keys_down[idx] = down;
                }
                self.events.push(KeyEvent {
                    down,
                    key,
                    character: if down { key.character() } else { 0 },
                    modifiers: KeyModifiers::empty(),
                });
            }
        }
        self.previous = current;
    }

    /// Whether a translated key is currently held.
    pub fn key_down(&self, key: Key) -> bool {
        key.index().is_some_and(|idx| self.keys_down[idx])
    }

    pub fn take_events(&mut self) -> Vec<KeyEvent> {
        std::mem::take(&mut self.events)
    }

    /// Release everything without emitting events.
    pub fn clear_state(&mut self) {
        self.previous = 0;
        self.keys_down.fill(false);
        self.events.clear();
    }
}

/// Whether half-axis button `button` (>= 16) is deflected in `value`.
pub fn half_axis_pressed(button: usize, value: i16) -> bool {
    if (button - joypad::COUNT) % 2 == 0 {
        value >= AXIS_THRESHOLD
    } else {
        value <= -AXIS_THRESHOLD
    }
}

/// Stick `(index, id)` read by half-axis button `button` (>= 16).
pub fn half_axis_source(button: usize) -> (u32, u32) {
    let axis = ((button - joypad::COUNT) / 2) as u32;
    (axis / 2, axis % 2)
}
