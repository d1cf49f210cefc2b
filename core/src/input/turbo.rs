//! Turbo fire
//!
//! While a turbo button is held the emitted state alternates, on for the first
//! half of each period and off for the second. A fresh press restarts the
//! pattern so the first frame of a press always registers.

use retrohost_shared::device::joypad;

/// Buttons affected by "turbo all".
pub const TURBOABLE: u16 = joypad::bit(joypad::A)
    | joypad::bit(joypad::B)
    | joypad::bit(joypad::X)
    | joypad::bit(joypad::Y)
    | joypad::bit(joypad::L)
    | joypad::bit(joypad::R)
    | joypad::bit(joypad::L2)
    | joypad::bit(joypad::R2);

/// Which buttons of a port get turbo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurboMode {
    #[default]
    Unbound,
    /// Every button in [`TURBOABLE`].
    All,
    /// A single joypad button id.
    Button(u32),
}

impl TurboMode {
    /// Persisted form: `-1` unbound, `-2` all, otherwise a button id.
    pub fn to_raw(self) -> i64 {
        match self {
            Self::Unbound => -1,
            Self::All => -2,
            Self::Button(id) => i64::from(id),
        }
    }

    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            -1 => Some(Self::Unbound),
            -2 => Some(Self::All),
            id if (0..joypad::COUNT as i64).contains(&id) => Some(Self::Button(id as u32)),
            _ => None,
        }
    }

    fn mask(self) -> u16 {
        match self {
            Self::Unbound => 0,
            Self::All => TURBOABLE,
            Self::Button(id) => joypad::bit(id),
        }
    }
}

/// Per-port turbo counters.
#[derive(Debug, Clone, Default)]
pub struct TurboState {
    counters: [u32; joypad::COUNT],
    previous: u16,
}

impl TurboState {
    /// Apply turbo to one frame of pressed buttons.
    pub fn apply(&mut self, mode: TurboMode, period: u32, pressed: u16) -> u16 {
        let mask = mode.mask();
        let period = period.max(2);
        let rising = pressed & !self.previous;
        self.previous = pressed;

        let mut out = pressed & !mask;
        for id in 0..joypad::COUNT {
            let bit = 1u16 << id;
            if mask & bit == 0 || pressed & bit == 0 {
                continue;
            }
            if rising & bit != 0 {
                self.counters[id] = 0;
            }
            if self.counters[id] % period < period / 2 {
                out |= bit;
            }
            self.counters[id] = self.counters[id].wrapping_add(1);
        }
        out
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
