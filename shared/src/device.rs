//! Input device, button and memory identifiers.
//!
//! A device id is a base class in the low byte, optionally combined with a
//! subclass via [`subclass`]. Cores query input with
//! `(port, device, index, id)` tuples built from these constants.

/// No device plugged into the port.
pub const NONE: u32 = 0;
/// RetroPad style digital joypad.
pub const JOYPAD: u32 = 1;
/// Relative mouse.
pub const MOUSE: u32 = 2;
/// Full keyboard.
pub const KEYBOARD: u32 = 3;
/// Light gun with screen-relative coordinates.
pub const LIGHTGUN: u32 = 4;
/// Joypad with two analog sticks and analog buttons.
pub const ANALOG: u32 = 5;
/// Absolute pointer / touch screen.
pub const POINTER: u32 = 6;

/// Mask that extracts the base class from a device id.
pub const DEVICE_MASK: u32 = 0xff;

/// Build a device subclass from a base class.
pub const fn subclass(base: u32, id: u32) -> u32 {
    ((id + 1) << 8) | base
}

/// Base class of a (possibly subclassed) device id.
pub const fn base(device: u32) -> u32 {
    device & DEVICE_MASK
}

/// True for device classes the preemptive-frames engine shadows as a pointer.
pub const fn is_pointing(device: u32) -> bool {
    matches!(base(device), MOUSE | LIGHTGUN | POINTER)
}

/// Joypad button ids.
pub mod joypad {
    pub const B: u32 = 0;
    pub const Y: u32 = 1;
    pub const SELECT: u32 = 2;
    pub const START: u32 = 3;
    pub const UP: u32 = 4;
    pub const DOWN: u32 = 5;
    pub const LEFT: u32 = 6;
    pub const RIGHT: u32 = 7;
    pub const A: u32 = 8;
    pub const X: u32 = 9;
    pub const L: u32 = 10;
    pub const R: u32 = 11;
    pub const L2: u32 = 12;
    pub const R2: u32 = 13;
    pub const L3: u32 = 14;
    pub const R3: u32 = 15;

    /// Query id that returns every button of the port as a bitmask.
    pub const MASK: u32 = 256;

    /// Number of digital joypad buttons.
    pub const COUNT: usize = 16;

    /// Human-readable names, indexed by button id.
    pub const NAMES: [&str; COUNT] = [
        "B (bottom)",
        "Y (left)",
        "Select",
        "Start",
        "D-Pad Up",
        "D-Pad Down",
        "D-Pad Left",
        "D-Pad Right",
        "A (right)",
        "X (up)",
        "L",
        "R",
        "L2",
        "R2",
        "L3",
        "R3",
    ];

    /// Bit for a single button id within a joypad mask.
    pub const fn bit(id: u32) -> u16 {
        1 << id
    }
}

/// Analog stick indices and axis ids.
pub mod analog {
    pub const INDEX_LEFT: u32 = 0;
    pub const INDEX_RIGHT: u32 = 1;
    pub const INDEX_BUTTON: u32 = 2;

    pub const ID_X: u32 = 0;
    pub const ID_Y: u32 = 1;

    /// Number of stick axes (left x/y, right x/y).
    pub const AXES: usize = 4;

    /// Stick channels plus one analog channel per joypad button.
    pub const CHANNELS: usize = AXES + super::joypad::COUNT;

    /// Flatten `(index, id)` into a channel number below [`CHANNELS`].
    pub const fn channel(index: u32, id: u32) -> Option<usize> {
        match index {
            INDEX_LEFT | INDEX_RIGHT if id <= ID_Y => Some((index * 2 + id) as usize),
            INDEX_BUTTON if (id as usize) < super::joypad::COUNT => Some(AXES + id as usize),
            _ => None,
        }
    }
}

/// Pointer / mouse / light gun channel ids shared by all pointing classes.
pub mod pointer {
    pub const X: u32 = 0;
    pub const Y: u32 = 1;
    pub const PRESSED: u32 = 2;
    pub const COUNT: u32 = 3;

    /// Channels shadowed per port for pointing devices.
    pub const CHANNELS: usize = 4;
}

/// Memory region ids exposed through `get_memory_data` / `get_memory_size`.
pub mod memory {
    pub const SAVE_RAM: u32 = 0;
    pub const RTC: u32 = 1;
    pub const SYSTEM_RAM: u32 = 2;
    pub const VIDEO_RAM: u32 = 3;

    /// Regions persisted as save files, with their file extensions.
    pub const PERSISTENT: [(u32, &str); 2] = [(SAVE_RAM, "srm"), (RTC, "rtc")];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subclass_keeps_base() {
        let dual = subclass(JOYPAD, 1);
        assert_eq!(dual, 0x201);
        assert_eq!(base(dual), JOYPAD);
    }

    #[test]
    fn test_analog_channels() {
        assert_eq!(analog::channel(analog::INDEX_LEFT, analog::ID_X), Some(0));
        assert_eq!(analog::channel(analog::INDEX_RIGHT, analog::ID_Y), Some(3));
        assert_eq!(
            analog::channel(analog::INDEX_BUTTON, joypad::R3),
            Some(analog::CHANNELS - 1)
        );
        assert_eq!(analog::channel(analog::INDEX_LEFT, 2), None);
        assert_eq!(analog::channel(7, 0), None);
    }

    #[test]
    fn test_pointing_classes() {
        assert!(is_pointing(MOUSE));
        assert!(is_pointing(subclass(LIGHTGUN, 0)));
        assert!(!is_pointing(JOYPAD));
    }
}
