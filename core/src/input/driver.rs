//! Input driver contract
//!
//! Hardware input backends are external collaborators; the host only needs
//! to poll them once per tick and read individual channels.

use retrohost_shared::Key;
use retrohost_shared::device;

use crate::plugin::{RumbleEffect, SensorAction};

/// Device capability bits reported to cores by default.
pub const DEFAULT_CAPABILITIES: u64 = (1 << device::JOYPAD)
    | (1 << device::MOUSE)
    | (1 << device::KEYBOARD)
    | (1 << device::LIGHTGUN)
    | (1 << device::ANALOG)
    | (1 << device::POINTER);

/// A raw input backend.
pub trait InputDriver {
    fn name(&self) -> &str;

    /// Sample hardware; called once per tick.
    fn poll(&mut self);

    /// Raw state of one channel as of the last poll.
    fn state(&self, port: u32, device: u32, index: u32, id: u32) -> i16;

    /// Whether a host keyboard key is held, used for hotkeys.
    fn key_pressed(&self, _key: Key) -> bool {
        false
    }

    /// Bitmask of `1 << device` the backend can serve.
    fn capabilities(&self) -> u64 {
        DEFAULT_CAPABILITIES
    }

    fn set_rumble(&mut self, _port: u32, _effect: RumbleEffect, _strength: u16) -> bool {
        false
    }

    fn set_sensor_state(&mut self, _port: u32, _action: SensorAction, _rate: u32) -> bool {
        false
    }

    fn sensor_input(&self, _port: u32, _id: u32) -> f32 {
        0.0
    }
}

/// Backend with nothing attached.
#[derive(Debug, Default)]
pub struct NullInput;

impl InputDriver for NullInput {
    fn name(&self) -> &str {
        "null"
    }

    fn poll(&mut self) {}

    fn state(&self, _port: u32, _device: u32, _index: u32, _id: u32) -> i16 {
        0
    }
}
