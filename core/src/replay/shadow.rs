//! Input shadow for preemptive frames
//!
//! The core reads its input from the shadow rather than the live layer. A
//! replay is due whenever a shadowed channel changes between polls. Joypad
//! masks are always shadowed; analog and pointer channels only once the core
//! has asked for them, so a core that never reads the right stick cannot
//! trigger replays through it.

use retrohost_shared::device::{self, analog, joypad, pointer};

use crate::input::{InputDriver, InputLayer};

#[derive(Debug, Clone, PartialEq, Eq)]
struct PortShadow {
    joypad: u16,
    analog: [i16; analog::CHANNELS],
    /// Bit `c` set once the core read analog channel `c`.
    analog_needed: u32,
    pointer: [i16; pointer::CHANNELS],
    pointer_needed: u8,
    /// Pointing class the core read last, `device::NONE` if none.
    pointer_device: u32,
}

impl Default for PortShadow {
    fn default() -> Self {
        Self {
            joypad: 0,
            analog: [0; analog::CHANNELS],
            analog_needed: 0,
            pointer: [0; pointer::CHANNELS],
            pointer_needed: 0,
            pointer_device: device::NONE,
        }
    }
}

/// `(index, id)` of an analog channel number.
fn analog_source(channel: usize) -> (u32, u32) {
    if channel < analog::AXES {
        ((channel / 2) as u32, (channel % 2) as u32)
    } else {
        (analog::INDEX_BUTTON, (channel - analog::AXES) as u32)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputShadow {
    ports: Vec<PortShadow>,
}

impl InputShadow {
    pub fn new(users: usize) -> Self {
        Self {
            ports: vec![PortShadow::default(); users],
        }
    }

    pub fn joypad(&self, port: usize) -> u16 {
        self.ports.get(port).map_or(0, |p| p.joypad)
    }

    /// Re-read every shadowed channel from the layer (already polled this
    /// tick). Returns true if any of them changed.
    pub fn update(&mut self, layer: &InputLayer, driver: &dyn InputDriver) -> bool {
        let mut dirty = false;
        for (port, shadow) in self.ports.iter_mut().enumerate() {
            let port = port as u32;

            let mask = layer.state(driver, port, device::JOYPAD, 0, joypad::MASK) as u16;
            if mask != shadow.joypad {
                shadow.joypad = mask;
                dirty = true;
            }

            for channel in 0..analog::CHANNELS {
                if shadow.analog_needed & (1 << channel) == 0 {
                    continue;
                }
                let (index, id) = analog_source(channel);
                let value = layer.state(driver, port, device::ANALOG, index, id);
                if value != shadow.analog[channel] {
                    shadow.analog[channel] = value;
                    dirty = true;
                }
            }

            if shadow.pointer_device != device::NONE {
                for id in 0..pointer::CHANNELS {
                    if shadow.pointer_needed & (1 << id) == 0 {
                        continue;
                    }
                    let value = layer.state(driver, port, shadow.pointer_device, 0, id as u32);
                    if value != shadow.pointer[id] {
                        shadow.pointer[id] = value;
                        dirty = true;
                    }
                }
            }
        }
        dirty
    }

    /// What the core reads. Joypad comes from the shadow; analog and pointer
    /// reads go live and mark the channel as needed for the next diff.
    pub fn state(
        &mut self,
        layer: &InputLayer,
        driver: &dyn InputDriver,
        port: u32,
        dev: u32,
        index: u32,
        id: u32,
    ) -> i16 {
        let Some(shadow) = self.ports.get_mut(port as usize) else {
            return layer.state(driver, port, dev, index, id);
        };

        match device::base(dev) {
            device::JOYPAD if id == joypad::MASK => shadow.joypad as i16,
            device::JOYPAD => {
                i16::from(id < joypad::COUNT as u32 && shadow.joypad & joypad::bit(id) != 0)
            }
            device::ANALOG => {
                let value = layer.state(driver, port, dev, index, id);
                if let Some(channel) = analog::channel(index, id) {
                    shadow.analog_needed |= 1 << channel;
                    shadow.analog[channel] = value;
                }
                value
            }
            base if device::is_pointing(base) => {
                let value = layer.state(driver, port, dev, index, id);
                if (id as usize) < pointer::CHANNELS {
                    if shadow.pointer_device != dev {
                        shadow.pointer_device = dev;
                        shadow.pointer_needed = 0;
                    }
                    shadow.pointer_needed |= 1 << id;
                    shadow.pointer[id as usize] = value;
                }
                value
            }
            _ => layer.state(driver, port, dev, index, id),
        }
    }
}
