//! Input layer
//!
//! Sits between the input driver and the core. Once per tick it polls the
//! driver and derives, for each user port, the joypad mask the core will see
//! (remap, then turbo). Hotkeys are read separately and may block core input
//! while the hotkey-enable bind is held.
//!
//! Ports configured as keyboards also feed [`JoyKbd`], which turns joypad
//! button transitions into key events for the core.

mod driver;
pub mod hotkeys;
pub mod joykbd;
pub mod remap;
pub mod turbo;

pub use driver::{DEFAULT_CAPABILITIES, InputDriver, NullInput};
pub use hotkeys::Hotkeys;
pub use joykbd::{JoyKbd, KeyEvent};
pub use remap::{
    AxisSource, HalfSource, InputRemap, PortRemap, RemapError, RemapPaths, RemapScope,
};
pub use turbo::{TurboMode, TurboState};

use retrohost_shared::device::{self, analog, joypad};

use crate::config::InputSettings;

pub struct InputLayer {
    pub remap: InputRemap,
    pub joykbd: JoyKbd,
    turbo: Vec<TurboState>,
    /// Core-facing joypad mask per port, as of the last poll.
    masks: Vec<u16>,
    max_users: usize,
    /// Hotkeys ignored because the enable bind is released.
    block_hotkey: bool,
    /// Core input ignored because the enable bind is held.
    block_libretro_input: bool,
    /// Drop input until every key is released.
    pub flushing: bool,
    polled: bool,
    joykbd_enabled: bool,
}

impl InputLayer {
    pub fn new(settings: &InputSettings) -> Self {
        let max_users = settings.max_users.clamp(1, retrohost_shared::MAX_USERS);
        Self {
            remap: Self::default_remap(settings),
            joykbd: JoyKbd::from_binds(&settings.joykbd_binds),
            turbo: vec![TurboState::default(); max_users],
            masks: vec![0; max_users],
            max_users,
            block_hotkey: false,
            block_libretro_input: false,
            flushing: false,
            polled: false,
            joykbd_enabled: false,
        }
    }

    /// Identity remap with the configured port devices.
    pub fn default_remap(settings: &InputSettings) -> InputRemap {
        let users = settings.max_users.clamp(1, retrohost_shared::MAX_USERS);
        InputRemap::defaults(
            users,
            |port| {
                settings
                    .libretro_device
                    .get(port)
                    .copied()
                    .unwrap_or(device::JOYPAD)
            },
            settings.turbo_period,
        )
    }

    /// Back to the configured defaults, e.g. after a core change.
    pub fn reset_remap(&mut self, settings: &InputSettings) {
        self.remap = Self::default_remap(settings);
        for turbo in &mut self.turbo {
            turbo.reset();
        }
    }

    pub fn max_users(&self) -> usize {
        self.max_users
    }

    pub fn port_device(&self, port: usize) -> u32 {
        self.remap.port(port).map_or(device::NONE, |p| p.device)
    }

    pub fn hotkeys_blocked(&self) -> bool {
        self.block_hotkey
    }

    pub fn libretro_input_blocked(&self) -> bool {
        self.block_libretro_input
    }

    /// Hotkeys held this tick. Updates the hotkey/core blocking state.
    pub fn keys_pressed(&mut self, driver: &dyn InputDriver, settings: &InputSettings) -> Hotkeys {
        let enable_held = settings.enable_hotkey.map(|key| driver.key_pressed(key));
        self.block_hotkey = enable_held == Some(false);
        self.block_libretro_input = enable_held == Some(true);

        if self.block_hotkey {
            return Hotkeys::empty();
        }
        hotkeys::resolve(&settings.hotkey_binds, |key| driver.key_pressed(key))
    }

    /// Start of a tick: nothing polled yet.
    pub fn begin_tick(&mut self) {
        self.polled = false;
    }

    pub fn polled(&self) -> bool {
        self.polled
    }

    /// Poll unless this tick already did.
    pub fn poll_once(&mut self, driver: &mut dyn InputDriver, remap_enable: bool) {
        if !self.polled {
            self.poll(driver, remap_enable);
        }
    }

    /// Poll the driver and rebuild per-port masks.
    pub fn poll(&mut self, driver: &mut dyn InputDriver, remap_enable: bool) {
        driver.poll();
        self.polled = true;

        for port in 0..self.max_users {
            let mut raw = 0u16;
            for id in 0..joypad::COUNT as u32 {
                if driver.state(port as u32, device::JOYPAD, 0, id) != 0 {
                    raw |= joypad::bit(id);
                }
            }
            let Some(remap) = self.remap.ports.get(port) else {
                self.masks[port] = raw;
                continue;
            };
            let mapped = if remap_enable {
                remap.apply_buttons(raw)
            } else {
                raw
            };
            self.masks[port] = self.turbo[port].apply(remap.turbo, remap.turbo_period, mapped);
        }

        if self.joykbd_enabled {
            let mask = self.masks[0];
            self.joykbd.poll(|button| {
                if button < joypad::COUNT {
                    return mask & (1 << button) != 0;
                }
                let (index, id) = joykbd::half_axis_source(button);
                joykbd::half_axis_pressed(button, driver.state(0, device::ANALOG, index, id))
            });
        }
    }

    /// Core-facing joypad mask of `port` as of the last poll.
    pub fn joypad_mask(&self, port: usize) -> u16 {
        self.masks.get(port).copied().unwrap_or(0)
    }

    /// What the core reads for one channel.
    pub fn state(&self, driver: &dyn InputDriver, port: u32, dev: u32, index: u32, id: u32) -> i16 {
        if self.block_libretro_input || self.flushing || port as usize >= self.max_users {
            return 0;
        }
        let mask = self.joypad_mask(port as usize);
        match device::base(dev) {
            device::JOYPAD if id == joypad::MASK => mask as i16,
            device::JOYPAD => i16::from(id < joypad::COUNT as u32 && mask & joypad::bit(id) != 0),
            device::ANALOG if index == analog::INDEX_BUTTON => {
                if id < joypad::COUNT as u32 && mask & joypad::bit(id) != 0 {
                    i16::MAX
                } else {
                    0
                }
            }
            device::ANALOG => {
                let Some(source) = self
                    .remap
                    .port(port as usize)
                    .and_then(|remap| remap.axis_source(index, id))
                else {
                    return driver.state(port, device::ANALOG, index, id);
                };
                let value = half_deflection(driver, port, source.plus)
                    - half_deflection(driver, port, source.minus);
                value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
            }
            device::KEYBOARD => {
                let translated = self.joykbd_enabled
                    && self.joykbd.key_down(retrohost_shared::Key(id as u16));
                if translated {
                    1
                } else {
                    driver.state(port, dev, index, id)
                }
            }
            _ => driver.state(port, dev, index, id),
        }
    }

    /// Enable joypad-to-keyboard translation. Disabling releases held keys
    /// without emitting events.
    pub fn set_joykbd_enabled(&mut self, enabled: bool) {
        if self.joykbd_enabled && !enabled {
            self.joykbd.clear_state();
        }
        self.joykbd_enabled = enabled;
    }

    pub fn joykbd_enabled(&self) -> bool {
        self.joykbd_enabled
    }

    /// Whether any port is configured as a keyboard.
    pub fn has_keyboard_port(&self) -> bool {
        self.remap
            .ports
            .iter()
            .any(|p| device::base(p.device) == device::KEYBOARD)
    }

    pub fn take_key_events(&mut self) -> Vec<KeyEvent> {
        self.joykbd.take_events()
    }
}

/// How far one half-axis source is pushed, from 0 to 32768.
fn half_deflection(driver: &dyn InputDriver, port: u32, source: HalfSource) -> i32 {
    match source {
        HalfSource::Button(id) => {
            if driver.state(port, device::JOYPAD, 0, id) != 0 {
                i32::from(i16::MAX)
            } else {
                0
            }
        }
        HalfSource::HalfAxis(half) => {
            let axis = half / 2;
            let value = i32::from(driver.state(port, device::ANALOG, axis / 2, axis % 2));
            if half % 2 == 0 { value.max(0) } else { (-value).max(0) }
        }
        HalfSource::Unmapped => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedInput;
    use retrohost_shared::Key;

    fn settings() -> InputSettings {
        InputSettings {
            max_users: 2,
            turbo_period: 4,
            ..InputSettings::default()
        }
    }

    #[test]
    fn test_poll_builds_masks() {
        let mut driver = ScriptedInput::default();
        let mut layer = InputLayer::new(&settings());
        driver.handle().set_buttons(1, joypad::bit(joypad::A));
        layer.poll(&mut driver, true);
        assert_eq!(layer.joypad_mask(0), 0);
        assert_eq!(layer.joypad_mask(1), joypad::bit(joypad::A));
        assert_eq!(layer.state(&driver, 1, device::JOYPAD, 0, joypad::A), 1);
        assert_eq!(
            layer.state(&driver, 1, device::JOYPAD, 0, joypad::MASK),
            joypad::bit(joypad::A) as i16
        );
        assert_eq!(layer.state(&driver, 5, device::JOYPAD, 0, joypad::A), 0);
    }

    #[test]
    fn test_remap_applied_when_enabled() {
        let mut driver = ScriptedInput::default();
        let mut layer = InputLayer::new(&settings());
        layer.remap.ports[0].buttons[joypad::A as usize] = joypad::B;
        driver.handle().set_buttons(0, joypad::bit(joypad::A));

        layer.poll(&mut driver, true);
        assert_eq!(layer.joypad_mask(0), joypad::bit(joypad::B));

        layer.poll(&mut driver, false);
        assert_eq!(layer.joypad_mask(0), joypad::bit(joypad::A));
    }

    #[test]
    fn test_turbo_applied_after_remap() {
        let mut driver = ScriptedInput::default();
        let mut layer = InputLayer::new(&settings());
        layer.remap.ports[0].turbo = TurboMode::Button(joypad::A);
        driver.handle().set_buttons(0, joypad::bit(joypad::A));

        let pattern: Vec<u16> = (0..4)
            .map(|_| {
                layer.poll(&mut driver, true);
                layer.joypad_mask(0)
            })
            .collect();
        let on = joypad::bit(joypad::A);
        assert_eq!(pattern, vec![on, on, 0, 0]);
    }

    #[test]
    fn test_enable_hotkey_blocks_either_side() {
        let mut driver = ScriptedInput::default();
        let mut settings = settings();
        settings.enable_hotkey = Some(Key::ascii(b'h'));
        settings.hotkey_binds.insert("pause_toggle".into(), Key::ascii(b'p'));
        let mut layer = InputLayer::new(&settings);
        driver.handle().press_key(Key::ascii(b'p'));
        driver.handle().set_buttons(0, joypad::bit(joypad::B));
        layer.poll(&mut driver, true);

        // Enable key released: hotkeys blocked, core input flows.
        assert!(layer.keys_pressed(&driver, &settings).is_empty());
        assert!(layer.hotkeys_blocked());
        assert_eq!(layer.state(&driver, 0, device::JOYPAD, 0, joypad::B), 1);

        // Enable key held: hotkeys flow, core input blocked.
        driver.handle().press_key(Key::ascii(b'h'));
        assert!(layer.keys_pressed(&driver, &settings).contains(Hotkeys::PAUSE_TOGGLE));
        assert!(layer.libretro_input_blocked());
        assert_eq!(layer.state(&driver, 0, device::JOYPAD, 0, joypad::B), 0);
    }

    #[test]
    fn test_no_enable_bind_allows_both() {
        let mut driver = ScriptedInput::default();
        let mut settings = settings();
        settings.hotkey_binds.insert("pause_toggle".into(), Key::ascii(b'p'));
        let mut layer = InputLayer::new(&settings);
        driver.handle().press_key(Key::ascii(b'p'));
        driver.handle().set_buttons(0, joypad::bit(joypad::B));
        layer.poll(&mut driver, true);
        assert!(layer.keys_pressed(&driver, &settings).contains(Hotkeys::PAUSE_TOGGLE));
        assert_eq!(layer.state(&driver, 0, device::JOYPAD, 0, joypad::B), 1);
    }

    #[test]
    fn test_analog_button_and_axis_remap() {
        let mut driver = ScriptedInput::default();
        let mut layer = InputLayer::new(&settings());
        driver.handle().set_buttons(0, joypad::bit(joypad::X));
        driver
            .handle()
            .set_analog(0, analog::INDEX_RIGHT, analog::ID_Y, -1234);
        // Left stick X reads the right stick Y.
        layer.remap.ports[0].axes[0] = AxisSource::native(3);
        layer.poll(&mut driver, true);

        assert_eq!(
            layer.state(&driver, 0, device::ANALOG, analog::INDEX_BUTTON, joypad::X),
            i16::MAX
        );
        assert_eq!(
            layer.state(&driver, 0, device::ANALOG, analog::INDEX_LEFT, analog::ID_X),
            -1234
        );
    }

    #[test]
    fn test_axis_halves_from_button_and_axis() {
        let mut driver = ScriptedInput::default();
        let mut layer = InputLayer::new(&settings());
        // Left stick X: minus from d-pad left, plus from the right stick pushed up.
        layer.remap.ports[0].axes[0] = AxisSource {
            plus: HalfSource::HalfAxis(7),
            minus: HalfSource::Button(joypad::LEFT),
        };
        let left_x = |layer: &InputLayer, driver: &ScriptedInput| {
            layer.state(driver, 0, device::ANALOG, analog::INDEX_LEFT, analog::ID_X)
        };
        layer.poll(&mut driver, true);
        assert_eq!(left_x(&layer, &driver), 0);

        driver
            .handle()
            .set_analog(0, analog::INDEX_RIGHT, analog::ID_Y, -0x2000);
        assert_eq!(left_x(&layer, &driver), 0x2000);

        driver.handle().set_buttons(0, joypad::bit(joypad::LEFT));
        assert_eq!(left_x(&layer, &driver), 0x2000 - i16::MAX);

        // The right stick pushed down feeds nothing.
        driver
            .handle()
            .set_analog(0, analog::INDEX_RIGHT, analog::ID_Y, 0x3000);
        assert_eq!(left_x(&layer, &driver), -i16::MAX);
    }

    #[test]
    fn test_inverted_axis_saturates() {
        let mut driver = ScriptedInput::default();
        let mut layer = InputLayer::new(&settings());
        layer.remap.ports[0].axes[1] = AxisSource {
            plus: HalfSource::HalfAxis(3),
            minus: HalfSource::HalfAxis(2),
        };
        driver
            .handle()
            .set_analog(0, analog::INDEX_LEFT, analog::ID_Y, i16::MIN);
        layer.poll(&mut driver, true);
        assert_eq!(
            layer.state(&driver, 0, device::ANALOG, analog::INDEX_LEFT, analog::ID_Y),
            i16::MAX
        );
        // Untouched axes pass through.
        driver
            .handle()
            .set_analog(0, analog::INDEX_LEFT, analog::ID_X, i16::MIN);
        assert_eq!(
            layer.state(&driver, 0, device::ANALOG, analog::INDEX_LEFT, analog::ID_X),
            i16::MIN
        );
    }

    #[test]
    fn test_flushing_drops_core_input() {
        let mut driver = ScriptedInput::default();
        let mut layer = InputLayer::new(&settings());
        driver.handle().set_buttons(0, joypad::bit(joypad::B));
        layer.poll(&mut driver, true);
        layer.flushing = true;
        assert_eq!(layer.state(&driver, 0, device::JOYPAD, 0, joypad::B), 0);
    }

    #[test]
    fn test_poll_once_per_tick() {
        let mut driver = ScriptedInput::default();
        let mut layer = InputLayer::new(&settings());
        layer.begin_tick();
        layer.poll_once(&mut driver, true);
        layer.poll_once(&mut driver, true);
        assert_eq!(driver.handle().polls(), 1);
        layer.begin_tick();
        assert!(!layer.polled());
        layer.poll_once(&mut driver, true);
        assert_eq!(driver.handle().polls(), 2);
    }

    #[test]
    fn test_joykbd_translation_on_keyboard_port() {
        let mut driver = ScriptedInput::default();
        let mut settings = settings();
        settings.libretro_device = vec![device::KEYBOARD];
        settings
            .joykbd_binds
            .insert("start".into(), vec![Key::RETURN]);
        let mut layer = InputLayer::new(&settings);
        assert!(layer.has_keyboard_port());
        layer.set_joykbd_enabled(true);

        driver.handle().set_buttons(0, joypad::bit(joypad::START));
        layer.poll(&mut driver, true);
        let events = layer.take_key_events();
        assert_eq!(events.len(), 1);
        assert!(events[0].down);
        assert_eq!(events[0].key, Key::RETURN);
        assert_eq!(
            layer.state(&driver, 0, device::KEYBOARD, 0, u32::from(Key::RETURN.code())),
            1
        );

        driver.handle().set_buttons(0, 0);
        layer.poll(&mut driver, true);
        let events = layer.take_key_events();
        assert_eq!(events.len(), 1);
        assert!(!events[0].down);
    }
}
