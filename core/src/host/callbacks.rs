//! The callbacks a core sees while one of its entry points runs.
//!
//! Input is read through an [`InputOverlay`] chosen by the active replay
//! engine; video and audio are dropped while the engine has them suspended.

use retrohost_shared::device::{self, joypad};

use super::HostContext;
use super::environment;
use crate::plugin::{CoreCallbacks, EnvRequest, RumbleEffect, SensorAction, VideoFrame};
use crate::replay::InputShadow;

/// Where `input_state` answers come from.
pub enum InputOverlay<'a> {
    /// Straight from the input layer.
    Direct,
    /// Joypad from the preemptive-frames shadow.
    Preempt(&'a mut InputShadow),
    /// Ports 0 and 1 from the netplay engine's confirmed or predicted input.
    Netplay([u16; 2]),
}

pub struct HostCallbacks<'a> {
    pub ctx: &'a mut HostContext,
    pub overlay: InputOverlay<'a>,
}

impl<'a> HostCallbacks<'a> {
    pub fn new(ctx: &'a mut HostContext, overlay: InputOverlay<'a>) -> Self {
        Self { ctx, overlay }
    }
}

impl CoreCallbacks for HostCallbacks<'_> {
    fn environment(&mut self, request: EnvRequest<'_>) -> bool {
        environment::handle(self.ctx, request)
    }

    fn video_refresh(&mut self, frame: Option<VideoFrame<'_>>) {
        if self.ctx.replay.video_suspended {
            return;
        }
        let format = self.ctx.system.pixel_format;
        self.ctx.drivers.present(frame, format);
    }

    fn audio_sample(&mut self, left: i16, right: i16) {
        if !self.ctx.replay.audio_suspended {
            self.ctx.drivers.push_sample(left, right);
        }
    }

    fn audio_sample_batch(&mut self, samples: &[i16]) -> usize {
        if self.ctx.replay.audio_suspended {
            return samples.len() / 2;
        }
        self.ctx.drivers.push_samples(samples)
    }

    fn input_poll(&mut self) {
        let remap = self.ctx.settings.input.remap_binds_enable;
        let ctx = &mut *self.ctx;
        ctx.input.poll_once(&mut *ctx.drivers.input, remap);
    }

    fn input_state(&mut self, port: u32, dev: u32, index: u32, id: u32) -> i16 {
        let ctx = &*self.ctx;
        match &mut self.overlay {
            InputOverlay::Direct => ctx.input.state(&*ctx.drivers.input, port, dev, index, id),
            InputOverlay::Preempt(shadow) => {
                shadow.state(&ctx.input, &*ctx.drivers.input, port, dev, index, id)
            }
            InputOverlay::Netplay(inputs) => {
                // Only joypads are exchanged; anything else would desync.
                let Some(&mask) = inputs.get(port as usize) else {
                    return 0;
                };
                match device::base(dev) {
                    device::JOYPAD if id == joypad::MASK => mask as i16,
                    device::JOYPAD => {
                        i16::from(id < joypad::COUNT as u32 && mask & joypad::bit(id) != 0)
                    }
                    _ => 0,
                }
            }
        }
    }

    fn set_rumble_state(&mut self, port: u32, effect: RumbleEffect, strength: u16) -> bool {
        self.ctx.drivers.input.set_rumble(port, effect, strength)
    }

    fn set_sensor_state(&mut self, port: u32, action: SensorAction, rate: u32) -> bool {
        self.ctx.drivers.input.set_sensor_state(port, action, rate)
    }

    fn sensor_input(&mut self, port: u32, id: u32) -> f32 {
        self.ctx.drivers.input.sensor_input(port, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedInput, test_context};

    #[test]
    fn test_suspended_av_is_dropped() {
        let mut ctx = test_context(ScriptedInput::default());
        ctx.replay.suspend_av();
        let mut cb = HostCallbacks::new(&mut ctx, InputOverlay::Direct);

        let pixels = [0u8; 4];
        cb.video_refresh(Some(VideoFrame {
            data: &pixels,
            width: 1,
            height: 1,
            pitch: 4,
        }));
        assert_eq!(cb.audio_sample_batch(&[1, 2, 3, 4]), 2);
        assert!(cb.ctx.drivers.cached_frame().is_none());
    }

    #[test]
    fn test_netplay_overlay_serves_exchanged_joypads() {
        let input = ScriptedInput::default();
        input.handle().set_buttons(0, joypad::bit(joypad::START));
        let mut ctx = test_context(input);
        let inputs = [joypad::bit(joypad::A), joypad::bit(joypad::B)];
        let mut cb = HostCallbacks::new(&mut ctx, InputOverlay::Netplay(inputs));
        cb.input_poll();

        assert_eq!(cb.input_state(0, device::JOYPAD, 0, joypad::A), 1);
        assert_eq!(cb.input_state(0, device::JOYPAD, 0, joypad::START), 0);
        assert_eq!(cb.input_state(1, device::JOYPAD, 0, joypad::B), 1);
        assert_eq!(cb.input_state(2, device::JOYPAD, 0, joypad::B), 0);
        assert_eq!(cb.input_state(0, device::ANALOG, 0, 0), 0);
    }

    #[test]
    fn test_direct_overlay_polls_once() {
        let input = ScriptedInput::default();
        let mut ctx = test_context(input.clone());
        ctx.input.begin_tick();
        let mut cb = HostCallbacks::new(&mut ctx, InputOverlay::Direct);
        cb.input_poll();
        cb.input_poll();
        assert_eq!(input.handle().polls(), 1);
    }
}
