//! Plugin host: the core capability set and its implementations
//!
//! A loaded core is a [`Core`] trait object. Every entry point that may call
//! back into the frontend receives the active [`CoreCallbacks`]; which
//! implementation that is (direct, preemptive frames or netplay) is decided by
//! the host per call, so switching replay engines never rewrites pointers held
//! by the core.
//!
//! - [`DynamicCore`] - shared library loaded with `libloading`
//! - [`DummyCore`] - no-op stand-in used when loading fails or no core is set

mod dummy;
mod dynamic;
pub mod env;
mod error;
mod ffi;

use std::path::PathBuf;

pub use dummy::DummyCore;
pub use dynamic::DynamicCore;
pub use env::EnvRequest;
pub use error::CoreLoadError;

use retrohost_shared::{Key, KeyModifiers, Region, SystemAvInfo, SystemInfo};

/// Content handed to `load_game`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameInfo {
    pub path: Option<PathBuf>,
    /// File contents, absent when the core asked for a path only.
    pub data: Option<Vec<u8>>,
    pub meta: Option<String>,
}

/// One video frame as produced by the core.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// Bytes per row.
    pub pitch: usize,
}

/// Rumble motors addressed through the rumble interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RumbleEffect {
    Strong,
    Weak,
}

/// Sensor actions addressed through the sensor interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorAction {
    AccelerometerEnable,
    AccelerometerDisable,
}

/// Extended disk-swap interface registered with `SET_DISK_CONTROL_INTERFACE`.
pub trait DiskControl {
    fn set_eject_state(&mut self, ejected: bool) -> bool;
    fn get_eject_state(&mut self) -> bool;
    fn get_image_index(&mut self) -> u32;
    fn set_image_index(&mut self, index: u32) -> bool;
    fn get_num_images(&mut self) -> u32;
    /// Replace image `index`; `None` removes it.
    fn replace_image_index(&mut self, index: u32, info: Option<&GameInfo>) -> bool;
    /// Append an empty image slot.
    fn add_image_index(&mut self) -> bool;
}

/// Everything a core may call back into while one of its entry points runs.
pub trait CoreCallbacks {
    /// Environment request; `false` means unsupported or refused.
    fn environment(&mut self, request: EnvRequest<'_>) -> bool;
    /// `None` asks to show the previous frame again.
    fn video_refresh(&mut self, frame: Option<VideoFrame<'_>>);
    fn audio_sample(&mut self, left: i16, right: i16);
    /// Interleaved stereo samples; returns the number of frames consumed.
    fn audio_sample_batch(&mut self, samples: &[i16]) -> usize;
    fn input_poll(&mut self);
    fn input_state(&mut self, port: u32, device: u32, index: u32, id: u32) -> i16;

    fn set_rumble_state(&mut self, _port: u32, _effect: RumbleEffect, _strength: u16) -> bool {
        false
    }
    fn set_sensor_state(&mut self, _port: u32, _action: SensorAction, _rate: u32) -> bool {
        false
    }
    fn sensor_input(&mut self, _port: u32, _id: u32) -> f32 {
        0.0
    }
}

/// The core ABI as seen by the host.
pub trait Core {
    fn api_version(&self) -> u32;
    fn system_info(&self) -> SystemInfo;
    fn system_av_info(&mut self) -> SystemAvInfo;

    /// Hands the core its environment callback; called before `init`.
    fn set_environment(&mut self, cb: &mut dyn CoreCallbacks);
    fn init(&mut self, cb: &mut dyn CoreCallbacks);
    fn deinit(&mut self, cb: &mut dyn CoreCallbacks);

    fn set_controller_port_device(&mut self, cb: &mut dyn CoreCallbacks, port: u32, device: u32);
    fn reset(&mut self, cb: &mut dyn CoreCallbacks);
    /// Advance exactly one frame.
    fn run(&mut self, cb: &mut dyn CoreCallbacks);

    fn serialize_size(&mut self, cb: &mut dyn CoreCallbacks) -> usize;
    fn serialize(&mut self, cb: &mut dyn CoreCallbacks, buf: &mut [u8]) -> bool;
    fn unserialize(&mut self, cb: &mut dyn CoreCallbacks, buf: &[u8]) -> bool;

    fn cheat_reset(&mut self, cb: &mut dyn CoreCallbacks);
    fn cheat_set(&mut self, cb: &mut dyn CoreCallbacks, index: u32, enabled: bool, code: &str);

    /// `None` starts the core without content.
    fn load_game(&mut self, cb: &mut dyn CoreCallbacks, game: Option<&GameInfo>) -> bool;
    fn load_game_special(
        &mut self,
        cb: &mut dyn CoreCallbacks,
        game_type: u32,
        games: &[GameInfo],
    ) -> bool;
    fn unload_game(&mut self, cb: &mut dyn CoreCallbacks);

    fn region(&mut self) -> Region;
    fn memory_data(&mut self, id: u32) -> Option<&mut [u8]>;
    fn memory_size(&mut self, id: u32) -> usize;

    /// True for the no-op stand-in core.
    fn is_dummy(&self) -> bool {
        false
    }

    /// Frame-time callback registered with `SET_FRAME_TIME_CALLBACK`.
    fn frame_time(&mut self, _cb: &mut dyn CoreCallbacks, _usec: i64) {}

    /// Keyboard callback registered with `SET_KEYBOARD_CALLBACK`.
    fn keyboard_event(
        &mut self,
        _cb: &mut dyn CoreCallbacks,
        _down: bool,
        _key: Key,
        _character: u32,
        _modifiers: KeyModifiers,
    ) {
    }

    /// Disk interface registered with `SET_DISK_CONTROL_INTERFACE`.
    fn disk_control(&mut self) -> Option<&mut dyn DiskControl> {
        None
    }

    /// Callback registered with `SET_CORE_OPTIONS_UPDATE_DISPLAY_CALLBACK`.
    /// Returns true if option visibility changed.
    fn update_core_options_display(&mut self, _cb: &mut dyn CoreCallbacks) -> bool {
        false
    }

    /// Audio callback registered with `SET_AUDIO_CALLBACK`.
    fn audio_callback(&mut self, _cb: &mut dyn CoreCallbacks) {}
}
