//! No-op core used when no core is set or loading failed

use retrohost_shared::{API_VERSION, GameGeometry, Region, SystemAvInfo, SystemInfo, SystemTiming};

use super::{CoreCallbacks, EnvRequest, GameInfo};
use crate::plugin::Core;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

/// Every entry point succeeds and does nothing visible; `run` presents a
/// black RGB565 frame so the video driver keeps refreshing.
pub struct DummyCore {
    frame: Vec<u8>,
}

impl Default for DummyCore {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyCore {
    pub fn new() -> Self {
        Self {
            frame: vec![0; (WIDTH * HEIGHT * 2) as usize],
        }
    }
}

impl Core for DummyCore {
    fn api_version(&self) -> u32 {
        API_VERSION
    }

    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            library_name: "dummy".to_string(),
            library_version: "1".to_string(),
            valid_extensions: String::new(),
            need_fullpath: false,
            block_extract: false,
        }
    }

    fn system_av_info(&mut self) -> SystemAvInfo {
        SystemAvInfo {
            geometry: GameGeometry {
                base_width: WIDTH,
                base_height: HEIGHT,
                max_width: WIDTH,
                max_height: HEIGHT,
                aspect_ratio: 4.0 / 3.0,
            },
            timing: SystemTiming {
                fps: 60.0,
                sample_rate: 30_000.0,
            },
        }
    }

    fn set_environment(&mut self, cb: &mut dyn CoreCallbacks) {
        cb.environment(EnvRequest::SetSupportNoGame(true));
    }

    fn init(&mut self, cb: &mut dyn CoreCallbacks) {
        // RGB565 so the black frame is valid regardless of the host default.
        cb.environment(EnvRequest::SetPixelFormat(2));
    }

    fn deinit(&mut self, _cb: &mut dyn CoreCallbacks) {}

    fn set_controller_port_device(&mut self, _cb: &mut dyn CoreCallbacks, _port: u32, _device: u32) {
    }

    fn reset(&mut self, _cb: &mut dyn CoreCallbacks) {}

    fn run(&mut self, cb: &mut dyn CoreCallbacks) {
        cb.input_poll();
        cb.video_refresh(Some(super::VideoFrame {
            data: &self.frame,
            width: WIDTH,
            height: HEIGHT,
            pitch: (WIDTH * 2) as usize,
        }));
    }

    fn serialize_size(&mut self, _cb: &mut dyn CoreCallbacks) -> usize {
        0
    }

    fn serialize(&mut self, _cb: &mut dyn CoreCallbacks, _buf: &mut [u8]) -> bool {
        false
    }

    fn unserialize(&mut self, _cb: &mut dyn CoreCallbacks, _buf: &[u8]) -> bool {
        false
    }

    fn cheat_reset(&mut self, _cb: &mut dyn CoreCallbacks) {}

    fn cheat_set(&mut self, _cb: &mut dyn CoreCallbacks, _index: u32, _enabled: bool, _code: &str) {}

    fn load_game(&mut self, _cb: &mut dyn CoreCallbacks, _game: Option<&GameInfo>) -> bool {
        true
    }

    fn load_game_special(
        &mut self,
        _cb: &mut dyn CoreCallbacks,
        _game_type: u32,
        _games: &[GameInfo],
    ) -> bool {
        false
    }

    fn unload_game(&mut self, _cb: &mut dyn CoreCallbacks) {}

    fn region(&mut self) -> Region {
        Region::Ntsc
    }

    fn memory_data(&mut self, _id: u32) -> Option<&mut [u8]> {
        None
    }

    fn memory_size(&mut self, _id: u32) -> usize {
        0
    }

    fn is_dummy(&self) -> bool {
        true
    }
}
