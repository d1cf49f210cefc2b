//! Shared test utilities for integration and unit tests

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use retrohost_shared::device::{self, joypad, memory};
use retrohost_shared::{
    API_VERSION, AvEnable, GameGeometry, Key, PixelFormat, Region, SavestateContext,
    SystemAvInfo, SystemInfo, SystemTiming,
};

use crate::config::Settings;
use crate::drivers::{AudioDriver, Drivers, NullMenu, NullVideo, VideoConfig, VideoDriver};
use crate::host::HostContext;
use crate::input::InputDriver;
use crate::plugin::{Core, CoreCallbacks, DiskControl, EnvRequest, GameInfo, VideoFrame};

// ============================================================================
// Scripted input
// ============================================================================

/// Input state a test sets directly.
#[derive(Debug, Default)]
pub struct ScriptedState {
    buttons: [u16; 4],
    analog: Vec<((u32, u32, u32), i16)>,
    keys: HashSet<Key>,
    polls: u32,
}

impl ScriptedState {
    pub fn set_buttons(&mut self, port: usize, mask: u16) {
        self.buttons[port] = mask;
    }

    pub fn set_analog(&mut self, port: u32, index: u32, id: u32, value: i16) {
        self.analog.retain(|(channel, _)| *channel != (port, index, id));
        self.analog.push(((port, index, id), value));
    }

    pub fn press_key(&mut self, key: Key) {
        self.keys.insert(key);
    }

    pub fn release_key(&mut self, key: Key) {
        self.keys.remove(&key);
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }
}

/// Input driver backed by shared [`ScriptedState`]; clones see the same
/// state, so a test keeps one handle after boxing the other.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput(Arc<Mutex<ScriptedState>>);

impl ScriptedInput {
    pub fn handle(&self) -> MutexGuard<'_, ScriptedState> {
        self.0.lock().unwrap()
    }
}

impl InputDriver for ScriptedInput {
    fn name(&self) -> &str {
        "scripted"
    }

    fn poll(&mut self) {
        self.handle().polls += 1;
    }

    fn state(&self, port: u32, dev: u32, index: u32, id: u32) -> i16 {
        let state = self.handle();
        match device::base(dev) {
            device::JOYPAD => {
                let mask = state.buttons.get(port as usize).copied().unwrap_or(0);
                if id == joypad::MASK {
                    mask as i16
                } else {
                    i16::from(id < joypad::COUNT as u32 && mask & joypad::bit(id) != 0)
                }
            }
            device::ANALOG => state
                .analog
                .iter()
                .find(|(channel, _)| *channel == (port, index, id))
                .map_or(0, |(_, value)| *value),
            _ => 0,
        }
    }

    fn key_pressed(&self, key: Key) -> bool {
        self.handle().keys.contains(&key)
    }
}

// ============================================================================
// Recording drivers
// ============================================================================

#[derive(Debug, Default)]
struct VideoLog {
    frames: usize,
    messages: Vec<String>,
    last: Vec<u8>,
}

/// Video driver that counts presented frames and keeps on-screen messages.
#[derive(Debug, Clone, Default)]
pub struct RecordingVideo(Arc<Mutex<VideoLog>>);

impl RecordingVideo {
    pub fn frames(&self) -> usize {
        self.0.lock().unwrap().frames
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().messages.clone()
    }

    pub fn last_frame(&self) -> Vec<u8> {
        self.0.lock().unwrap().last.clone()
    }
}

impl VideoDriver for RecordingVideo {
    fn name(&self) -> &str {
        "recording"
    }

    fn init(&mut self, _config: &VideoConfig) -> bool {
        true
    }

    fn frame(&mut self, frame: &VideoFrame<'_>, _format: PixelFormat) -> bool {
        let mut log = self.0.lock().unwrap();
        log.frames += 1;
        log.last = frame.data.to_vec();
        true
    }

    fn message(&mut self, text: &str) {
        self.0.lock().unwrap().messages.push(text.to_string());
    }
}

/// Audio driver that keeps every sample written.
#[derive(Debug, Clone, Default)]
pub struct RecordingAudio(Arc<Mutex<Vec<i16>>>);

impl RecordingAudio {
    pub fn written(&self) -> Vec<i16> {
        self.0.lock().unwrap().clone()
    }
}

impl AudioDriver for RecordingAudio {
    fn name(&self) -> &str {
        "recording"
    }

    fn init(&mut self, _sample_rate: f64) -> bool {
        true
    }

    fn start(&mut self) -> bool {
        true
    }

    fn stop(&mut self) -> bool {
        true
    }

    fn write(&mut self, samples: &[i16]) -> usize {
        self.0.lock().unwrap().extend_from_slice(samples);
        samples.len() / 2
    }
}

/// Host context over null drivers and `input`, with default settings and
/// no directories configured.
pub fn test_context(input: ScriptedInput) -> HostContext {
    let drivers = Drivers::new(
        Box::new(NullVideo),
        Box::new(RecordingAudio::default()),
        Box::new(input),
        Box::new(NullMenu),
    );
    HostContext::new(Settings::default(), drivers)
}

// ============================================================================
// Test core
// ============================================================================

const STATE_HEADER: usize = 16;

/// One call of `run`, as seen from inside the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    /// Frame counter before the run.
    pub frame: u64,
    /// Joypad masks of ports 0 and 1.
    pub input: [u16; 2],
    pub av: AvEnable,
    pub context: SavestateContext,
}

#[derive(Debug, Default)]
struct ProbeState {
    frame: u64,
    hash: u64,
    runs: Vec<RunRecord>,
    unserialized: Vec<u64>,
    resets: u32,
    cheats: Vec<(u32, bool, String)>,
    port_devices: Vec<(u32, u32)>,
    loaded: Option<GameInfo>,
    unloaded: bool,
}

/// Shared view into a [`TestCore`] that outlives boxing it into a host.
#[derive(Debug, Clone, Default)]
pub struct CoreProbe(Arc<Mutex<ProbeState>>);

impl CoreProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.0.lock().unwrap()
    }

    /// Frames the core has advanced, replays included.
    pub fn frame(&self) -> u64 {
        self.lock().frame
    }

    /// Digest of every input the core has consumed.
    pub fn hash(&self) -> u64 {
        self.lock().hash
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        self.lock().runs.clone()
    }

    /// Frame counters of the states loaded.
    pub fn unserialized(&self) -> Vec<u64> {
        self.lock().unserialized.clone()
    }

    pub fn resets(&self) -> u32 {
        self.lock().resets
    }

    pub fn cheats(&self) -> Vec<(u32, bool, String)> {
        self.lock().cheats.clone()
    }

    pub fn port_devices(&self) -> Vec<(u32, u32)> {
        self.lock().port_devices.clone()
    }

    pub fn loaded(&self) -> Option<GameInfo> {
        self.lock().loaded.clone()
    }

    pub fn unloaded(&self) -> bool {
        self.lock().unloaded
    }

    /// Forget runs and loads so far.
    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.runs.clear();
        state.unserialized.clear();
    }
}

/// Disk tray with a fixed number of images.
#[derive(Debug, Default)]
pub struct TestDisks {
    pub images: u32,
    pub index: u32,
    pub ejected: bool,
}

impl DiskControl for TestDisks {
    fn set_eject_state(&mut self, ejected: bool) -> bool {
        self.ejected = ejected;
        true
    }

    fn get_eject_state(&mut self) -> bool {
        self.ejected
    }

    fn get_image_index(&mut self) -> u32 {
        self.index
    }

    fn set_image_index(&mut self, index: u32) -> bool {
        if index >= self.images || !self.ejected {
            return false;
        }
        self.index = index;
        true
    }

    fn get_num_images(&mut self) -> u32 {
        self.images
    }

    fn replace_image_index(&mut self, index: u32, info: Option<&GameInfo>) -> bool {
        if index >= self.images {
            return false;
        }
        if info.is_none() {
            self.images -= 1;
        }
        true
    }

    fn add_image_index(&mut self) -> bool {
        self.images += 1;
        true
    }
}

/// Deterministic core: its state is a frame counter and a digest of the
/// joypad input of ports 0 and 1, so two instances fed the same input stay
/// byte-identical.
pub struct TestCore {
    probe: CoreProbe,
    /// Extra state bytes beyond the header.
    padding: usize,
    savestates: bool,
    sram: Vec<u8>,
    disks: Option<TestDisks>,
    no_game: bool,
    library_name: String,
}

impl Default for TestCore {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCore {
    pub fn new() -> Self {
        Self {
            probe: CoreProbe::default(),
            padding: 16,
            savestates: true,
            sram: Vec::new(),
            disks: None,
            no_game: false,
            library_name: "test".to_string(),
        }
    }

    pub fn with_sram(mut self, size: usize) -> Self {
        self.sram = vec![0; size];
        self
    }

    pub fn with_disks(mut self, images: u32) -> Self {
        self.disks = Some(TestDisks {
            images,
            ..TestDisks::default()
        });
        self
    }

    pub fn without_savestates(mut self) -> Self {
        self.savestates = false;
        self
    }

    /// Accept running without content.
    pub fn with_no_game(mut self) -> Self {
        self.no_game = true;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.library_name = name.to_string();
        self
    }

    pub fn probe(&self) -> CoreProbe {
        self.probe.clone()
    }

    pub fn sram_mut(&mut self) -> &mut [u8] {
        &mut self.sram
    }

    /// Make every later state `bytes` larger.
    pub fn grow_state(&mut self, bytes: usize) {
        self.padding += bytes;
    }

    fn state_size(&self) -> usize {
        if self.savestates {
            STATE_HEADER + self.padding
        } else {
            0
        }
    }
}

impl Core for TestCore {
    fn api_version(&self) -> u32 {
        API_VERSION
    }

    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            library_name: self.library_name.clone(),
            library_version: "1.0".to_string(),
            valid_extensions: "bin".to_string(),
            need_fullpath: false,
            block_extract: false,
        }
    }

    fn system_av_info(&mut self) -> SystemAvInfo {
        SystemAvInfo {
            geometry: GameGeometry {
                base_width: 2,
                base_height: 1,
                max_width: 2,
                max_height: 1,
                aspect_ratio: 2.0,
            },
            timing: SystemTiming {
                fps: 60.0,
                sample_rate: 48_000.0,
            },
        }
    }

    fn set_environment(&mut self, cb: &mut dyn CoreCallbacks) {
        cb.environment(EnvRequest::SetSupportNoGame(self.no_game));
    }

    fn init(&mut self, cb: &mut dyn CoreCallbacks) {
        cb.environment(EnvRequest::SetPixelFormat(1));
        if self.disks.is_some() {
            cb.environment(EnvRequest::SetDiskControlInterface(true));
        }
    }

    fn deinit(&mut self, _cb: &mut dyn CoreCallbacks) {}

    fn set_controller_port_device(&mut self, _cb: &mut dyn CoreCallbacks, port: u32, device: u32) {
        self.probe.lock().port_devices.push((port, device));
    }

    fn reset(&mut self, _cb: &mut dyn CoreCallbacks) {
        let mut state = self.probe.lock();
        state.resets += 1;
        state.frame = 0;
        state.hash = 0;
    }

    fn run(&mut self, cb: &mut dyn CoreCallbacks) {
        cb.input_poll();
        let input = [0, 1].map(|port| cb.input_state(port, device::JOYPAD, 0, joypad::MASK) as u16);
        let mut av = AvEnable::empty();
        cb.environment(EnvRequest::GetAudioVideoEnable(&mut av));
        let mut context = SavestateContext::Normal;
        cb.environment(EnvRequest::GetSavestateContext(&mut context));

        let (frame, pixels) = {
            let mut state = self.probe.lock();
            let frame = state.frame;
            state.hash = state
                .hash
                .wrapping_mul(0x100_0000_01b3)
                .wrapping_add(u64::from(input[0]) << 16 | u64::from(input[1]))
                .wrapping_add(frame);
            state.frame += 1;
            state.runs.push(RunRecord {
                frame,
                input,
                av,
                context,
            });
            (frame, state.hash.to_le_bytes())
        };

        cb.video_refresh(Some(VideoFrame {
            data: &pixels,
            width: 2,
            height: 1,
            pitch: 8,
        }));
        let sample = frame as i16;
        cb.audio_sample_batch(&[sample, sample, sample, sample]);
    }

    fn serialize_size(&mut self, _cb: &mut dyn CoreCallbacks) -> usize {
        self.state_size()
    }

    fn serialize(&mut self, _cb: &mut dyn CoreCallbacks, buf: &mut [u8]) -> bool {
        let size = self.state_size();
        if size == 0 || buf.len() < size {
            return false;
        }
        let state = self.probe.lock();
        buf[..8].copy_from_slice(&state.frame.to_le_bytes());
        buf[8..16].copy_from_slice(&state.hash.to_le_bytes());
        buf[16..].fill(0);
        true
    }

    fn unserialize(&mut self, _cb: &mut dyn CoreCallbacks, buf: &[u8]) -> bool {
        if !self.savestates || buf.len() < STATE_HEADER {
            return false;
        }
        let mut frame = [0u8; 8];
        let mut hash = [0u8; 8];
        frame.copy_from_slice(&buf[..8]);
        hash.copy_from_slice(&buf[8..16]);
        let mut state = self.probe.lock();
        state.frame = u64::from_le_bytes(frame);
        state.hash = u64::from_le_bytes(hash);
        let frame = state.frame;
        state.unserialized.push(frame);
        true
    }

    fn cheat_reset(&mut self, _cb: &mut dyn CoreCallbacks) {
        self.probe.lock().cheats.clear();
    }

    fn cheat_set(&mut self, _cb: &mut dyn CoreCallbacks, index: u32, enabled: bool, code: &str) {
        self.probe
            .lock()
            .cheats
            .push((index, enabled, code.to_string()));
    }

    fn load_game(&mut self, _cb: &mut dyn CoreCallbacks, game: Option<&GameInfo>) -> bool {
        if game.is_none() && !self.no_game {
            return false;
        }
        self.probe.lock().loaded = game.cloned();
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

    fn unload_game(&mut self, _cb: &mut dyn CoreCallbacks) {
        self.probe.lock().unloaded = true;
    }

    fn region(&mut self) -> Region {
        Region::Ntsc
    }

    fn memory_data(&mut self, id: u32) -> Option<&mut [u8]> {
        (id == memory::SAVE_RAM && !self.sram.is_empty()).then_some(self.sram.as_mut_slice())
    }

    fn memory_size(&mut self, id: u32) -> usize {
        if id == memory::SAVE_RAM {
            self.sram.len()
        } else {
            0
        }
    }

    fn disk_control(&mut self) -> Option<&mut dyn DiskControl> {
        self.disks.as_mut().map(|d| d as &mut dyn DiskControl)
    }
}
