//! Host context: everything the frame loop, commands and environment
//! callback share, owned in one place and passed down explicitly.

use std::collections::VecDeque;
use std::path::PathBuf;

use retrohost_shared::{PixelFormat, Rotation, SystemAvInfo, SystemInfo};

use super::pacing::{FrameLimiter, FrameTimer};
use crate::autosave::Autosave;
use crate::cheats::CheatManager;
use crate::command::Command;
use crate::config::Settings;
use crate::core_options::CoreOptionManager;
use crate::drivers::Drivers;
use crate::input::{Hotkeys, InputLayer};
use crate::message_queue::MessageQueue;
use crate::plugin::env::{ControllerDescription, HwRenderRequest, InputDescriptor, SubsystemInfo};
use crate::replay::ReplayFlags;
use crate::savefile::{SaveFile, SramMode};
use crate::savestate::RewindManager;

/// Role requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetplayRole {
    Host,
    Client { server: String },
}

/// Soft-patch flags. Recorded and logged; patching itself is not performed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOptions {
    pub ups: Option<PathBuf>,
    pub bps: Option<PathBuf>,
    pub ips: Option<PathBuf>,
    pub no_patch: bool,
}

/// Per-launch options that do not belong in the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub core_path: Option<PathBuf>,
    pub content: Option<PathBuf>,
    /// Subsystem identifier and its content files.
    pub subsystem: Option<String>,
    pub subsystem_content: Vec<PathBuf>,
    pub start_in_menu: bool,
    /// Save file directory, or the `.srm` path itself.
    pub save_path: Option<PathBuf>,
    /// Savestate directory, or the state path itself.
    pub savestate_path: Option<PathBuf>,
    pub sram_mode: SramMode,
    pub netplay: Option<NetplayRole>,
    /// Exit after this many frames.
    pub max_frames: Option<u64>,
    pub patches: PatchOptions,
}

/// Frame loop flags.
#[derive(Debug, Clone, Default)]
pub struct RunloopState {
    /// Frames the core has run (the "real" ones; replays excluded).
    pub frame_count: u64,
    pub paused: bool,
    pub idle: bool,
    /// Fast-forward: toggle XOR hold.
    pub nonblock: bool,
    /// Latched state of the fast-forward toggle key.
    pub fastforward_toggle: bool,
    /// Slow motion held this tick.
    pub slowmotion: bool,
    /// Slow motion forced by netplay to let the peer catch up.
    pub netplay_slowmotion: bool,
    /// Core requested `SHUTDOWN` (or a quit was confirmed).
    pub shutdown: bool,
    /// Set when quitting was initiated by the core rather than the user.
    pub core_shutdown: bool,
    /// `EXEC` requested a restart.
    pub exec: bool,
    pub menu_alive: bool,
    pub last_input: Hotkeys,
    /// Rewind popped a state this tick; audio runs reversed.
    pub frame_is_reverse: bool,
    pub game_focus: bool,
    pub grab_mouse: bool,
}

impl RunloopState {
    /// Slow motion from either the hotkey or netplay catch-up.
    pub fn is_slowmotion(&self) -> bool {
        self.slowmotion || self.netplay_slowmotion
    }
}

/// What the loaded core has told us about itself.
#[derive(Debug, Clone, Default)]
pub struct SystemState {
    pub info: SystemInfo,
    pub av: SystemAvInfo,
    pub pixel_format: PixelFormat,
    pub rotation: Rotation,
    pub hw_render: Option<HwRenderRequest>,
    pub input_descriptors: Vec<InputDescriptor>,
    pub controller_info: Vec<Vec<ControllerDescription>>,
    pub subsystems: Vec<SubsystemInfo>,
    pub disk_control: bool,
    pub keyboard_callback: bool,
    pub audio_callback: bool,
    /// Reference delta registered with `SET_FRAME_TIME_CALLBACK`.
    pub frame_time_reference: Option<i64>,
    pub support_no_game: bool,
    pub performance_level: u32,
    pub options_display_callback: bool,
    pub shared_hw_context: bool,
    pub libretro_path: Option<PathBuf>,
}

/// Loaded content and where its files go.
#[derive(Debug, Clone, Default)]
pub struct ContentState {
    pub path: Option<PathBuf>,
    /// File stem of the content, or the core name without content.
    pub basename: String,
    pub crc: u32,
    /// Content (or no-content mode) initialized successfully.
    pub loaded: bool,
    /// Core runs without content.
    pub no_content: bool,
    pub save_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub save_files: Vec<SaveFile>,
    /// Save RAM is written back on unload.
    pub use_sram: bool,
}

impl ContentState {
    /// Basename for state files: `{basename}.state`.
    pub fn state_basename(&self) -> String {
        format!("{}.state", self.basename)
    }
}

/// Settings overridden while netplay runs.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedSettings {
    pub frame_delay: u32,
    pub pause_libretro: bool,
    pub pause_nonactive: bool,
    pub slowmotion_ratio: f32,
}

pub struct HostContext {
    pub settings: Settings,
    pub launch: LaunchOptions,
    pub runloop: RunloopState,
    pub messages: MessageQueue,
    pub input: InputLayer,
    pub drivers: Drivers,
    pub system: SystemState,
    pub content: ContentState,
    pub options: Option<CoreOptionManager>,
    pub cheats: Option<CheatManager>,
    pub rewind: Option<RewindManager>,
    pub autosave: Vec<Autosave>,
    pub limiter: FrameLimiter,
    pub frame_timer: FrameTimer,
    pub replay: ReplayFlags,
    /// Commands raised from inside core callbacks, dispatched once the core
    /// returns.
    pub pending: VecDeque<Command>,
    pub netplay_mask: Option<MaskedSettings>,
}

impl HostContext {
    pub fn new(settings: Settings, drivers: Drivers) -> Self {
        let input = InputLayer::new(&settings.input);
        let replay = ReplayFlags {
            fast_savestates: settings.runloop.preempt_fast_savestates,
            ..ReplayFlags::default()
        };
        Self {
            settings,
            launch: LaunchOptions::default(),
            runloop: RunloopState::default(),
            messages: MessageQueue::default(),
            input,
            drivers,
            system: SystemState::default(),
            content: ContentState::default(),
            options: None,
            cheats: None,
            rewind: None,
            autosave: Vec::new(),
            limiter: FrameLimiter::default(),
            frame_timer: FrameTimer::default(),
            replay,
            pending: VecDeque::new(),
            netplay_mask: None,
        }
    }

    /// Fps used for pacing and message durations.
    pub fn throttled_fps(&self) -> f64 {
        if self.settings.runloop.throttle_using_core_fps && self.system.av.timing.fps > 0.0 {
            self.system.av.timing.fps
        } else {
            self.settings.video.refresh_rate
        }
    }

    /// Effective mute: user setting or audio disabled.
    pub fn audio_muted(&self) -> bool {
        self.settings.audio.mute || !self.settings.audio.enable
    }

    /// Queue a message and log it at info level.
    pub fn notify(&self, msg: &str, priority: u32, duration: u32) {
        tracing::info!("{msg}");
        self.messages.push(msg, priority, duration, true);
    }

    /// Queue a message and log it as a warning.
    pub fn warn(&self, msg: &str, priority: u32, duration: u32) {
        tracing::warn!("{msg}");
        self.messages.push(msg, priority, duration, true);
    }

    /// Queue a command for dispatch after the current core call returns.
    pub fn defer(&mut self, command: Command) {
        if !self.pending.contains(&command) {
            self.pending.push_back(command);
        }
    }
}
