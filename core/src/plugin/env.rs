//! Typed environment requests
//!
//! Each request a core can issue through its environment callback, with
//! out-parameters borrowed mutably for the duration of the call.

use std::path::PathBuf;

use retrohost_shared::{
    AvEnable, GameGeometry, HwContextType, Language, LogLevel, SavestateContext, SystemAvInfo,
};

/// `(port, device, index, id)` and the name the core gives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDescriptor {
    pub port: u32,
    pub device: u32,
    pub index: u32,
    pub id: u32,
    pub description: String,
}

/// A device type a core accepts on a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerDescription {
    pub description: String,
    pub id: u32,
}

/// One content slot of a subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsystemRom {
    pub description: String,
    pub valid_extensions: String,
    pub need_fullpath: bool,
    pub required: bool,
}

/// Special game type loadable through `load_game_special`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsystemInfo {
    pub description: String,
    pub ident: String,
    pub id: u32,
    pub roms: Vec<SubsystemRom>,
}

/// One selectable value of a core option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionValue {
    pub value: String,
    pub label: Option<String>,
}

/// Core option schema entry from `SET_CORE_OPTIONS*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreOptionDefinition {
    pub key: String,
    pub desc: String,
    pub info: Option<String>,
    pub category: Option<String>,
    pub values: Vec<OptionValue>,
    pub default_value: Option<String>,
}

/// Core option category from `SET_CORE_OPTIONS_V2*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreOptionCategory {
    pub key: String,
    pub desc: String,
    pub info: Option<String>,
}

/// Accelerated context request from `SET_HW_RENDER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwRenderRequest {
    pub context_type: HwContextType,
    pub version_major: u32,
    pub version_minor: u32,
    pub depth: bool,
    pub stencil: bool,
    pub bottom_left_origin: bool,
    pub cache_context: bool,
    pub debug_context: bool,
}

/// Host vtables a core may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostInterface {
    Rumble,
    Sensor,
    Log,
    Perf,
    ClearThreadWaits,
}

/// Frontend-private restart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub path: Option<PathBuf>,
    /// Also leave the menu after restarting.
    pub escape: bool,
}

/// An environment call, decoded.
#[derive(Debug)]
pub enum EnvRequest<'a> {
    SetRotation(u32),
    GetOverscan(&'a mut bool),
    GetCanDupe(&'a mut bool),
    SetMessage {
        msg: String,
        frames: u32,
    },
    SetMessageExt {
        msg: String,
        duration_ms: u32,
        priority: u32,
        level: LogLevel,
        /// 0 = everywhere, 1 = on-screen only, 2 = log only.
        target: u32,
    },
    Shutdown,
    SetPerformanceLevel(u32),
    GetSystemDirectory(&'a mut Option<PathBuf>),
    GetSaveDirectory(&'a mut Option<PathBuf>),
    GetCoreAssetsDirectory(&'a mut Option<PathBuf>),
    GetLibretroPath(&'a mut Option<PathBuf>),
    /// Raw pixel format id; unknown ids must be refused.
    SetPixelFormat(u32),
    SetInputDescriptors(Vec<InputDescriptor>),
    SetKeyboardCallback(bool),
    SetDiskControlInterface(bool),
    SetHwRender(&'a mut HwRenderRequest),
    GetVariable {
        key: &'a str,
        value: &'a mut Option<String>,
    },
    /// Legacy `key = "Description; a|b|c"` variables.
    SetVariables(Vec<(String, String)>),
    GetVariableUpdate(&'a mut bool),
    SetSupportNoGame(bool),
    SetFrameTimeCallback {
        reference_usec: i64,
    },
    SetAudioCallback(bool),
    GetInterface(HostInterface),
    /// Invocation of the thread-wait callback: `true` releases waits.
    ClearAllThreadWaits(bool),
    GetInputDeviceCapabilities(&'a mut u64),
    SetSystemAvInfo(SystemAvInfo),
    SetSubsystemInfo(Vec<SubsystemInfo>),
    /// Per port, the device types the core accepts.
    SetControllerInfo(Vec<Vec<ControllerDescription>>),
    SetGeometry(GameGeometry),
    GetUsername(&'a mut Option<String>),
    GetLanguage(&'a mut Language),
    SetHwSharedContext,
    GetAudioVideoEnable(&'a mut AvEnable),
    GetFastForwarding(&'a mut bool),
    GetTargetRefreshRate(&'a mut f32),
    GetInputBitmasks,
    GetCoreOptionsVersion(&'a mut u32),
    SetCoreOptions {
        version: u32,
        definitions: Vec<CoreOptionDefinition>,
        categories: Vec<CoreOptionCategory>,
    },
    SetCoreOptionsDisplay {
        key: String,
        visible: bool,
    },
    SetCoreOptionsUpdateDisplayCallback(bool),
    GetSavestateContext(&'a mut SavestateContext),
    Exec(ExecRequest),
    Unknown(u32),
}

impl EnvRequest<'_> {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetRotation(_) => "SET_ROTATION",
            Self::GetOverscan(_) => "GET_OVERSCAN",
            Self::GetCanDupe(_) => "GET_CAN_DUPE",
            Self::SetMessage { .. } => "SET_MESSAGE",
            Self::SetMessageExt { .. } => "SET_MESSAGE_EXT",
            Self::Shutdown => "SHUTDOWN",
            Self::SetPerformanceLevel(_) => "SET_PERFORMANCE_LEVEL",
            Self::GetSystemDirectory(_) => "GET_SYSTEM_DIRECTORY",
            Self::GetSaveDirectory(_) => "GET_SAVE_DIRECTORY",
            Self::GetCoreAssetsDirectory(_) => "GET_CORE_ASSETS_DIRECTORY",
            Self::GetLibretroPath(_) => "GET_LIBRETRO_PATH",
            Self::SetPixelFormat(_) => "SET_PIXEL_FORMAT",
            Self::SetInputDescriptors(_) => "SET_INPUT_DESCRIPTORS",
            Self::SetKeyboardCallback(_) => "SET_KEYBOARD_CALLBACK",
            Self::SetDiskControlInterface(_) => "SET_DISK_CONTROL_INTERFACE",
            Self::SetHwRender(_) => "SET_HW_RENDER",
            Self::GetVariable { .. } => "GET_VARIABLE",
            Self::SetVariables(_) => "SET_VARIABLES",
            Self::GetVariableUpdate(_) => "GET_VARIABLE_UPDATE",
            Self::SetSupportNoGame(_) => "SET_SUPPORT_NO_GAME",
            Self::SetFrameTimeCallback { .. } => "SET_FRAME_TIME_CALLBACK",
            Self::SetAudioCallback(_) => "SET_AUDIO_CALLBACK",
            Self::GetInterface(_) => "GET_*_INTERFACE",
            Self::ClearAllThreadWaits(_) => "CLEAR_ALL_THREAD_WAITS",
            Self::GetInputDeviceCapabilities(_) => "GET_INPUT_DEVICE_CAPABILITIES",
            Self::SetSystemAvInfo(_) => "SET_SYSTEM_AV_INFO",
            Self::SetSubsystemInfo(_) => "SET_SUBSYSTEM_INFO",
            Self::SetControllerInfo(_) => "SET_CONTROLLER_INFO",
            Self::SetGeometry(_) => "SET_GEOMETRY",
            Self::GetUsername(_) => "GET_USERNAME",
            Self::GetLanguage(_) => "GET_LANGUAGE",
            Self::SetHwSharedContext => "SET_HW_SHARED_CONTEXT",
            Self::GetAudioVideoEnable(_) => "GET_AUDIO_VIDEO_ENABLE",
            Self::GetFastForwarding(_) => "GET_FASTFORWARDING",
            Self::GetTargetRefreshRate(_) => "GET_TARGET_REFRESH_RATE",
            Self::GetInputBitmasks => "GET_INPUT_BITMASKS",
            Self::GetCoreOptionsVersion(_) => "GET_CORE_OPTIONS_VERSION",
            Self::SetCoreOptions { .. } => "SET_CORE_OPTIONS",
            Self::SetCoreOptionsDisplay { .. } => "SET_CORE_OPTIONS_DISPLAY",
            Self::SetCoreOptionsUpdateDisplayCallback(_) => {
                "SET_CORE_OPTIONS_UPDATE_DISPLAY_CALLBACK"
            }
            Self::GetSavestateContext(_) => "GET_SAVESTATE_CONTEXT",
            Self::Exec(_) => "EXEC",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}
