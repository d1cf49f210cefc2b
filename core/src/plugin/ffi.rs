//! C layout of the core ABI
//!
//! Only what [`super::dynamic`] reads or writes is declared here.

#![allow(dead_code)]

use std::ffi::{c_char, c_int, c_uint, c_void};

pub type EnvironmentFn = unsafe extern "C" fn(cmd: c_uint, data: *mut c_void) -> bool;
pub type VideoRefreshFn =
    unsafe extern "C" fn(data: *const c_void, width: c_uint, height: c_uint, pitch: usize);
pub type AudioSampleFn = unsafe extern "C" fn(left: i16, right: i16);
pub type AudioSampleBatchFn = unsafe extern "C" fn(data: *const i16, frames: usize) -> usize;
pub type InputPollFn = unsafe extern "C" fn();
pub type InputStateFn =
    unsafe extern "C" fn(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16;

/// Declared without the trailing varargs: the host only reads the two named
/// arguments, which every supported calling convention passes identically.
pub type LogPrintfFn = unsafe extern "C" fn(level: c_uint, fmt: *const c_char);

pub type KeyboardEventFn =
    unsafe extern "C" fn(down: bool, keycode: c_uint, character: u32, key_modifiers: u16);
pub type FrameTimeFn = unsafe extern "C" fn(usec: i64);
pub type AudioCallbackFn = unsafe extern "C" fn();
pub type AudioSetStateFn = unsafe extern "C" fn(enabled: bool);
pub type UpdateDisplayFn = unsafe extern "C" fn() -> bool;
pub type ProcAddressFn = unsafe extern "C" fn(sym: *const c_char) -> *const c_void;
pub type CurrentFramebufferFn = unsafe extern "C" fn() -> usize;
pub type HwContextResetFn = unsafe extern "C" fn();
pub type ClearThreadWaitsFn = unsafe extern "C" fn(clear_threads: c_uint, data: *mut c_void) -> bool;

/// Sentinel frame pointer meaning "the frame is in the hardware framebuffer".
pub const HW_FRAME_BUFFER_VALID: *const c_void = usize::MAX as *const c_void;

pub const NUM_CORE_OPTION_VALUES_MAX: usize = 128;

#[repr(C)]
pub struct RetroSystemInfo {
    pub library_name: *const c_char,
    pub library_version: *const c_char,
    pub valid_extensions: *const c_char,
    pub need_fullpath: bool,
    pub block_extract: bool,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct RetroGameGeometry {
    pub base_width: c_uint,
    pub base_height: c_uint,
    pub max_width: c_uint,
    pub max_height: c_uint,
    pub aspect_ratio: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct RetroSystemTiming {
    pub fps: f64,
    pub sample_rate: f64,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct RetroSystemAvInfo {
    pub geometry: RetroGameGeometry,
    pub timing: RetroSystemTiming,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RetroGameInfo {
    pub path: *const c_char,
    pub data: *const c_void,
    pub size: usize,
    pub meta: *const c_char,
}

#[repr(C)]
pub struct RetroVariable {
    pub key: *const c_char,
    pub value: *const c_char,
}

#[repr(C)]
pub struct RetroMessage {
    pub msg: *const c_char,
    pub frames: c_uint,
}

#[repr(C)]
pub struct RetroMessageExt {
    pub msg: *const c_char,
    pub duration: c_uint,
    pub priority: c_uint,
    pub level: c_int,
    pub target: c_int,
    pub kind: c_int,
    pub progress: i8,
}

#[repr(C)]
pub struct RetroInputDescriptor {
    pub port: c_uint,
    pub device: c_uint,
    pub index: c_uint,
    pub id: c_uint,
    pub description: *const c_char,
}

#[repr(C)]
pub struct RetroKeyboardCallback {
    pub callback: Option<KeyboardEventFn>,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RetroDiskControlCallback {
    pub set_eject_state: Option<unsafe extern "C" fn(ejected: bool) -> bool>,
    pub get_eject_state: Option<unsafe extern "C" fn() -> bool>,
    pub get_image_index: Option<unsafe extern "C" fn() -> c_uint>,
    pub set_image_index: Option<unsafe extern "C" fn(index: c_uint) -> bool>,
    pub get_num_images: Option<unsafe extern "C" fn() -> c_uint>,
    pub replace_image_index:
        Option<unsafe extern "C" fn(index: c_uint, info: *const RetroGameInfo) -> bool>,
    pub add_image_index: Option<unsafe extern "C" fn() -> bool>,
}

#[repr(C)]
pub struct RetroHwRenderCallback {
    pub context_type: c_int,
    pub context_reset: Option<HwContextResetFn>,
    pub get_current_framebuffer: Option<CurrentFramebufferFn>,
    pub get_proc_address: Option<ProcAddressFn>,
    pub depth: bool,
    pub stencil: bool,
    pub bottom_left_origin: bool,
    pub version_major: c_uint,
    pub version_minor: c_uint,
    pub cache_context: bool,
    pub context_destroy: Option<HwContextResetFn>,
    pub debug_context: bool,
}

#[repr(C)]
pub struct RetroFrameTimeCallback {
    pub callback: Option<FrameTimeFn>,
    pub reference: i64,
}

#[repr(C)]
pub struct RetroAudioCallback {
    pub callback: Option<AudioCallbackFn>,
    pub set_state: Option<AudioSetStateFn>,
}

#[repr(C)]
pub struct RetroRumbleInterface {
    pub set_rumble_state:
        Option<unsafe extern "C" fn(port: c_uint, effect: c_int, strength: u16) -> bool>,
}

#[repr(C)]
pub struct RetroSensorInterface {
    pub set_sensor_state:
        Option<unsafe extern "C" fn(port: c_uint, action: c_int, rate: c_uint) -> bool>,
    pub get_sensor_input: Option<unsafe extern "C" fn(port: c_uint, id: c_uint) -> f32>,
}

#[repr(C)]
pub struct RetroLogCallback {
    pub log: Option<LogPrintfFn>,
}

#[repr(C)]
pub struct RetroPerfCounter {
    pub ident: *const c_char,
    pub start: u64,
    pub total: u64,
    pub call_cnt: u64,
    pub registered: bool,
}

#[repr(C)]
pub struct RetroPerfCallback {
    pub get_time_usec: Option<unsafe extern "C" fn() -> i64>,
    pub get_cpu_features: Option<unsafe extern "C" fn() -> u64>,
    pub get_perf_counter: Option<unsafe extern "C" fn() -> u64>,
    pub perf_register: Option<unsafe extern "C" fn(counter: *mut RetroPerfCounter)>,
    pub perf_start: Option<unsafe extern "C" fn(counter: *mut RetroPerfCounter)>,
    pub perf_stop: Option<unsafe extern "C" fn(counter: *mut RetroPerfCounter)>,
    pub perf_log: Option<unsafe extern "C" fn()>,
}

#[repr(C)]
pub struct RetroSubsystemMemoryInfo {
    pub extension: *const c_char,
    pub kind: c_uint,
}

#[repr(C)]
pub struct RetroSubsystemRomInfo {
    pub desc: *const c_char,
    pub valid_extensions: *const c_char,
    pub need_fullpath: bool,
    pub block_extract: bool,
    pub required: bool,
    pub memory: *const RetroSubsystemMemoryInfo,
    pub num_memory: c_uint,
}

#[repr(C)]
pub struct RetroSubsystemInfo {
    pub desc: *const c_char,
    pub ident: *const c_char,
    pub roms: *const RetroSubsystemRomInfo,
    pub num_roms: c_uint,
    pub id: c_uint,
}

#[repr(C)]
pub struct RetroControllerDescription {
    pub desc: *const c_char,
    pub id: c_uint,
}

#[repr(C)]
pub struct RetroControllerInfo {
    pub types: *const RetroControllerDescription,
    pub num_types: c_uint,
}

#[repr(C)]
pub struct RetroCoreOptionValue {
    pub value: *const c_char,
    pub label: *const c_char,
}

#[repr(C)]
pub struct RetroCoreOptionDefinition {
    pub key: *const c_char,
    pub desc: *const c_char,
    pub info: *const c_char,
    pub values: [RetroCoreOptionValue; NUM_CORE_OPTION_VALUES_MAX],
    pub default_value: *const c_char,
}

#[repr(C)]
pub struct RetroCoreOptionsIntl {
    pub us: *const RetroCoreOptionDefinition,
    pub local: *const RetroCoreOptionDefinition,
}

#[repr(C)]
pub struct RetroCoreOptionV2Category {
    pub key: *const c_char,
    pub desc: *const c_char,
    pub info: *const c_char,
}

#[repr(C)]
pub struct RetroCoreOptionV2Definition {
    pub key: *const c_char,
    pub desc: *const c_char,
    pub desc_categorized: *const c_char,
    pub info: *const c_char,
    pub info_categorized: *const c_char,
    pub category_key: *const c_char,
    pub values: [RetroCoreOptionValue; NUM_CORE_OPTION_VALUES_MAX],
    pub default_value: *const c_char,
}

#[repr(C)]
pub struct RetroCoreOptionsV2 {
    pub categories: *const RetroCoreOptionV2Category,
    pub definitions: *const RetroCoreOptionV2Definition,
}

#[repr(C)]
pub struct RetroCoreOptionsV2Intl {
    pub us: *const RetroCoreOptionsV2,
    pub local: *const RetroCoreOptionsV2,
}

#[repr(C)]
pub struct RetroCoreOptionDisplay {
    pub key: *const c_char,
    pub visible: bool,
}

#[repr(C)]
pub struct RetroCoreOptionsUpdateDisplayCallback {
    pub callback: Option<UpdateDisplayFn>,
}

// Exported entry points of a core.
pub type SetEnvironmentFn = unsafe extern "C" fn(EnvironmentFn);
pub type SetVideoRefreshFn = unsafe extern "C" fn(VideoRefreshFn);
pub type SetAudioSampleFn = unsafe extern "C" fn(AudioSampleFn);
pub type SetAudioSampleBatchFn = unsafe extern "C" fn(AudioSampleBatchFn);
pub type SetInputPollFn = unsafe extern "C" fn(InputPollFn);
pub type SetInputStateFn = unsafe extern "C" fn(InputStateFn);
pub type VoidFn = unsafe extern "C" fn();
pub type ApiVersionFn = unsafe extern "C" fn() -> c_uint;
pub type GetSystemInfoFn = unsafe extern "C" fn(*mut RetroSystemInfo);
pub type GetSystemAvInfoFn = unsafe extern "C" fn(*mut RetroSystemAvInfo);
pub type SetControllerPortDeviceFn = unsafe extern "C" fn(port: c_uint, device: c_uint);
pub type SerializeSizeFn = unsafe extern "C" fn() -> usize;
pub type SerializeFn = unsafe extern "C" fn(data: *mut c_void, size: usize) -> bool;
pub type UnserializeFn = unsafe extern "C" fn(data: *const c_void, size: usize) -> bool;
pub type CheatSetFn = unsafe extern "C" fn(index: c_uint, enabled: bool, code: *const c_char);
pub type LoadGameFn = unsafe extern "C" fn(game: *const RetroGameInfo) -> bool;
pub type LoadGameSpecialFn =
    unsafe extern "C" fn(game_type: c_uint, info: *const RetroGameInfo, num_info: usize) -> bool;
pub type GetRegionFn = unsafe extern "C" fn() -> c_uint;
pub type GetMemoryDataFn = unsafe extern "C" fn(id: c_uint) -> *mut c_void;
pub type GetMemorySizeFn = unsafe extern "C" fn(id: c_uint) -> usize;
