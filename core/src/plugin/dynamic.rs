//! Shared-library cores loaded with `libloading`
//!
//! The core ABI hands out plain C function pointers, so the host installs a
//! fixed set of `extern "C"` trampolines once at load time. Each host call into
//! the core publishes the active [`CoreCallbacks`] in a thread-local scope for
//! its duration; the trampolines forward into whatever is published. Calls
//! arriving outside of a scope (for example from a core worker thread) are
//! refused.

use std::cell::Cell;
use std::ffi::{CStr, CString, c_char, c_int, c_uint, c_void};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::OnceLock;
use std::time::Instant;

use hashbrown::HashMap;
use libloading::Library;
use retrohost_shared::environment as code;
use retrohost_shared::{
    API_VERSION, AvEnable, GameGeometry, HwContextType, Key, KeyModifiers, Language, LogLevel,
    PixelFormat, Region, SavestateContext, SystemAvInfo, SystemInfo, SystemTiming,
};

use super::env::{
    ControllerDescription, CoreOptionCategory, CoreOptionDefinition, ExecRequest, HostInterface,
    HwRenderRequest, InputDescriptor, OptionValue, SubsystemInfo, SubsystemRom,
};
use super::ffi::{self, RetroGameInfo, RetroPerfCounter};
use super::{
    Core, CoreCallbacks, CoreLoadError, DiskControl, EnvRequest, GameInfo, RumbleEffect,
    SensorAction, VideoFrame,
};

/// Log target for messages emitted by the core itself.
const CORE_LOG_TARGET: &str = "retrohost::core";

/// Entry points resolved from the library.
struct Api {
    set_environment: ffi::SetEnvironmentFn,
    set_video_refresh: ffi::SetVideoRefreshFn,
    set_audio_sample: ffi::SetAudioSampleFn,
    set_audio_sample_batch: ffi::SetAudioSampleBatchFn,
    set_input_poll: ffi::SetInputPollFn,
    set_input_state: ffi::SetInputStateFn,
    init: ffi::VoidFn,
    deinit: ffi::VoidFn,
    api_version: ffi::ApiVersionFn,
    get_system_info: ffi::GetSystemInfoFn,
    get_system_av_info: ffi::GetSystemAvInfoFn,
    set_controller_port_device: ffi::SetControllerPortDeviceFn,
    reset: ffi::VoidFn,
    run: ffi::VoidFn,
    serialize_size: ffi::SerializeSizeFn,
    serialize: ffi::SerializeFn,
    unserialize: ffi::UnserializeFn,
    cheat_reset: ffi::VoidFn,
    cheat_set: ffi::CheatSetFn,
    load_game: ffi::LoadGameFn,
    load_game_special: ffi::LoadGameSpecialFn,
    unload_game: ffi::VoidFn,
    get_region: ffi::GetRegionFn,
    get_memory_data: ffi::GetMemoryDataFn,
    get_memory_size: ffi::GetMemorySizeFn,
}

macro_rules! resolve {
    ($lib:expr, $path:expr, $name:literal, $ty:ty) => {{
        // SAFETY: the symbol is typed with the signature the ABI defines for it.
        let symbol = unsafe { $lib.get::<$ty>(concat!($name, "\0").as_bytes()) }.map_err(
            |source| CoreLoadError::MissingSymbol {
                path: $path.to_path_buf(),
                symbol: $name,
                source,
            },
        )?;
        *symbol
    }};
}

impl Api {
    fn resolve(lib: &Library, path: &Path) -> Result<Self, CoreLoadError> {
        Ok(Self {
            set_environment: resolve!(lib, path, "retro_set_environment", ffi::SetEnvironmentFn),
            set_video_refresh: resolve!(
                lib,
                path,
                "retro_set_video_refresh",
                ffi::SetVideoRefreshFn
            ),
            set_audio_sample: resolve!(lib, path, "retro_set_audio_sample", ffi::SetAudioSampleFn),
            set_audio_sample_batch: resolve!(
                lib,
                path,
                "retro_set_audio_sample_batch",
                ffi::SetAudioSampleBatchFn
            ),
            set_input_poll: resolve!(lib, path, "retro_set_input_poll", ffi::SetInputPollFn),
            set_input_state: resolve!(lib, path, "retro_set_input_state", ffi::SetInputStateFn),
            init: resolve!(lib, path, "retro_init", ffi::VoidFn),
            deinit: resolve!(lib, path, "retro_deinit", ffi::VoidFn),
            api_version: resolve!(lib, path, "retro_api_version", ffi::ApiVersionFn),
            get_system_info: resolve!(lib, path, "retro_get_system_info", ffi::GetSystemInfoFn),
            get_system_av_info: resolve!(
                lib,
                path,
                "retro_get_system_av_info",
                ffi::GetSystemAvInfoFn
            ),
            set_controller_port_device: resolve!(
                lib,
                path,
                "retro_set_controller_port_device",
                ffi::SetControllerPortDeviceFn
            ),
            reset: resolve!(lib, path, "retro_reset", ffi::VoidFn),
            run: resolve!(lib, path, "retro_run", ffi::VoidFn),
            serialize_size: resolve!(lib, path, "retro_serialize_size", ffi::SerializeSizeFn),
            serialize: resolve!(lib, path, "retro_serialize", ffi::SerializeFn),
            unserialize: resolve!(lib, path, "retro_unserialize", ffi::UnserializeFn),
            cheat_reset: resolve!(lib, path, "retro_cheat_reset", ffi::VoidFn),
            cheat_set: resolve!(lib, path, "retro_cheat_set", ffi::CheatSetFn),
            load_game: resolve!(lib, path, "retro_load_game", ffi::LoadGameFn),
            load_game_special: resolve!(
                lib,
                path,
                "retro_load_game_special",
                ffi::LoadGameSpecialFn
            ),
            unload_game: resolve!(lib, path, "retro_unload_game", ffi::VoidFn),
            get_region: resolve!(lib, path, "retro_get_region", ffi::GetRegionFn),
            get_memory_data: resolve!(lib, path, "retro_get_memory_data", ffi::GetMemoryDataFn),
            get_memory_size: resolve!(lib, path, "retro_get_memory_size", ffi::GetMemorySizeFn),
        })
    }
}

/// Callbacks the core registered through the environment, plus strings the
/// host handed out and must keep alive.
struct CoreHooks {
    bytes_per_pixel: usize,
    keyboard: Option<ffi::KeyboardEventFn>,
    frame_time: Option<ffi::FrameTimeFn>,
    audio: Option<ffi::AudioCallbackFn>,
    audio_set_state: Option<ffi::AudioSetStateFn>,
    update_display: Option<ffi::UpdateDisplayFn>,
    disk: Option<DynamicDisk>,
    strings: HashMap<String, CString>,
}

impl Default for CoreHooks {
    fn default() -> Self {
        Self {
            bytes_per_pixel: PixelFormat::default().bytes_per_pixel(),
            keyboard: None,
            frame_time: None,
            audio: None,
            audio_set_state: None,
            update_display: None,
            disk: None,
            strings: HashMap::new(),
        }
    }
}

impl CoreHooks {
    /// Store `value` under `slot` and return a pointer valid until the slot
    /// is overwritten.
    fn intern(&mut self, slot: &str, value: &str) -> *const c_char {
        let Ok(value) = CString::new(value) else {
            return ptr::null();
        };
        let ptr = value.as_ptr();
        self.strings.insert(slot.to_string(), value);
        ptr
    }
}

// ============================================================================
// Call scope
// ============================================================================

#[derive(Clone, Copy)]
struct Scope {
    callbacks: *mut (dyn CoreCallbacks + 'static),
    hooks: *mut CoreHooks,
}

thread_local! {
    static ACTIVE: Cell<Option<Scope>> = const { Cell::new(None) };
}

/// Publishes callbacks for the trampolines until dropped.
struct ScopeGuard {
    previous: Option<Scope>,
}

impl ScopeGuard {
    fn enter(callbacks: &mut dyn CoreCallbacks, hooks: *mut CoreHooks) -> Self {
        let callbacks: *mut (dyn CoreCallbacks + '_) = callbacks;
        // SAFETY: only the trait object lifetime is erased; the pointer is
        // withdrawn in `drop`, before the borrow it came from ends.
        let callbacks = unsafe {
            std::mem::transmute::<*mut (dyn CoreCallbacks + '_), *mut (dyn CoreCallbacks + 'static)>(
                callbacks,
            )
        };
        let previous = ACTIVE.with(|active| active.replace(Some(Scope { callbacks, hooks })));
        Self { previous }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        ACTIVE.with(|active| active.set(self.previous));
    }
}

fn with_active<R>(f: impl FnOnce(&mut dyn CoreCallbacks, &mut CoreHooks) -> R) -> Option<R> {
    let scope = ACTIVE.with(Cell::get)?;
    // SAFETY: a live ScopeGuard on this thread owns both pointers.
    unsafe { Some(f(&mut *scope.callbacks, &mut *scope.hooks)) }
}

// ============================================================================
// Trampolines
// ============================================================================

extern "C" fn environment_trampoline(cmd: c_uint, data: *mut c_void) -> bool {
    with_active(|cb, hooks| {
        // SAFETY: `data` is the pointer the core passed with `cmd`.
        unsafe { dispatch_environment(cb, hooks, cmd, data) }
    })
    .unwrap_or(false)
}

extern "C" fn video_refresh_trampoline(
    data: *const c_void,
    width: c_uint,
    height: c_uint,
    pitch: usize,
) {
    with_active(|cb, hooks| {
        if data.is_null() || data == ffi::HW_FRAME_BUFFER_VALID || height == 0 {
            cb.video_refresh(None);
            return;
        }
        let len = pitch * (height as usize - 1) + width as usize * hooks.bytes_per_pixel;
        // SAFETY: the core guarantees `height` rows of `pitch` bytes.
        let frame = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), len) };
        cb.video_refresh(Some(VideoFrame {
            data: frame,
            width,
            height,
            pitch,
        }));
    });
}

extern "C" fn audio_sample_trampoline(left: i16, right: i16) {
    with_active(|cb, _| cb.audio_sample(left, right));
}

extern "C" fn audio_sample_batch_trampoline(data: *const i16, frames: usize) -> usize {
    if data.is_null() {
        return 0;
    }
    // SAFETY: `frames` interleaved stereo frames.
    let samples = unsafe { std::slice::from_raw_parts(data, frames * 2) };
    with_active(|cb, _| cb.audio_sample_batch(samples)).unwrap_or(frames)
}

extern "C" fn input_poll_trampoline() {
    with_active(|cb, _| cb.input_poll());
}

extern "C" fn input_state_trampoline(
    port: c_uint,
    device: c_uint,
    index: c_uint,
    id: c_uint,
) -> i16 {
    with_active(|cb, _| cb.input_state(port, device, index, id)).unwrap_or(0)
}

extern "C" fn rumble_trampoline(port: c_uint, effect: c_int, strength: u16) -> bool {
    let effect = match effect {
        0 => RumbleEffect::Strong,
        1 => RumbleEffect::Weak,
        _ => return false,
    };
    with_active(|cb, _| cb.set_rumble_state(port, effect, strength)).unwrap_or(false)
}

extern "C" fn sensor_state_trampoline(port: c_uint, action: c_int, rate: c_uint) -> bool {
    let action = match action {
        0 => SensorAction::AccelerometerEnable,
        1 => SensorAction::AccelerometerDisable,
        _ => return false,
    };
    with_active(|cb, _| cb.set_sensor_state(port, action, rate)).unwrap_or(false)
}

extern "C" fn sensor_input_trampoline(port: c_uint, id: c_uint) -> f32 {
    with_active(|cb, _| cb.sensor_input(port, id)).unwrap_or(0.0)
}

extern "C" fn log_trampoline(level: c_uint, fmt: *const c_char) {
    // SAFETY: the core passes a NUL-terminated format string.
    let Some(message) = (unsafe { cstr(fmt) }) else {
        return;
    };
    let message = message.trim_end();
    match LogLevel::from_raw(level) {
        LogLevel::Debug => tracing::debug!(target: CORE_LOG_TARGET, "{message}"),
        LogLevel::Info => tracing::info!(target: CORE_LOG_TARGET, "{message}"),
        LogLevel::Warn => tracing::warn!(target: CORE_LOG_TARGET, "{message}"),
        LogLevel::Error => tracing::error!(target: CORE_LOG_TARGET, "{message}"),
    }
}

extern "C" fn clear_thread_waits_trampoline(clear_threads: c_uint, _data: *mut c_void) -> bool {
    with_active(|cb, _| cb.environment(EnvRequest::ClearAllThreadWaits(clear_threads != 0)))
        .unwrap_or(false)
}

extern "C" fn current_framebuffer_trampoline() -> usize {
    0
}

extern "C" fn proc_address_trampoline(_sym: *const c_char) -> *const c_void {
    ptr::null()
}

fn perf_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

extern "C" fn perf_get_time_usec() -> i64 {
    perf_epoch().elapsed().as_micros() as i64
}

extern "C" fn perf_get_counter() -> u64 {
    perf_epoch().elapsed().as_nanos() as u64
}

extern "C" fn perf_get_cpu_features() -> u64 {
    0
}

extern "C" fn perf_register(counter: *mut RetroPerfCounter) {
    // SAFETY: counters are owned by the core and outlive the call.
    if let Some(counter) = unsafe { counter.as_mut() } {
        counter.registered = true;
    }
}

extern "C" fn perf_start(counter: *mut RetroPerfCounter) {
    // SAFETY: as in `perf_register`.
    if let Some(counter) = unsafe { counter.as_mut() } {
        counter.start = perf_get_counter();
    }
}

extern "C" fn perf_stop(counter: *mut RetroPerfCounter) {
    // SAFETY: as in `perf_register`.
    if let Some(counter) = unsafe { counter.as_mut() } {
        counter.total += perf_get_counter().saturating_sub(counter.start);
        counter.call_cnt += 1;
    }
}

extern "C" fn perf_log() {}

// ============================================================================
// Environment decoding
// ============================================================================

/// Copy a C string; `None` for a null pointer.
unsafe fn cstr(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: caller guarantees NUL termination.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

unsafe fn read<T: Copy>(data: *mut c_void) -> Option<T> {
    // SAFETY: caller guarantees `data` points at a `T` when non-null.
    (!data.is_null()).then(|| unsafe { *data.cast::<T>() })
}

/// Ask the host to fill a plain out-parameter and copy it to the core.
unsafe fn query<T, F>(cb: &mut dyn CoreCallbacks, data: *mut c_void, make: F) -> bool
where
    T: Copy + Default,
    F: for<'a> FnOnce(&'a mut T) -> EnvRequest<'a>,
{
    if data.is_null() {
        return false;
    }
    let mut value = T::default();
    if !cb.environment(make(&mut value)) {
        return false;
    }
    // SAFETY: caller guarantees `data` points at a `T`.
    unsafe { *data.cast::<T>() = value };
    true
}

unsafe fn query_path<F>(
    cb: &mut dyn CoreCallbacks,
    hooks: &mut CoreHooks,
    data: *mut c_void,
    slot: &str,
    make: F,
) -> bool
where
    F: for<'a> FnOnce(&'a mut Option<PathBuf>) -> EnvRequest<'a>,
{
    if data.is_null() {
        return false;
    }
    let mut path = None;
    if !cb.environment(make(&mut path)) {
        return false;
    }
    let out = match path {
        Some(path) => hooks.intern(slot, &path.to_string_lossy()),
        None => ptr::null(),
    };
    // SAFETY: path requests pass a `const char **`.
    unsafe { *data.cast::<*const c_char>() = out };
    true
}

unsafe fn option_values(values: &[ffi::RetroCoreOptionValue]) -> Vec<OptionValue> {
    values
        .iter()
        .take_while(|v| !v.value.is_null())
        .map(|v| OptionValue {
            // SAFETY: non-null entries are NUL-terminated.
            value: unsafe { cstr(v.value) }.unwrap_or_default(),
            label: unsafe { cstr(v.label) },
        })
        .collect()
}

unsafe fn options_v1(mut def: *const ffi::RetroCoreOptionDefinition) -> Vec<CoreOptionDefinition> {
    let mut out = Vec::new();
    // SAFETY: the array is terminated by an entry with a null key.
    unsafe {
        while let Some(d) = def.as_ref() {
            if d.key.is_null() {
                break;
            }
            out.push(CoreOptionDefinition {
                key: cstr(d.key).unwrap_or_default(),
                desc: cstr(d.desc).unwrap_or_default(),
                info: cstr(d.info),
                category: None,
                values: option_values(&d.values),
                default_value: cstr(d.default_value),
            });
            def = def.add(1);
        }
    }
    out
}

unsafe fn options_v2(
    options: *const ffi::RetroCoreOptionsV2,
) -> (Vec<CoreOptionDefinition>, Vec<CoreOptionCategory>) {
    let mut definitions = Vec::new();
    let mut categories = Vec::new();
    // SAFETY: both arrays are terminated by an entry with a null key.
    unsafe {
        let Some(options) = options.as_ref() else {
            return (definitions, categories);
        };
        let mut cat = options.categories;
        while let Some(c) = cat.as_ref() {
            if c.key.is_null() {
                break;
            }
            categories.push(CoreOptionCategory {
                key: cstr(c.key).unwrap_or_default(),
                desc: cstr(c.desc).unwrap_or_default(),
                info: cstr(c.info),
            });
            cat = cat.add(1);
        }
        let mut def = options.definitions;
        while let Some(d) = def.as_ref() {
            if d.key.is_null() {
                break;
            }
            definitions.push(CoreOptionDefinition {
                key: cstr(d.key).unwrap_or_default(),
                desc: cstr(d.desc).unwrap_or_default(),
                info: cstr(d.info),
                category: cstr(d.category_key),
                values: option_values(&d.values),
                default_value: cstr(d.default_value),
            });
            def = def.add(1);
        }
    }
    (definitions, categories)
}

unsafe fn input_descriptors(mut desc: *const ffi::RetroInputDescriptor) -> Vec<InputDescriptor> {
    let mut out = Vec::new();
    // SAFETY: terminated by an entry with a null description.
    unsafe {
        while let Some(d) = desc.as_ref() {
            let Some(description) = cstr(d.description) else {
                break;
            };
            out.push(InputDescriptor {
                port: d.port,
                device: d.device,
                index: d.index,
                id: d.id,
                description,
            });
            desc = desc.add(1);
        }
    }
    out
}

unsafe fn variables(mut var: *const ffi::RetroVariable) -> Vec<(String, String)> {
    let mut out = Vec::new();
    // SAFETY: terminated by an entry with a null key.
    unsafe {
        while let Some(v) = var.as_ref() {
            let Some(key) = cstr(v.key) else {
                break;
            };
            out.push((key, cstr(v.value).unwrap_or_default()));
            var = var.add(1);
        }
    }
    out
}

unsafe fn subsystems(mut info: *const ffi::RetroSubsystemInfo) -> Vec<SubsystemInfo> {
    let mut out = Vec::new();
    // SAFETY: terminated by an entry with a null ident; `roms` holds
    // `num_roms` entries.
    unsafe {
        while let Some(s) = info.as_ref() {
            let Some(ident) = cstr(s.ident) else {
                break;
            };
            let roms = if s.roms.is_null() {
                &[][..]
            } else {
                std::slice::from_raw_parts(s.roms, s.num_roms as usize)
            };
            out.push(SubsystemInfo {
                description: cstr(s.desc).unwrap_or_default(),
                ident,
                id: s.id,
                roms: roms
                    .iter()
                    .map(|r| SubsystemRom {
                        description: cstr(r.desc).unwrap_or_default(),
                        valid_extensions: cstr(r.valid_extensions).unwrap_or_default(),
                        need_fullpath: r.need_fullpath,
                        required: r.required,
                    })
                    .collect(),
            });
            info = info.add(1);
        }
    }
    out
}

unsafe fn controllers(mut info: *const ffi::RetroControllerInfo) -> Vec<Vec<ControllerDescription>> {
    let mut out = Vec::new();
    // SAFETY: terminated by an entry with null `types`.
    unsafe {
        while let Some(port) = info.as_ref() {
            if port.types.is_null() {
                break;
            }
            let types = std::slice::from_raw_parts(port.types, port.num_types as usize);
            out.push(
                types
                    .iter()
                    .map(|t| ControllerDescription {
                        description: cstr(t.desc).unwrap_or_default(),
                        id: t.id,
                    })
                    .collect(),
            );
            info = info.add(1);
        }
    }
    out
}

fn geometry_from(raw: &ffi::RetroGameGeometry) -> GameGeometry {
    GameGeometry {
        base_width: raw.base_width,
        base_height: raw.base_height,
        max_width: raw.max_width,
        max_height: raw.max_height,
        aspect_ratio: raw.aspect_ratio,
    }
}

fn av_info_from(raw: &ffi::RetroSystemAvInfo) -> SystemAvInfo {
    SystemAvInfo {
        geometry: geometry_from(&raw.geometry),
        timing: SystemTiming {
            fps: raw.timing.fps,
            sample_rate: raw.timing.sample_rate,
        },
    }
}

/// Decode one raw environment call and hand it to the host.
unsafe fn dispatch_environment(
    cb: &mut dyn CoreCallbacks,
    hooks: &mut CoreHooks,
    cmd: c_uint,
    data: *mut c_void,
) -> bool {
    // SAFETY (whole body): `data` has the layout the ABI defines for `cmd`.
    unsafe {
        match cmd {
            code::SET_ROTATION => read::<c_uint>(data)
                .is_some_and(|r| cb.environment(EnvRequest::SetRotation(r))),
            code::GET_OVERSCAN => query(cb, data, |v| EnvRequest::GetOverscan(v)),
            code::GET_CAN_DUPE => query(cb, data, |v| EnvRequest::GetCanDupe(v)),
            code::SET_MESSAGE => {
                let Some(msg) = data.cast::<ffi::RetroMessage>().as_ref() else {
                    return false;
                };
                cb.environment(EnvRequest::SetMessage {
                    msg: cstr(msg.msg).unwrap_or_default(),
                    frames: msg.frames,
                })
            }
            code::SET_MESSAGE_EXT => {
                let Some(msg) = data.cast::<ffi::RetroMessageExt>().as_ref() else {
                    return false;
                };
                cb.environment(EnvRequest::SetMessageExt {
                    msg: cstr(msg.msg).unwrap_or_default(),
                    duration_ms: msg.duration,
                    priority: msg.priority,
                    level: LogLevel::from_raw(msg.level as u32),
                    target: msg.target as u32,
                })
            }
            code::SHUTDOWN => cb.environment(EnvRequest::Shutdown),
            code::SET_PERFORMANCE_LEVEL => read::<c_uint>(data)
                .is_some_and(|level| cb.environment(EnvRequest::SetPerformanceLevel(level))),
            code::GET_SYSTEM_DIRECTORY => {
                query_path(cb, hooks, data, "system", |p| EnvRequest::GetSystemDirectory(p))
            }
            code::GET_SAVE_DIRECTORY => {
                query_path(cb, hooks, data, "save", |p| EnvRequest::GetSaveDirectory(p))
            }
            code::GET_CORE_ASSETS_DIRECTORY => {
                query_path(cb, hooks, data, "assets", |p| EnvRequest::GetCoreAssetsDirectory(p))
            }
            code::GET_LIBRETRO_PATH => {
                query_path(cb, hooks, data, "libretro", |p| EnvRequest::GetLibretroPath(p))
            }
            code::SET_PIXEL_FORMAT => {
                let Some(raw) = read::<c_int>(data) else {
                    return false;
                };
                let accepted = cb.environment(EnvRequest::SetPixelFormat(raw as u32));
                if accepted && let Ok(format) = PixelFormat::from_raw(raw as u32) {
                    hooks.bytes_per_pixel = format.bytes_per_pixel();
                }
                accepted
            }
            code::SET_INPUT_DESCRIPTORS => {
                let descriptors = input_descriptors(data.cast());
                cb.environment(EnvRequest::SetInputDescriptors(descriptors))
            }
            code::SET_KEYBOARD_CALLBACK => {
                let callback = data
                    .cast::<ffi::RetroKeyboardCallback>()
                    .as_ref()
                    .and_then(|k| k.callback);
                let accepted = cb.environment(EnvRequest::SetKeyboardCallback(callback.is_some()));
                hooks.keyboard = if accepted { callback } else { None };
                accepted
            }
            code::SET_DISK_CONTROL_INTERFACE => {
                let Some(iface) = read::<ffi::RetroDiskControlCallback>(data) else {
                    return false;
                };
                let accepted = cb.environment(EnvRequest::SetDiskControlInterface(true));
                hooks.disk = accepted.then_some(DynamicDisk(iface));
                accepted
            }
            code::SET_HW_RENDER => {
                let Some(raw) = data.cast::<ffi::RetroHwRenderCallback>().as_mut() else {
                    return false;
                };
                let Ok(context_type) = HwContextType::from_raw(raw.context_type as u32) else {
                    return false;
                };
                let mut request = HwRenderRequest {
                    context_type,
                    version_major: raw.version_major,
                    version_minor: raw.version_minor,
                    depth: raw.depth,
                    stencil: raw.stencil,
                    bottom_left_origin: raw.bottom_left_origin,
                    cache_context: raw.cache_context,
                    debug_context: raw.debug_context,
                };
                if !cb.environment(EnvRequest::SetHwRender(&mut request)) {
                    return false;
                }
                raw.get_current_framebuffer = Some(current_framebuffer_trampoline);
                raw.get_proc_address = Some(proc_address_trampoline);
                true
            }
            code::GET_VARIABLE => {
                let Some(var) = data.cast::<ffi::RetroVariable>().as_mut() else {
                    return false;
                };
                let Some(key) = cstr(var.key) else {
                    return false;
                };
                let mut value = None;
                let found = cb.environment(EnvRequest::GetVariable {
                    key: &key,
                    value: &mut value,
                });
                var.value = match value {
                    Some(value) if found => hooks.intern(&format!("var:{key}"), &value),
                    _ => ptr::null(),
                };
                found
            }
            code::SET_VARIABLES => {
                let vars = variables(data.cast());
                cb.environment(EnvRequest::SetVariables(vars))
            }
            code::GET_VARIABLE_UPDATE => query(cb, data, |v| EnvRequest::GetVariableUpdate(v)),
            code::SET_SUPPORT_NO_GAME => read::<bool>(data)
                .is_some_and(|supported| cb.environment(EnvRequest::SetSupportNoGame(supported))),
            code::SET_FRAME_TIME_CALLBACK => {
                let Some(raw) = data.cast::<ffi::RetroFrameTimeCallback>().as_ref() else {
                    return false;
                };
                let accepted = cb.environment(EnvRequest::SetFrameTimeCallback {
                    reference_usec: raw.reference,
                });
                hooks.frame_time = if accepted { raw.callback } else { None };
                accepted
            }
            code::SET_AUDIO_CALLBACK => {
                let raw = data.cast::<ffi::RetroAudioCallback>().as_ref();
                let callback = raw.and_then(|a| a.callback);
                let accepted = cb.environment(EnvRequest::SetAudioCallback(callback.is_some()));
                hooks.audio = if accepted { callback } else { None };
                hooks.audio_set_state = if accepted {
                    raw.and_then(|a| a.set_state)
                } else {
                    None
                };
                accepted
            }
            code::GET_RUMBLE_INTERFACE => {
                let Some(iface) = data.cast::<ffi::RetroRumbleInterface>().as_mut() else {
                    return false;
                };
                if !cb.environment(EnvRequest::GetInterface(HostInterface::Rumble)) {
                    return false;
                }
                iface.set_rumble_state = Some(rumble_trampoline);
                true
            }
            code::GET_SENSOR_INTERFACE => {
                let Some(iface) = data.cast::<ffi::RetroSensorInterface>().as_mut() else {
                    return false;
                };
                if !cb.environment(EnvRequest::GetInterface(HostInterface::Sensor)) {
                    return false;
                }
                iface.set_sensor_state = Some(sensor_state_trampoline);
                iface.get_sensor_input = Some(sensor_input_trampoline);
                true
            }
            code::GET_LOG_INTERFACE => {
                let Some(iface) = data.cast::<ffi::RetroLogCallback>().as_mut() else {
                    return false;
                };
                if !cb.environment(EnvRequest::GetInterface(HostInterface::Log)) {
                    return false;
                }
                iface.log = Some(log_trampoline);
                true
            }
            code::GET_PERF_INTERFACE => {
                let Some(iface) = data.cast::<ffi::RetroPerfCallback>().as_mut() else {
                    return false;
                };
                if !cb.environment(EnvRequest::GetInterface(HostInterface::Perf)) {
                    return false;
                }
                iface.get_time_usec = Some(perf_get_time_usec);
                iface.get_cpu_features = Some(perf_get_cpu_features);
                iface.get_perf_counter = Some(perf_get_counter);
                iface.perf_register = Some(perf_register);
                iface.perf_start = Some(perf_start);
                iface.perf_stop = Some(perf_stop);
                iface.perf_log = Some(perf_log);
                true
            }
            code::GET_CLEAR_ALL_THREAD_WAITS_CB => {
                if data.is_null()
                    || !cb.environment(EnvRequest::GetInterface(HostInterface::ClearThreadWaits))
                {
                    return false;
                }
                *data.cast::<Option<ffi::ClearThreadWaitsFn>>() =
                    Some(clear_thread_waits_trampoline);
                true
            }
            code::GET_LED_INTERFACE => false,
            code::GET_INPUT_DEVICE_CAPABILITIES => {
                query(cb, data, |v| EnvRequest::GetInputDeviceCapabilities(v))
            }
            code::SET_SYSTEM_AV_INFO => read::<ffi::RetroSystemAvInfo>(data)
                .is_some_and(|raw| cb.environment(EnvRequest::SetSystemAvInfo(av_info_from(&raw)))),
            code::SET_SUBSYSTEM_INFO => {
                let info = subsystems(data.cast());
                cb.environment(EnvRequest::SetSubsystemInfo(info))
            }
            code::SET_CONTROLLER_INFO => {
                let info = controllers(data.cast());
                cb.environment(EnvRequest::SetControllerInfo(info))
            }
            code::SET_GEOMETRY => read::<ffi::RetroGameGeometry>(data)
                .is_some_and(|raw| cb.environment(EnvRequest::SetGeometry(geometry_from(&raw)))),
            code::GET_USERNAME => {
                if data.is_null() {
                    return false;
                }
                let mut name = None;
                if !cb.environment(EnvRequest::GetUsername(&mut name)) {
                    return false;
                }
                *data.cast::<*const c_char>() = match name {
                    Some(name) => hooks.intern("username", &name),
                    None => ptr::null(),
                };
                true
            }
            code::GET_LANGUAGE => {
                if data.is_null() {
                    return false;
                }
                let mut language = Language::default();
                if !cb.environment(EnvRequest::GetLanguage(&mut language)) {
                    return false;
                }
                *data.cast::<c_uint>() = language.as_raw();
                true
            }
            code::SET_HW_SHARED_CONTEXT => cb.environment(EnvRequest::SetHwSharedContext),
            code::GET_AUDIO_VIDEO_ENABLE => {
                if data.is_null() {
                    return false;
                }
                let mut enable = AvEnable::empty();
                if !cb.environment(EnvRequest::GetAudioVideoEnable(&mut enable)) {
                    return false;
                }
                *data.cast::<c_int>() = enable.bits() as c_int;
                true
            }
            code::GET_FASTFORWARDING => query(cb, data, |v| EnvRequest::GetFastForwarding(v)),
            code::GET_TARGET_REFRESH_RATE => query(cb, data, |v| EnvRequest::GetTargetRefreshRate(v)),
            code::GET_INPUT_BITMASKS => cb.environment(EnvRequest::GetInputBitmasks),
            code::GET_CORE_OPTIONS_VERSION => query(cb, data, |v| EnvRequest::GetCoreOptionsVersion(v)),
            code::SET_CORE_OPTIONS => cb.environment(EnvRequest::SetCoreOptions {
                version: 1,
                definitions: options_v1(data.cast()),
                categories: Vec::new(),
            }),
            code::SET_CORE_OPTIONS_INTL => {
                let Some(intl) = data.cast::<ffi::RetroCoreOptionsIntl>().as_ref() else {
                    return false;
                };
                cb.environment(EnvRequest::SetCoreOptions {
                    version: 1,
                    definitions: options_v1(intl.us),
                    categories: Vec::new(),
                })
            }
            code::SET_CORE_OPTIONS_V2 => {
                let (definitions, categories) = options_v2(data.cast());
                cb.environment(EnvRequest::SetCoreOptions {
                    version: 2,
                    definitions,
                    categories,
                })
            }
            code::SET_CORE_OPTIONS_V2_INTL => {
                let Some(intl) = data.cast::<ffi::RetroCoreOptionsV2Intl>().as_ref() else {
                    return false;
                };
                let (definitions, categories) = options_v2(intl.us);
                cb.environment(EnvRequest::SetCoreOptions {
                    version: 2,
                    definitions,
                    categories,
                })
            }
            code::SET_CORE_OPTIONS_DISPLAY => {
                let Some(display) = data.cast::<ffi::RetroCoreOptionDisplay>().as_ref() else {
                    return false;
                };
                let Some(key) = cstr(display.key) else {
                    return false;
                };
                cb.environment(EnvRequest::SetCoreOptionsDisplay {
                    key,
                    visible: display.visible,
                })
            }
            code::SET_CORE_OPTIONS_UPDATE_DISPLAY_CALLBACK => {
                let callback = data
                    .cast::<ffi::RetroCoreOptionsUpdateDisplayCallback>()
                    .as_ref()
                    .and_then(|c| c.callback);
                let accepted = cb.environment(EnvRequest::SetCoreOptionsUpdateDisplayCallback(
                    callback.is_some(),
                ));
                hooks.update_display = if accepted { callback } else { None };
                accepted
            }
            code::GET_SAVESTATE_CONTEXT => {
                if data.is_null() {
                    return false;
                }
                let mut context = SavestateContext::default();
                if !cb.environment(EnvRequest::GetSavestateContext(&mut context)) {
                    return false;
                }
                *data.cast::<c_int>() = context as c_int;
                true
            }
            code::EXEC | code::EXEC_ESCAPE => cb.environment(EnvRequest::Exec(ExecRequest {
                path: cstr(data.cast::<c_char>()).map(PathBuf::from),
                escape: cmd == code::EXEC_ESCAPE,
            })),
            other => cb.environment(EnvRequest::Unknown(other)),
        }
    }
}

// ============================================================================
// Content marshalling
// ============================================================================

/// A [`GameInfo`] laid out for the core, owning the C strings it points to.
struct RawGameInfo<'a> {
    raw: RetroGameInfo,
    _path: Option<CString>,
    _meta: Option<CString>,
    _data: PhantomData<&'a [u8]>,
}

impl<'a> RawGameInfo<'a> {
    fn new(game: &'a GameInfo) -> Self {
        let path = game
            .path
            .as_ref()
            .and_then(|p| CString::new(p.to_string_lossy().into_owned()).ok());
        let meta = game.meta.as_deref().and_then(|m| CString::new(m).ok());
        let (data, size) = game
            .data
            .as_deref()
            .map_or((ptr::null(), 0), |d| (d.as_ptr().cast::<c_void>(), d.len()));
        let raw = RetroGameInfo {
            path: path.as_ref().map_or(ptr::null(), |p| p.as_ptr()),
            data,
            size,
            meta: meta.as_ref().map_or(ptr::null(), |m| m.as_ptr()),
        };
        Self {
            raw,
            _path: path,
            _meta: meta,
            _data: PhantomData,
        }
    }
}

/// Disk interface registered by a dynamic core.
struct DynamicDisk(ffi::RetroDiskControlCallback);

// SAFETY (all methods): the pointers were registered by the core and stay
// valid while its library is loaded.
impl DiskControl for DynamicDisk {
    fn set_eject_state(&mut self, ejected: bool) -> bool {
        self.0.set_eject_state.is_some_and(|f| unsafe { f(ejected) })
    }

    fn get_eject_state(&mut self) -> bool {
        self.0.get_eject_state.is_some_and(|f| unsafe { f() })
    }

    fn get_image_index(&mut self) -> u32 {
        self.0.get_image_index.map_or(0, |f| unsafe { f() })
    }

    fn set_image_index(&mut self, index: u32) -> bool {
        self.0.set_image_index.is_some_and(|f| unsafe { f(index) })
    }

    fn get_num_images(&mut self) -> u32 {
        self.0.get_num_images.map_or(0, |f| unsafe { f() })
    }

    fn replace_image_index(&mut self, index: u32, info: Option<&GameInfo>) -> bool {
        let Some(replace) = self.0.replace_image_index else {
            return false;
        };
        match info {
            Some(game) => {
                let game = RawGameInfo::new(game);
                unsafe { replace(index, &game.raw) }
            }
            None => unsafe { replace(index, ptr::null()) },
        }
    }

    fn add_image_index(&mut self) -> bool {
        self.0.add_image_index.is_some_and(|f| unsafe { f() })
    }
}

// ============================================================================
// Host-side preflight
// ============================================================================

/// True if the running binary itself exports the core ABI.
#[cfg(unix)]
fn host_exports_core_abi() -> bool {
    let this = libloading::os::unix::Library::this();
    // SAFETY: only the presence of the symbol is checked.
    unsafe { this.get::<*const c_void>(b"retro_init\0") }.is_ok()
}

#[cfg(windows)]
fn host_exports_core_abi() -> bool {
    libloading::os::windows::Library::this().is_ok_and(|this| {
        // SAFETY: only the presence of the symbol is checked.
        unsafe { this.get::<*const c_void>(b"retro_init\0") }.is_ok()
    })
}

#[cfg(not(any(unix, windows)))]
fn host_exports_core_abi() -> bool {
    false
}

// ============================================================================
// DynamicCore
// ============================================================================

pub struct DynamicCore {
    path: PathBuf,
    api: Api,
    hooks: Box<CoreHooks>,
    // Declared last so it is dropped after everything pointing into it.
    _library: Library,
}

impl DynamicCore {
    /// Open a core library, resolve its entry points and install the
    /// trampolines that do not go through the environment.
    pub fn load(path: &Path) -> Result<Self, CoreLoadError> {
        if host_exports_core_abi() {
            return Err(CoreLoadError::HostExportsSymbols);
        }

        // SAFETY: loading runs the library's initializers; that is the plugin
        // contract the user opted into by naming the core.
        let library = unsafe { Library::new(path) }.map_err(|source| CoreLoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let api = Api::resolve(&library, path)?;

        // SAFETY: entry points resolved above; none of these re-enter the host.
        let version = unsafe { (api.api_version)() };
        if version != API_VERSION {
            return Err(CoreLoadError::ApiMismatch {
                core: version,
                host: API_VERSION,
            });
        }
        unsafe {
            (api.set_video_refresh)(video_refresh_trampoline);
            (api.set_audio_sample)(audio_sample_trampoline);
            (api.set_audio_sample_batch)(audio_sample_batch_trampoline);
            (api.set_input_poll)(input_poll_trampoline);
            (api.set_input_state)(input_state_trampoline);
        }

        tracing::info!(path = %path.display(), api_version = version, "Loaded core library");
        Ok(Self {
            path: path.to_path_buf(),
            api,
            hooks: Box::default(),
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with `cb` published to the trampolines.
    fn scoped<R>(&mut self, cb: &mut dyn CoreCallbacks, f: impl FnOnce(&Api) -> R) -> R {
        let hooks: *mut CoreHooks = &mut *self.hooks;
        let _guard = ScopeGuard::enter(cb, hooks);
        f(&self.api)
    }
}

// SAFETY (all `unsafe` blocks below): the entry points were resolved from the
// library owned by `self`, and pointer arguments reference live host buffers.
impl Core for DynamicCore {
    fn api_version(&self) -> u32 {
        unsafe { (self.api.api_version)() }
    }

    fn system_info(&self) -> SystemInfo {
        let mut raw = ffi::RetroSystemInfo {
            library_name: ptr::null(),
            library_version: ptr::null(),
            valid_extensions: ptr::null(),
            need_fullpath: false,
            block_extract: false,
        };
        unsafe {
            (self.api.get_system_info)(&mut raw);
            SystemInfo {
                library_name: cstr(raw.library_name).unwrap_or_default(),
                library_version: cstr(raw.library_version).unwrap_or_default(),
                valid_extensions: cstr(raw.valid_extensions).unwrap_or_default(),
                need_fullpath: raw.need_fullpath,
                block_extract: raw.block_extract,
            }
        }
    }

    fn system_av_info(&mut self) -> SystemAvInfo {
        let mut raw = ffi::RetroSystemAvInfo::default();
        unsafe { (self.api.get_system_av_info)(&mut raw) };
        av_info_from(&raw)
    }

    fn set_environment(&mut self, cb: &mut dyn CoreCallbacks) {
        self.scoped(cb, |api| unsafe { (api.set_environment)(environment_trampoline) });
    }

    fn init(&mut self, cb: &mut dyn CoreCallbacks) {
        self.scoped(cb, |api| unsafe { (api.init)() });
    }

    fn deinit(&mut self, cb: &mut dyn CoreCallbacks) {
        self.scoped(cb, |api| unsafe { (api.deinit)() });
        *self.hooks = CoreHooks::default();
    }

    fn set_controller_port_device(&mut self, cb: &mut dyn CoreCallbacks, port: u32, device: u32) {
        self.scoped(cb, |api| unsafe { (api.set_controller_port_device)(port, device) });
    }

    fn reset(&mut self, cb: &mut dyn CoreCallbacks) {
        self.scoped(cb, |api| unsafe { (api.reset)() });
    }

    fn run(&mut self, cb: &mut dyn CoreCallbacks) {
        self.scoped(cb, |api| unsafe { (api.run)() });
    }

    fn serialize_size(&mut self, cb: &mut dyn CoreCallbacks) -> usize {
        self.scoped(cb, |api| unsafe { (api.serialize_size)() })
    }

    fn serialize(&mut self, cb: &mut dyn CoreCallbacks, buf: &mut [u8]) -> bool {
        self.scoped(cb, |api| unsafe {
            (api.serialize)(buf.as_mut_ptr().cast(), buf.len())
        })
    }

    fn unserialize(&mut self, cb: &mut dyn CoreCallbacks, buf: &[u8]) -> bool {
        self.scoped(cb, |api| unsafe { (api.unserialize)(buf.as_ptr().cast(), buf.len()) })
    }

    fn cheat_reset(&mut self, cb: &mut dyn CoreCallbacks) {
        self.scoped(cb, |api| unsafe { (api.cheat_reset)() });
    }

    fn cheat_set(&mut self, cb: &mut dyn CoreCallbacks, index: u32, enabled: bool, code: &str) {
        let Ok(code) = CString::new(code) else {
            tracing::warn!(index, "Cheat code contains a NUL byte; not applied");
            return;
        };
        self.scoped(cb, |api| unsafe { (api.cheat_set)(index, enabled, code.as_ptr()) });
    }

    fn load_game(&mut self, cb: &mut dyn CoreCallbacks, game: Option<&GameInfo>) -> bool {
        let raw = game.map(RawGameInfo::new);
        let info = raw.as_ref().map_or(ptr::null(), |r| &r.raw as *const RetroGameInfo);
        self.scoped(cb, |api| unsafe { (api.load_game)(info) })
    }

    fn load_game_special(
        &mut self,
        cb: &mut dyn CoreCallbacks,
        game_type: u32,
        games: &[GameInfo],
    ) -> bool {
        let owned: Vec<RawGameInfo<'_>> = games.iter().map(RawGameInfo::new).collect();
        let raw: Vec<RetroGameInfo> = owned.iter().map(|g| g.raw).collect();
        self.scoped(cb, |api| unsafe {
            (api.load_game_special)(game_type, raw.as_ptr(), raw.len())
        })
    }

    fn unload_game(&mut self, cb: &mut dyn CoreCallbacks) {
        self.scoped(cb, |api| unsafe { (api.unload_game)() });
    }

    fn region(&mut self) -> Region {
        Region::from_raw(unsafe { (self.api.get_region)() })
    }

    fn memory_data(&mut self, id: u32) -> Option<&mut [u8]> {
        let size = unsafe { (self.api.get_memory_size)(id) };
        let data = unsafe { (self.api.get_memory_data)(id) };
        if data.is_null() || size == 0 {
            return None;
        }
        // SAFETY: the core owns `size` bytes at `data` until the game unloads,
        // and the returned borrow is tied to `self`.
        Some(unsafe { std::slice::from_raw_parts_mut(data.cast::<u8>(), size) })
    }

    fn memory_size(&mut self, id: u32) -> usize {
        unsafe { (self.api.get_memory_size)(id) }
    }

    fn frame_time(&mut self, cb: &mut dyn CoreCallbacks, usec: i64) {
        let Some(callback) = self.hooks.frame_time else {
            return;
        };
        self.scoped(cb, |_| unsafe { callback(usec) });
    }

    fn keyboard_event(
        &mut self,
        cb: &mut dyn CoreCallbacks,
        down: bool,
        key: Key,
        character: u32,
        modifiers: KeyModifiers,
    ) {
        let Some(callback) = self.hooks.keyboard else {
            return;
        };
        self.scoped(cb, |_| unsafe {
            callback(down, c_uint::from(key.code()), character, modifiers.bits())
        });
    }

    fn disk_control(&mut self) -> Option<&mut dyn DiskControl> {
        self.hooks.disk.as_mut().map(|d| d as &mut dyn DiskControl)
    }

    fn update_core_options_display(&mut self, cb: &mut dyn CoreCallbacks) -> bool {
        let Some(callback) = self.hooks.update_display else {
            return false;
        };
        self.scoped(cb, |_| unsafe { callback() })
    }

    fn audio_callback(&mut self, cb: &mut dyn CoreCallbacks) {
        let Some(callback) = self.hooks.audio else {
            return;
        };
        self.scoped(cb, |_| unsafe { callback() });
    }
}

impl Drop for DynamicCore {
    fn drop(&mut self) {
        if let Some(set_state) = self.hooks.audio_set_state {
            // SAFETY: registered by the core, library still loaded.
            unsafe { set_state(false) };
        }
        tracing::debug!(path = %self.path.display(), "Unloading core library");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every decoded request and answers a few of them.
    #[derive(Default)]
    struct Recorder {
        names: Vec<&'static str>,
        variables: Vec<(String, String)>,
        refuse_pixel_format: bool,
        frames: Vec<(u32, u32, usize)>,
    }

    impl CoreCallbacks for Recorder {
        fn environment(&mut self, request: EnvRequest<'_>) -> bool {
            self.names.push(request.name());
            match request {
                EnvRequest::SetVariables(vars) => {
                    self.variables = vars;
                    true
                }
                EnvRequest::GetVariable { key, value } => {
                    if key == "core_speed" {
                        *value = Some("fast".to_string());
                        true
                    } else {
                        false
                    }
                }
                EnvRequest::SetPixelFormat(_) => !self.refuse_pixel_format,
                EnvRequest::GetOverscan(out) => {
                    *out = true;
                    true
                }
                EnvRequest::GetSavestateContext(out) => {
                    *out = SavestateContext::RollbackNetplay;
                    true
                }
                _ => false,
            }
        }

        fn video_refresh(&mut self, frame: Option<VideoFrame<'_>>) {
            if let Some(frame) = frame {
                self.frames.push((frame.width, frame.height, frame.data.len()));
            }
        }

        fn audio_sample(&mut self, _left: i16, _right: i16) {}

        fn audio_sample_batch(&mut self, samples: &[i16]) -> usize {
            samples.len() / 2
        }

        fn input_poll(&mut self) {}

        fn input_state(&mut self, _port: u32, _device: u32, _index: u32, id: u32) -> i16 {
            id as i16
        }
    }

    fn env(recorder: &mut Recorder, hooks: &mut CoreHooks, cmd: u32, data: *mut c_void) -> bool {
        let _guard = ScopeGuard::enter(recorder, hooks);
        environment_trampoline(cmd, data)
    }

    #[test]
    fn test_load_missing_library_fails() {
        let err = DynamicCore::load(Path::new("/nonexistent/retrohost_core.so"))
            .err()
            .unwrap();
        assert!(matches!(err, CoreLoadError::Open { .. }));
    }

    #[test]
    fn test_trampolines_without_scope_refuse() {
        assert!(!environment_trampoline(code::SHUTDOWN, ptr::null_mut()));
        assert_eq!(input_state_trampoline(0, 1, 0, 8), 0);
    }

    #[test]
    fn test_set_variables_decoded() {
        let k1 = CString::new("core_speed").unwrap();
        let v1 = CString::new("Speed; slow|fast").unwrap();
        let mut vars = [
            ffi::RetroVariable {
                key: k1.as_ptr(),
                value: v1.as_ptr(),
            },
            ffi::RetroVariable {
                key: ptr::null(),
                value: ptr::null(),
            },
        ];
        let mut recorder = Recorder::default();
        let mut hooks = CoreHooks::default();
        assert!(env(
            &mut recorder,
            &mut hooks,
            code::SET_VARIABLES,
            vars.as_mut_ptr().cast()
        ));
        assert_eq!(
            recorder.variables,
            vec![("core_speed".to_string(), "Speed; slow|fast".to_string())]
        );
    }

    #[test]
    fn test_get_variable_writes_interned_value() {
        let key = CString::new("core_speed").unwrap();
        let mut var = ffi::RetroVariable {
            key: key.as_ptr(),
            value: ptr::null(),
        };
        let mut recorder = Recorder::default();
        let mut hooks = CoreHooks::default();
        assert!(env(
            &mut recorder,
            &mut hooks,
            code::GET_VARIABLE,
            (&mut var as *mut ffi::RetroVariable).cast()
        ));
        let value = unsafe { CStr::from_ptr(var.value) };
        assert_eq!(value.to_str().unwrap(), "fast");

        let other = CString::new("missing").unwrap();
        var.key = other.as_ptr();
        assert!(!env(
            &mut recorder,
            &mut hooks,
            code::GET_VARIABLE,
            (&mut var as *mut ffi::RetroVariable).cast()
        ));
        assert!(var.value.is_null());
    }

    #[test]
    fn test_pixel_format_sets_frame_stride() {
        let mut recorder = Recorder::default();
        let mut hooks = CoreHooks::default();
        let mut format: c_int = 1; // XRGB8888
        assert!(env(
            &mut recorder,
            &mut hooks,
            code::SET_PIXEL_FORMAT,
            (&mut format as *mut c_int).cast()
        ));
        assert_eq!(hooks.bytes_per_pixel, 4);

        recorder.refuse_pixel_format = true;
        let mut format: c_int = 2;
        assert!(!env(
            &mut recorder,
            &mut hooks,
            code::SET_PIXEL_FORMAT,
            (&mut format as *mut c_int).cast()
        ));
        assert_eq!(hooks.bytes_per_pixel, 4);
    }

    #[test]
    fn test_video_frame_length_excludes_trailing_pitch() {
        let mut recorder = Recorder::default();
        let mut hooks = CoreHooks::default();
        let buffer = vec![0u8; 16 * 4];
        {
            let _guard = ScopeGuard::enter(&mut recorder, &mut hooks);
            video_refresh_trampoline(buffer.as_ptr().cast(), 4, 4, 16);
            video_refresh_trampoline(ptr::null(), 4, 4, 16);
        }
        // 3 full rows plus 4 pixels of 2 bytes.
        assert_eq!(recorder.frames, vec![(4, 4, 16 * 3 + 8)]);
    }

    #[test]
    fn test_out_parameters_written() {
        let mut recorder = Recorder::default();
        let mut hooks = CoreHooks::default();
        let mut overscan = false;
        assert!(env(
            &mut recorder,
            &mut hooks,
            code::GET_OVERSCAN,
            (&mut overscan as *mut bool).cast()
        ));
        assert!(overscan);

        let mut context: c_int = -1;
        assert!(env(
            &mut recorder,
            &mut hooks,
            code::GET_SAVESTATE_CONTEXT,
            (&mut context as *mut c_int).cast()
        ));
        assert_eq!(context, SavestateContext::RollbackNetplay as c_int);
    }

    #[test]
    fn test_unknown_code_forwarded() {
        let mut recorder = Recorder::default();
        let mut hooks = CoreHooks::default();
        assert!(!env(&mut recorder, &mut hooks, 9999, ptr::null_mut()));
        assert_eq!(recorder.names, vec!["UNKNOWN"]);
    }

    #[test]
    fn test_scope_guard_restores_previous() {
        let mut outer = Recorder::default();
        let mut inner = Recorder::default();
        let mut hooks = CoreHooks::default();
        let hooks_ptr: *mut CoreHooks = &mut hooks;
        let _outer = ScopeGuard::enter(&mut outer, hooks_ptr);
        {
            let _inner = ScopeGuard::enter(&mut inner, hooks_ptr);
            assert_eq!(input_state_trampoline(0, 1, 0, 5), 5);
        }
        assert!(ACTIVE.with(Cell::get).is_some());
    }
}
