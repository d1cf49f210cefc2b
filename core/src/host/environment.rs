//! Environment callback
//!
//! Answers every [`EnvRequest`] a core can issue. Requests that would
//! reconfigure drivers mid-call (`SET_SYSTEM_AV_INFO`) only record what
//! changed and queue a command; the command runs once the core returns.

use retrohost_shared::environment::CORE_OPTIONS_VERSION;
use retrohost_shared::{LogLevel, PixelFormat, Rotation};

use super::HostContext;
use crate::command::Command;
use crate::core_options::{self, CoreOptionManager};
use crate::plugin::EnvRequest;

/// Message target of `SET_MESSAGE_EXT` that only goes to the log.
const TARGET_LOG_ONLY: u32 = 2;

/// Handle one request. Returns false for unknown or refused requests.
pub fn handle(ctx: &mut HostContext, request: EnvRequest<'_>) -> bool {
    tracing::trace!(request = request.name(), "Environment call");
    match request {
        EnvRequest::SetRotation(raw) => {
            if !ctx.settings.video.allow_rotate {
                return false;
            }
            let Ok(rotation) = Rotation::from_raw(raw) else {
                return false;
            };
            tracing::info!(degrees = rotation.degrees(), "Environment: SET_ROTATION");
            ctx.system.rotation = rotation;
            ctx.drivers.video.set_rotation(rotation)
        }
        EnvRequest::GetOverscan(out) => {
            *out = !ctx.settings.video.crop_overscan;
            true
        }
        EnvRequest::GetCanDupe(out) => {
            *out = true;
            true
        }
        EnvRequest::SetMessage { msg, frames } => {
            tracing::info!(%msg, "Environment: SET_MESSAGE");
            ctx.messages.push(msg, 1, frames, true);
            true
        }
        EnvRequest::SetMessageExt {
            msg,
            duration_ms,
            priority,
            level,
            target,
        } => {
            match level {
                LogLevel::Debug => tracing::debug!(%msg, "Core message"),
                LogLevel::Info => tracing::info!(%msg, "Core message"),
                LogLevel::Warn => tracing::warn!(%msg, "Core message"),
                LogLevel::Error => tracing::error!(%msg, "Core message"),
            }
            if target != TARGET_LOG_ONLY {
                let frames = (ctx.throttled_fps() * f64::from(duration_ms) * 0.001).round() as u32;
                ctx.messages.push(msg, priority, frames.max(1), true);
            }
            true
        }
        EnvRequest::Shutdown => {
            tracing::info!("Environment: SHUTDOWN");
            ctx.runloop.shutdown = true;
            ctx.runloop.core_shutdown = true;
            true
        }
        EnvRequest::SetPerformanceLevel(level) => {
            tracing::debug!(level, "Environment: SET_PERFORMANCE_LEVEL");
            ctx.system.performance_level = level;
            true
        }
        EnvRequest::GetSystemDirectory(out) => {
            *out = ctx.settings.paths.system_directory.clone().or_else(|| {
                ctx.content
                    .path
                    .as_deref()
                    .and_then(|p| p.parent())
                    .map(|p| p.to_path_buf())
            });
            true
        }
        EnvRequest::GetSaveDirectory(out) => {
            *out = ctx.content.save_dir.clone();
            true
        }
        EnvRequest::GetCoreAssetsDirectory(out) => {
            *out = ctx.settings.paths.core_assets_directory.clone();
            out.is_some()
        }
        EnvRequest::GetLibretroPath(out) => {
            *out = ctx.system.libretro_path.clone();
            true
        }
        EnvRequest::SetPixelFormat(raw) => match PixelFormat::from_raw(raw) {
            Ok(format) => {
                tracing::info!(format = format.name(), "Environment: SET_PIXEL_FORMAT");
                ctx.system.pixel_format = format;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Refusing pixel format");
                false
            }
        },
        EnvRequest::SetInputDescriptors(descriptors) => {
            for d in &descriptors {
                tracing::debug!(
                    port = d.port,
                    device = d.device,
                    index = d.index,
                    id = d.id,
                    description = %d.description,
                    "Input descriptor"
                );
            }
            ctx.system.input_descriptors = descriptors;
            true
        }
        EnvRequest::SetKeyboardCallback(registered) => {
            ctx.system.keyboard_callback = registered;
            let translate = registered && ctx.input.has_keyboard_port();
            ctx.input.set_joykbd_enabled(translate);
            true
        }
        EnvRequest::SetDiskControlInterface(registered) => {
            tracing::debug!(registered, "Environment: SET_DISK_CONTROL_INTERFACE");
            ctx.system.disk_control = registered;
            true
        }
        EnvRequest::SetHwRender(request) => {
            if !ctx.drivers.video.supports_hw_context(request.context_type) {
                tracing::warn!(
                    context = ?request.context_type,
                    driver = ctx.drivers.video.name(),
                    "Requested HW context is not available"
                );
                return false;
            }
            tracing::info!(
                context = ?request.context_type,
                major = request.version_major,
                minor = request.version_minor,
                "Environment: SET_HW_RENDER"
            );
            ctx.system.hw_render = Some(request.clone());
            true
        }
        EnvRequest::GetVariable { key, value } => {
            *value = ctx
                .options
                .as_ref()
                .and_then(|options| options.get(key))
                .map(str::to_string);
            value.is_some()
        }
        EnvRequest::SetVariables(variables) => {
            install_options(ctx, CoreOptionManager::from_variables(variables));
            true
        }
        EnvRequest::GetVariableUpdate(out) => {
            *out = ctx
                .options
                .as_mut()
                .is_some_and(CoreOptionManager::take_updated);
            true
        }
        EnvRequest::SetSupportNoGame(supported) => {
            ctx.system.support_no_game = supported;
            true
        }
        EnvRequest::SetFrameTimeCallback { reference_usec } => {
            if ctx.launch.netplay.is_some() {
                return false;
            }
            ctx.system.frame_time_reference = Some(reference_usec);
            true
        }
        EnvRequest::SetAudioCallback(registered) => {
            if ctx.launch.netplay.is_some() {
                return false;
            }
            ctx.system.audio_callback = registered;
            true
        }
        EnvRequest::GetInterface(interface) => {
            tracing::debug!(?interface, "Environment: interface requested");
            true
        }
        EnvRequest::ClearAllThreadWaits(clear) => {
            if clear {
                ctx.drivers.stop_audio();
            } else if !ctx.runloop.paused && !ctx.audio_muted() {
                ctx.drivers.start_audio();
            }
            true
        }
        EnvRequest::GetInputDeviceCapabilities(out) => {
            *out = ctx.drivers.input.capabilities();
            true
        }
        EnvRequest::SetSystemAvInfo(av) => {
            let old = ctx.system.av;
            tracing::info!(
                width = av.geometry.base_width,
                height = av.geometry.base_height,
                fps = av.timing.fps,
                sample_rate = av.timing.sample_rate,
                "Environment: SET_SYSTEM_AV_INFO"
            );
            if !av.geometry.differs_from(&old.geometry) {
                tracing::debug!("Ignoring SET_SYSTEM_AV_INFO with unchanged geometry");
                return false;
            }
            ctx.system.av = av;
            ctx.defer(Command::Reinit);
            if av.timing.fps != old.timing.fps {
                ctx.defer(Command::PreemptResetBuffer);
            }
            true
        }
        EnvRequest::SetSubsystemInfo(subsystems) => {
            for s in &subsystems {
                tracing::debug!(ident = %s.ident, roms = s.roms.len(), "Subsystem");
            }
            ctx.system.subsystems = subsystems;
            true
        }
        EnvRequest::SetControllerInfo(info) => {
            ctx.system.controller_info = info;
            true
        }
        EnvRequest::SetGeometry(geometry) => {
            if geometry.differs_from(&ctx.system.av.geometry) {
                tracing::info!(
                    width = geometry.base_width,
                    height = geometry.base_height,
                    aspect = geometry.aspect_ratio,
                    "Environment: SET_GEOMETRY"
                );
                ctx.system.av.geometry = geometry;
                ctx.drivers
                    .video
                    .set_aspect_ratio(geometry.effective_aspect());
            }
            true
        }
        EnvRequest::GetUsername(out) => {
            *out = ctx.settings.user.username.clone();
            true
        }
        EnvRequest::GetLanguage(out) => {
            *out = ctx.settings.user.language;
            true
        }
        EnvRequest::SetHwSharedContext => {
            ctx.system.shared_hw_context = true;
            true
        }
        EnvRequest::GetAudioVideoEnable(out) => {
            *out = ctx.replay.av_enable();
            true
        }
        EnvRequest::GetFastForwarding(out) => {
            *out = ctx.runloop.nonblock;
            true
        }
        EnvRequest::GetTargetRefreshRate(out) => {
            *out = ctx.settings.video.refresh_rate as f32;
            true
        }
        EnvRequest::GetInputBitmasks => true,
        EnvRequest::GetCoreOptionsVersion(out) => {
            *out = CORE_OPTIONS_VERSION;
            true
        }
        EnvRequest::SetCoreOptions {
            version,
            definitions,
            categories,
        } => {
            let use_categories = ctx.settings.core.option_categories;
            let categories = if use_categories {
                categories
            } else {
                Vec::new()
            };
            install_options(
                ctx,
                CoreOptionManager::from_definitions(version, definitions, categories),
            );
            version < 2 || use_categories
        }
        EnvRequest::SetCoreOptionsDisplay { key, visible } => match ctx.options.as_mut() {
            Some(options) => {
                options.set_visible(&key, visible);
                true
            }
            None => false,
        },
        EnvRequest::SetCoreOptionsUpdateDisplayCallback(registered) => {
            ctx.system.options_display_callback = registered;
            true
        }
        EnvRequest::GetSavestateContext(out) => {
            *out = ctx.replay.savestate_context();
            true
        }
        EnvRequest::Exec(exec) => {
            tracing::info!(path = ?exec.path, escape = exec.escape, "Environment: EXEC");
            if exec.path.is_some() {
                ctx.launch.content = exec.path;
            }
            ctx.runloop.exec = true;
            if exec.escape {
                ctx.launch.start_in_menu = false;
            }
            true
        }
        EnvRequest::Unknown(cmd) => {
            tracing::debug!(cmd, "Unsupported environment request");
            false
        }
    }
}

/// Replace the core option manager, applying values saved for this core.
fn install_options(ctx: &mut HostContext, mut manager: CoreOptionManager) {
    if let Some(dir) = ctx.settings.core_options_dir() {
        let path = core_options::options_path(&dir, &ctx.system.info.library_name);
        if let Err(e) = manager.load_values(&path) {
            tracing::warn!(error = %e, "Could not load saved core options");
        }
    }
    tracing::info!(
        options = manager.len(),
        version = manager.version(),
        "Core options registered"
    );
    ctx.options = Some(manager);
}
