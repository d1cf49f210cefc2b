//! Core and driver lifecycle commands.

use std::path::PathBuf;

use retrohost_shared::PixelFormat;

use super::Command;
use crate::core_options;
use crate::drivers::VideoConfig;
use crate::host::{ContentState, Host, HostError, SystemState, content};
use crate::plugin::{Core, DummyCore, DynamicCore};
use crate::replay::ReplayEngine;
use crate::savestate::{self, AUTO_SLOT};

/// Load the core and content and bring every subsystem up.
pub(crate) fn init_core(host: &mut Host) -> Result<(), HostError> {
    let (core, path) = select_core(host);
    host.core = core;
    host.ctx.system = SystemState {
        info: host.core.system_info(),
        pixel_format: PixelFormat::Rgb1555,
        libretro_path: path,
        ..SystemState::default()
    };
    host.ctx.content = ContentState::default();
    tracing::info!(
        library = %host.ctx.system.info.library_name,
        version = %host.ctx.system.info.library_version,
        "Initializing core"
    );

    host.with_core(|core, cb| core.set_environment(cb));
    host.with_core(|core, cb| core.init(cb));

    if let Err(e) = content::load(host) {
        host.with_core(|core, cb| core.deinit(cb));
        host.core = Box::new(DummyCore::new());
        return Err(e);
    }

    host.ctx.system.av = host.core.system_av_info();
    if !host.command(Command::DriversInit) {
        return Err(HostError::Drivers);
    }
    host.command(Command::ControllersInit);
    host.command(Command::CheatsInit);
    if host.ctx.settings.runloop.rewind_enable {
        host.command(Command::RewindInit);
    }
    host.command(Command::SavefilesInit);
    if host.ctx.launch.netplay.is_some() {
        host.command(Command::NetplayInit);
    }
    host.command(Command::PreemptUpdate);
    Ok(())
}

/// The staged core, the dummy core, or the shared library configured for
/// this launch. A library that fails to load falls back to the dummy core.
fn select_core(host: &mut Host) -> (Box<dyn Core>, Option<PathBuf>) {
    if let Some(core) = host.staged_core.take() {
        return (core, None);
    }
    if host.force_dummy {
        return (Box::new(DummyCore::new()), None);
    }
    let Some(path) = host
        .ctx
        .launch
        .core_path
        .clone()
        .or_else(|| host.ctx.settings.core.libretro_path.clone())
    else {
        tracing::info!("No core configured; starting the dummy core");
        return (Box::new(DummyCore::new()), None);
    };
    match DynamicCore::load(&path) {
        Ok(core) => (Box::new(core), Some(path)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load core");
            host.ctx
                .messages
                .push(format!("Failed to load core: {e}"), 1, 180, true);
            (Box::new(DummyCore::new()), None)
        }
    }
}

/// Unload content and the core, persisting what should survive.
pub(crate) fn deinit_core(host: &mut Host) -> bool {
    if host.engine.is_netplay() {
        host.command(Command::NetplayDeinit);
    }
    host.engine = ReplayEngine::None;
    host.command(Command::RewindDeinit);

    if host.ctx.content.loaded {
        host.command(Command::SavefilesDeinit);
        if host.ctx.settings.runloop.savestate_auto_save && !host.ctx.content.no_content {
            save_auto_state(host);
        }
    }
    host.command(Command::CheatsDeinit);
    save_core_options(host);

    if host.ctx.content.loaded {
        host.with_core(|core, cb| core.unload_game(cb));
    }
    host.with_core(|core, cb| core.deinit(cb));
    host.command(Command::DriversDeinit);

    host.ctx.system = SystemState::default();
    host.ctx.content = ContentState::default();
    host.ctx.options = None;
    host.ctx.input.reset_remap(&host.ctx.settings.input);
    tracing::info!("Core deinitialized");
    true
}

fn save_auto_state(host: &mut Host) {
    let Some(dir) = host.ctx.content.state_dir.clone() else {
        return;
    };
    let path = savestate::state_path(&dir, &host.ctx.content.state_basename(), AUTO_SLOT);
    let compress = host.ctx.settings.runloop.savestate_compression;
    let result = host
        .with_core(|core, cb| savestate::capture(core, cb))
        .and_then(|data| savestate::write(&path, &data, compress));
    match result {
        Ok(()) => tracing::info!(path = %path.display(), "Auto-saved state"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to auto-save state"),
    }
}

fn save_core_options(host: &Host) {
    let (Some(options), Some(dir)) = (&host.ctx.options, host.ctx.settings.core_options_dir())
    else {
        return;
    };
    if options.is_empty() {
        return;
    }
    let path = core_options::options_path(&dir, &host.ctx.system.info.library_name);
    match options.save(&path) {
        Ok(()) => tracing::info!(path = %path.display(), "Saved core options"),
        Err(e) => tracing::warn!(error = %e, "Failed to save core options"),
    }
}

/// Tear the current core down and continue on the dummy core with the menu
/// open.
pub(crate) fn load_dummy(host: &mut Host) {
    host.ctx.runloop.shutdown = false;
    host.ctx.runloop.core_shutdown = false;
    host.command(Command::CoreDeinit);

    host.force_dummy = true;
    let result = init_core(host);
    host.force_dummy = false;
    if let Err(e) = result {
        tracing::error!(error = %e, "Failed to start the dummy core");
        host.ctx.runloop.shutdown = true;
        return;
    }
    if !host.ctx.runloop.menu_alive {
        host.command(Command::MenuToggle);
    }
}

pub(crate) fn reset(host: &mut Host) -> bool {
    host.ctx.notify("Reset.", 1, 120);
    host.with_core(|core, cb| core.reset(cb));
    host.command(Command::PreemptResetBuffer);
    true
}

pub(crate) fn quit(host: &mut Host) -> bool {
    host.ctx.runloop.shutdown = true;
    true
}

/// Drivers again with the A/V info the core last reported.
pub(crate) fn reinit(host: &mut Host) -> bool {
    host.command(Command::DriversDeinit);
    if !host.command(Command::DriversInit) {
        return false;
    }
    // Samples taken before the restart are stale.
    let remap = host.ctx.settings.input.remap_binds_enable;
    host.ctx.input.poll(&mut *host.ctx.drivers.input, remap);
    true
}

pub(crate) fn drivers_init(host: &mut Host) -> bool {
    let system = &host.ctx.system;
    let config = VideoConfig {
        geometry: system.av.geometry,
        pixel_format: system.pixel_format,
        rotation: system.rotation,
        fullscreen: host.ctx.settings.video.fullscreen,
        hw_context: system.hw_render.as_ref().map(|hw| hw.context_type),
    };
    let sample_rate = system.av.timing.sample_rate;
    if !host.ctx.drivers.init(&config, sample_rate) {
        host.ctx.warn("Failed to initialize video driver.", 1, 180);
        return false;
    }
    host.ctx.drivers.audio.set_nonblocking(host.ctx.runloop.nonblock);
    host.ctx.limiter.reset();
    host.ctx.frame_timer.reset();
    if host.ctx.runloop.paused {
        host.ctx.drivers.stop_audio();
    }
    true
}

pub(crate) fn drivers_deinit(host: &mut Host) -> bool {
    host.ctx.drivers.deinit();
    true
}

/// Tell the core which device sits on each port.
pub(crate) fn controllers_init(host: &mut Host) -> bool {
    for port in 0..host.ctx.input.max_users() {
        let device = host.ctx.input.port_device(port);
        tracing::debug!(port, device, "Setting port device");
        host.with_core(|core, cb| core.set_controller_port_device(cb, port as u32, device));
    }
    true
}
