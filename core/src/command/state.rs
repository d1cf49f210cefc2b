//! Savestate, rewind, save file and screenshot commands.

use std::path::PathBuf;
use std::time::Duration;

use super::Command;
use crate::autosave;
use crate::host::Host;
use crate::savefile;
use crate::savestate::{self, AUTO_SLOT, RewindManager};
use crate::screenshot;

fn slot_label(slot: i32) -> String {
    if slot == AUTO_SLOT {
        "auto".to_string()
    } else {
        slot.to_string()
    }
}

fn slot_path(host: &Host, slot: i32) -> Option<PathBuf> {
    let dir = host.ctx.content.state_dir.as_ref()?;
    Some(savestate::state_path(
        dir,
        &host.ctx.content.state_basename(),
        slot,
    ))
}

pub(crate) fn load_state(host: &mut Host) -> bool {
    if !host.ctx.content.loaded {
        return false;
    }
    let slot = host.ctx.settings.runloop.state_slot;
    let Some(path) = slot_path(host, slot) else {
        host.ctx.warn("Failed to load state: no savestate directory.", 1, 180);
        return false;
    };

    let result = savestate::read(&path)
        .and_then(|data| host.with_core(|core, cb| savestate::restore(core, cb, &data)));
    if let Err(e) = result {
        tracing::warn!(path = %path.display(), error = %e, "Load state failed");
        host.ctx.warn(
            &format!("Failed to load state from \"{}\".", path.display()),
            1,
            180,
        );
        return false;
    }

    host.ctx.notify(
        &format!("Loaded state from slot #{}.", slot_label(slot)),
        2,
        180,
    );
    super::replay::state_loaded(host);
    true
}

pub(crate) fn save_state(host: &mut Host) -> bool {
    if !host.ctx.content.loaded {
        return false;
    }
    if host.ctx.settings.runloop.savestate_auto_index {
        host.ctx.settings.runloop.state_slot += 1;
    }
    let slot = host.ctx.settings.runloop.state_slot;
    let Some(path) = slot_path(host, slot) else {
        host.ctx.warn("Failed to save state: no savestate directory.", 1, 180);
        return false;
    };

    let compress = host.ctx.settings.runloop.savestate_compression;
    let result = host
        .with_core(|core, cb| savestate::capture(core, cb))
        .and_then(|data| savestate::write(&path, &data, compress));
    match result {
        Ok(()) => {
            host.ctx.notify(
                &format!("Saved state to slot #{}.", slot_label(slot)),
                2,
                180,
            );
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Save state failed");
            host.ctx.warn(
                &format!("Failed to save state to \"{}\".", path.display()),
                1,
                180,
            );
            false
        }
    }
}

pub(crate) fn state_slot(host: &mut Host, delta: i32) -> bool {
    let slot = &mut host.ctx.settings.runloop.state_slot;
    *slot = (*slot + delta).max(0);
    let msg = format!("State slot: {slot}");
    host.ctx.notify(&msg, 2, 180);
    true
}

pub(crate) fn rewind_init(host: &mut Host) -> bool {
    if host.engine.is_netplay() {
        tracing::warn!("Rewind is unavailable during netplay");
        return false;
    }
    let state_size = host.with_core(|core, cb| core.serialize_size(cb));
    if state_size == 0 {
        host.ctx.warn(
            "Core does not support save states. Cannot use rewind.",
            1,
            180,
        );
        return false;
    }
    let settings = &host.ctx.settings.runloop;
    host.ctx.rewind = Some(RewindManager::new(
        settings.rewind_buffer_size,
        state_size,
        settings.rewind_granularity,
    ));
    true
}

pub(crate) fn rewind_deinit(host: &mut Host) -> bool {
    host.ctx.rewind = None;
    if host.ctx.runloop.frame_is_reverse {
        host.ctx.runloop.frame_is_reverse = false;
        host.ctx.drivers.set_audio_reverse(false);
    }
    true
}

/// Follow the rewind setting after it changed.
pub(crate) fn rewind_toggle(host: &mut Host) -> bool {
    let ok = if host.ctx.settings.runloop.rewind_enable {
        host.command(Command::RewindInit)
    } else {
        host.command(Command::RewindDeinit)
    };
    // Frames saved by a replay engine no longer match what rewind recorded.
    host.command(Command::PreemptUpdate);
    ok
}

pub(crate) fn autosave_init(host: &mut Host) -> bool {
    host.ctx.autosave.clear();
    let interval = host.ctx.settings.runloop.autosave_interval;
    if interval == 0 {
        return false;
    }
    host.ctx.autosave = autosave::init(
        &mut *host.core,
        &host.ctx.content.save_files,
        Duration::from_secs(u64::from(interval)),
    );
    !host.ctx.autosave.is_empty()
}

/// Drops the workers, which flush and join.
pub(crate) fn autosave_deinit(host: &mut Host) -> bool {
    host.ctx.autosave.clear();
    true
}

pub(crate) fn savefiles_init(host: &mut Host) -> bool {
    if !host.ctx.content.use_sram {
        tracing::info!("SRAM will not be saved");
        return false;
    }
    host.command(Command::AutosaveInit);
    true
}

/// Stop autosave and write every save file once more.
pub(crate) fn savefiles_deinit(host: &mut Host) -> bool {
    host.command(Command::AutosaveDeinit);
    if !host.ctx.content.use_sram || host.core.is_dummy() {
        return false;
    }
    let mut ok = true;
    for file in &host.ctx.content.save_files {
        if let Err(e) = savefile::save(&mut *host.core, file) {
            tracing::warn!(error = %e, "Failed to write save file");
            ok = false;
        }
    }
    ok
}

pub(crate) fn take_screenshot(host: &mut Host) -> bool {
    let dir = host
        .ctx
        .content
        .state_dir
        .clone()
        .or_else(|| host.ctx.content.path.as_deref()?.parent().map(PathBuf::from));
    let frame = host
        .ctx
        .drivers
        .cached_frame()
        .filter(|_| host.ctx.drivers.video.supports_screenshot());
    let (Some(dir), Some(frame)) = (dir, frame) else {
        host.ctx.warn("Failed to take screenshot.", 1, 180);
        return false;
    };

    let path = screenshot::screenshot_path(&dir, &host.ctx.content.basename);
    match screenshot::write_png(&path, frame) {
        Ok(()) => {
            host.ctx.notify("Taking screenshot.", 1, 60);
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "Screenshot failed");
            host.ctx.warn("Failed to take screenshot.", 1, 180);
            false
        }
    }
}
