//! Pause, menu, audio, window and cheat commands.

use std::path::PathBuf;

use super::Command;
use crate::cheats::{self, CheatManager};
use crate::config;
use crate::host::Host;

pub(crate) fn set_paused(host: &mut Host, paused: bool) -> bool {
    host.ctx.runloop.paused = paused;
    host.command(Command::PauseChecks)
}

/// Side effects of the pause state: audio stops while paused.
pub(crate) fn pause_checks(host: &mut Host) -> bool {
    if host.ctx.runloop.paused {
        tracing::info!("Paused.");
        host.command(Command::AudioStop);
        if host.ctx.settings.video.black_frame_insertion || host.ctx.runloop.idle {
            host.ctx.drivers.present_cached();
        }
    } else {
        tracing::info!("Unpaused.");
        host.command(Command::AudioStart);
    }
    true
}

pub(crate) fn audio_start(host: &mut Host) -> bool {
    if !host.ctx.drivers.audio_active() {
        return false;
    }
    if !host.ctx.drivers.start_audio() {
        host.ctx.warn(
            "Failed to start audio driver. Will continue without audio.",
            0,
            180,
        );
        return false;
    }
    true
}

pub(crate) fn audio_stop(host: &mut Host) -> bool {
    host.ctx.drivers.stop_audio()
}

pub(crate) fn mute_toggle(host: &mut Host) -> bool {
    let mute = &mut host.ctx.settings.audio.mute;
    *mute = !*mute;
    let msg = if *mute { "Audio muted." } else { "Audio unmuted." };
    host.ctx.notify(msg, 1, 180);
    true
}

pub(crate) fn menu_toggle(host: &mut Host) -> bool {
    let pause_core = host.ctx.settings.menu.pause_libretro;
    if host.ctx.runloop.menu_alive {
        host.ctx.runloop.menu_alive = false;
        host.ctx.drivers.menu.closed();
        // The toggle key is still down; keep it away from the core.
        host.ctx.input.flushing = true;
        if pause_core && !host.ctx.runloop.paused {
            host.command(Command::AudioStart);
        }
        tracing::info!("Menu closed");
    } else {
        host.ctx.runloop.menu_alive = true;
        host.ctx.drivers.menu.opened();
        if pause_core {
            host.command(Command::AudioStop);
        }
        tracing::info!("Menu opened");
    }
    true
}

pub(crate) fn grab_mouse_toggle(host: &mut Host) -> bool {
    let grab = !host.ctx.runloop.grab_mouse;
    host.ctx.runloop.grab_mouse = grab;
    host.ctx.drivers.video.grab_mouse(grab);
    tracing::info!(grab, "Grab mouse");
    true
}

pub(crate) fn fullscreen_toggle(host: &mut Host) -> bool {
    let fullscreen = !host.ctx.settings.video.fullscreen;
    host.ctx.settings.video.fullscreen = fullscreen;
    host.ctx.drivers.video.set_fullscreen(fullscreen);
    tracing::info!(fullscreen, "Fullscreen");
    true
}

/// Game focus hands every key to the core; only the toggle itself stays a
/// hotkey.
pub(crate) fn game_focus_toggle(host: &mut Host) -> bool {
    let focus = !host.ctx.runloop.game_focus;
    host.ctx.runloop.game_focus = focus;
    if focus != host.ctx.runloop.grab_mouse {
        host.command(Command::GrabMouseToggle);
    }
    let msg = if focus { "Game focus on." } else { "Game focus off." };
    host.ctx.notify(msg, 1, 120);
    true
}

fn cheat_file(host: &Host) -> Option<PathBuf> {
    let dir = host
        .ctx
        .settings
        .paths
        .cheat_directory
        .clone()
        .or_else(|| config::config_dir().map(|dir| dir.join("cheats")))?;
    Some(cheats::cheat_path(
        &dir,
        &host.ctx.system.info.library_name,
        &host.ctx.content.basename,
    ))
}

pub(crate) fn cheats_init(host: &mut Host) -> bool {
    host.ctx.cheats = None;
    if host.core.is_dummy() || !host.ctx.content.loaded {
        return false;
    }
    let Some(path) = cheat_file(host).filter(|path| path.exists()) else {
        return false;
    };
    match CheatManager::load(&path) {
        Ok(manager) => {
            host.ctx.cheats = Some(manager);
            host.command(Command::CheatsApply)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load cheats");
            false
        }
    }
}

/// Persist the enabled flags and drop the table.
pub(crate) fn cheats_deinit(host: &mut Host) -> bool {
    let Some(manager) = host.ctx.cheats.take() else {
        return false;
    };
    if let Some(path) = cheat_file(host)
        && let Err(e) = manager.save(&path)
    {
        tracing::warn!(error = %e, "Failed to save cheats");
    }
    true
}

/// Reset the core's cheats and feed every enabled code in index order.
pub(crate) fn cheats_apply(host: &mut Host) -> bool {
    let Some(manager) = &host.ctx.cheats else {
        return false;
    };
    let codes: Vec<(u32, String)> = manager
        .enabled_codes()
        .map(|(index, code)| (index, code.to_string()))
        .collect();
    host.with_core(|core, cb| {
        core.cheat_reset(cb);
        for (index, code) in &codes {
            core.cheat_set(cb, *index, true, code);
        }
    });
    tracing::debug!(enabled = codes.len(), "Cheats applied");
    true
}

fn cheat_status(host: &Host) {
    if let Some(status) = host.ctx.cheats.as_ref().and_then(CheatManager::status) {
        host.ctx.notify(&status, 1, 180);
    }
}

pub(crate) fn cheat_index(host: &mut Host, delta: i32) -> bool {
    let Some(manager) = host.ctx.cheats.as_mut() else {
        return false;
    };
    if delta > 0 {
        manager.index_next();
    } else {
        manager.index_prev();
    }
    cheat_status(host);
    true
}

pub(crate) fn cheat_toggle(host: &mut Host) -> bool {
    let Some(manager) = host.ctx.cheats.as_mut() else {
        return false;
    };
    manager.toggle();
    host.command(Command::CheatsApply);
    cheat_status(host);
    true
}
