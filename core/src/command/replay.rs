//! Replay engine commands: preemptive frames and netplay.

use super::Command;
use crate::host::{Host, MaskedSettings};
use crate::netplay::{NETPLAY_DISCONNECTED, NetplayConfig, NetplayEngine, NetplayError};
use crate::replay::{PreemptEngine, PreemptError, ReplayEngine};

/// Slow motion ratio under netplay, a small margin for the peer to catch up.
const NETPLAY_SLOWMOTION: f32 = 1.033;

/// A state was loaded by the user: the active engine has to follow.
pub(crate) fn state_loaded(host: &mut Host) {
    match &mut host.engine {
        ReplayEngine::Preempt(engine) => engine.reset_buffer(),
        ReplayEngine::Netplay(engine) => {
            if let Err(e) = engine.send_savestate(&mut *host.core, &mut host.ctx) {
                tracing::error!(error = %e, "Netplay failed sending state");
                host.ctx.warn(NETPLAY_DISCONNECTED, 0, 480);
                host.command(Command::NetplayDeinit);
            }
        }
        ReplayEngine::None => {}
    }
}

/// Start, restart or stop preemptive frames to match the settings.
pub(crate) fn preempt_update(host: &mut Host) -> bool {
    if host.engine.is_netplay() {
        tracing::debug!("Preemptive frames unavailable during netplay");
        return false;
    }
    host.engine = ReplayEngine::None;

    let frames = host.ctx.settings.runloop.preempt_frames;
    if frames == 0 || !host.ctx.content.loaded || host.core.is_dummy() {
        return true;
    }

    match PreemptEngine::new(frames, &mut *host.core, &mut host.ctx) {
        Ok(engine) => {
            host.engine = ReplayEngine::Preempt(Box::new(engine));
            true
        }
        Err(PreemptError::Unsupported) => {
            host.ctx.warn(
                "Preemptive frames disabled: core does not support savestates.",
                1,
                180,
            );
            false
        }
        Err(e) => {
            host.ctx
                .warn(&format!("Preemptive frames disabled: {e}."), 1, 180);
            false
        }
    }
}

pub(crate) fn preempt_reset_buffer(host: &mut Host) -> bool {
    if let Some(engine) = host.engine.preempt_mut() {
        engine.reset_buffer();
    }
    true
}

/// Force the settings netplay needs, remembering the user's values.
fn mask_settings(host: &mut Host) {
    let settings = &mut host.ctx.settings;
    if host.ctx.netplay_mask.is_none() {
        host.ctx.netplay_mask = Some(MaskedSettings {
            frame_delay: settings.video.frame_delay,
            pause_libretro: settings.menu.pause_libretro,
            pause_nonactive: settings.runloop.pause_nonactive,
            slowmotion_ratio: settings.runloop.slowmotion_ratio,
        });
    }
    settings.video.frame_delay = 0;
    settings.menu.pause_libretro = false;
    settings.runloop.pause_nonactive = false;
    settings.runloop.slowmotion_ratio = NETPLAY_SLOWMOTION;
}

fn unmask_settings(host: &mut Host) {
    let Some(mask) = host.ctx.netplay_mask.take() else {
        return;
    };
    let settings = &mut host.ctx.settings;
    settings.video.frame_delay = mask.frame_delay;
    settings.menu.pause_libretro = mask.pause_libretro;
    settings.runloop.pause_nonactive = mask.pause_nonactive;
    settings.runloop.slowmotion_ratio = mask.slowmotion_ratio;
}

pub(crate) fn netplay_init(host: &mut Host) -> bool {
    let Some(role) = host.ctx.launch.netplay.clone() else {
        return false;
    };
    if !host.ctx.content.loaded || host.core.is_dummy() {
        tracing::warn!("Netplay needs loaded content");
        return false;
    }

    mask_settings(host);
    host.engine = ReplayEngine::None;
    host.command(Command::RewindDeinit);

    let config = NetplayConfig::new(role, &host.ctx.settings.netplay);
    match NetplayEngine::connect(&config, &mut *host.core, &mut host.ctx) {
        Ok(engine) => {
            host.engine = ReplayEngine::Netplay(Box::new(engine));
            host.ctx.replay.rollback_states = true;
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Netplay init failed");
            host.ctx.warn("Failed to initialize netplay.", 0, 180);
            if e.is_user_facing() {
                // Above the generic failure, not replacing it.
                host.ctx.messages.push(e.to_string(), 1, 180, false);
            }
            unmask_settings(host);
            false
        }
    }
}

pub(crate) fn netplay_deinit(host: &mut Host) -> bool {
    let was_active = host.engine.is_netplay();
    if was_active {
        host.engine = ReplayEngine::None;
        tracing::info!("Netplay stopped");
    }
    unmask_settings(host);
    host.ctx.replay.rollback_states = false;
    host.ctx.runloop.netplay_slowmotion = false;
    if was_active {
        host.command(Command::PreemptUpdate);
    }
    true
}

pub(crate) fn netplay_flip(host: &mut Host) -> bool {
    let Some(engine) = host.engine.netplay_mut() else {
        return false;
    };
    match engine.flip_players(&mut host.ctx) {
        Ok(()) => true,
        Err(NetplayError::Nak) => {
            host.ctx.warn("Failed to flip users.", 1, 180);
            false
        }
        Err(e) if e.is_recoverable() => {
            host.ctx.warn(&e.to_string(), 1, 180);
            false
        }
        Err(e) => {
            tracing::error!(error = %e, "Netplay failed flipping users");
            host.ctx.warn(NETPLAY_DISCONNECTED, 0, 480);
            host.command(Command::NetplayDeinit);
            false
        }
    }
}
