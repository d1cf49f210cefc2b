//! Hotkey state checks run before each frame.
//!
//! Press-triggered hotkeys fire on the rising edge (`trigger`); fast-forward
//! hold, rewind and slow motion follow the level (`held`).

use super::Host;
use crate::command::Command;
use crate::input::Hotkeys;

pub(crate) struct Checks {
    pub held: Hotkeys,
    pub trigger: Hotkeys,
}

impl Checks {
    pub fn pressed(&self, hotkey: Hotkeys) -> bool {
        self.trigger.contains(hotkey)
    }

    pub fn held(&self, hotkey: Hotkeys) -> bool {
        self.held.contains(hotkey)
    }
}

/// Checks that run in every state, paused or not.
pub(crate) fn pre(host: &mut Host, checks: &Checks) {
    if checks.pressed(Hotkeys::FULLSCREEN_TOGGLE) {
        host.command(Command::FullscreenToggle);
    }
    if checks.pressed(Hotkeys::GRAB_MOUSE_TOGGLE) {
        host.command(Command::GrabMouseToggle);
    }
    if checks.pressed(Hotkeys::GAME_FOCUS_TOGGLE) {
        host.command(Command::GameFocusToggle);
    }
    let force_menu = host.core.is_dummy() && !host.ctx.runloop.menu_alive;
    if checks.pressed(Hotkeys::MENU_TOGGLE) || force_menu {
        host.command(Command::MenuToggle);
    }
}

/// Returns true when the core is paused and no one-shot key (frame advance,
/// rewind) was pressed; the tick then ends without a frame.
pub(crate) fn run(host: &mut Host, checks: &Checks) -> bool {
    if host.engine.is_netplay() {
        if checks.pressed(Hotkeys::NETPLAY_FLIP) {
            host.command(Command::NetplayFlipPlayers);
        }
        return false;
    }

    if checks.pressed(Hotkeys::SCREENSHOT) {
        host.command(Command::TakeScreenshot);
    }
    if checks.pressed(Hotkeys::MUTE) {
        host.command(Command::AudioMuteToggle);
    }

    check_focus(host);
    if checks.pressed(Hotkeys::PAUSE_TOGGLE) {
        host.command(Command::PauseToggle);
    } else if checks.pressed(Hotkeys::FRAMEADVANCE) && !host.ctx.runloop.paused {
        host.command(Command::Pause);
    }

    let oneshot = checks.pressed(Hotkeys::FRAMEADVANCE) || checks.pressed(Hotkeys::REWIND);
    if host.ctx.runloop.paused && !oneshot {
        return true;
    }

    check_fast_forward(host, checks);

    if checks.pressed(Hotkeys::STATE_SLOT_PLUS) {
        host.command(Command::StateSlotPlus);
    } else if checks.pressed(Hotkeys::STATE_SLOT_MINUS) {
        host.command(Command::StateSlotMinus);
    }

    if checks.pressed(Hotkeys::SAVE_STATE) {
        host.command(Command::SaveState);
    } else if checks.pressed(Hotkeys::LOAD_STATE) {
        host.command(Command::LoadState);
    }

    check_rewind(host, checks.held(Hotkeys::REWIND));
    host.ctx.runloop.slowmotion = checks.held(Hotkeys::SLOWMOTION);

    if checks.pressed(Hotkeys::RESET) {
        host.command(Command::Reset);
    }

    if checks.pressed(Hotkeys::CHEAT_INDEX_PLUS) {
        host.command(Command::CheatIndexPlus);
    } else if checks.pressed(Hotkeys::CHEAT_INDEX_MINUS) {
        host.command(Command::CheatIndexMinus);
    } else if checks.pressed(Hotkeys::CHEAT_TOGGLE) {
        host.command(Command::CheatToggle);
    }

    if checks.pressed(Hotkeys::DISK_EJECT_TOGGLE) {
        host.command(Command::DiskEjectToggle);
    } else if checks.pressed(Hotkeys::DISK_NEXT) {
        host.command(Command::DiskNext);
    } else if checks.pressed(Hotkeys::DISK_PREV) {
        host.command(Command::DiskPrev);
    }

    false
}

/// Pause on focus loss and resume on regain, if the pause was ours.
fn check_focus(host: &mut Host) {
    if !host.ctx.settings.runloop.pause_nonactive {
        return;
    }
    let focused = host.ctx.drivers.video.has_focus();
    if !focused && !host.ctx.runloop.paused {
        host.ctx.runloop.idle = true;
        host.command(Command::Pause);
    } else if focused && host.ctx.runloop.idle {
        host.ctx.runloop.idle = false;
        host.command(Command::Unpause);
    }
}

/// `nonblock = toggle XOR hold`.
fn check_fast_forward(host: &mut Host, checks: &Checks) {
    let rl = &mut host.ctx.runloop;
    if checks.pressed(Hotkeys::FAST_FORWARD) {
        rl.fastforward_toggle = !rl.fastforward_toggle;
    }
    let nonblock = rl.fastforward_toggle ^ checks.held(Hotkeys::FAST_FORWARD_HOLD);
    if nonblock == rl.nonblock {
        return;
    }
    rl.nonblock = nonblock;
    host.ctx.drivers.audio.set_nonblocking(nonblock);
    host.ctx.limiter.reset();
    tracing::info!(enabled = nonblock, "Fast forward");
}

/// Pop and load a state while rewind is held, push one otherwise; both every
/// `rewind_granularity` ticks.
fn check_rewind(host: &mut Host, held: bool) {
    if host.ctx.runloop.frame_is_reverse && !held {
        host.ctx.drivers.set_audio_reverse(false);
        host.ctx.runloop.frame_is_reverse = false;
    }
    let Some(mut rewind) = host.ctx.rewind.take() else {
        return;
    };
    rewind.set_rewinding(held);

    if rewind.step() {
        if held {
            match rewind.pop() {
                Some(state) => {
                    let loaded = host.with_core(|core, cb| core.unserialize(cb, &state));
                    rewind.recycle(state);
                    if loaded {
                        host.ctx.runloop.frame_is_reverse = true;
                        host.ctx.drivers.set_audio_reverse(true);
                        let duration = if host.ctx.runloop.paused { 1 } else { 30 };
                        host.ctx.messages.push("Rewinding.", 0, duration, true);
                        if let Some(preempt) = host.engine.preempt_mut() {
                            preempt.reset_buffer();
                        }
                    } else {
                        tracing::warn!("Core rejected a rewind state");
                    }
                }
                None => host
                    .ctx
                    .messages
                    .push("Reached end of rewind buffer.", 0, 30, true),
            }
        } else if !rewind.push(|buf| host.with_core(|core, cb| core.serialize(cb, buf))) {
            tracing::debug!("Rewind capture failed");
        }
    }

    host.ctx.rewind = Some(rewind);
}
