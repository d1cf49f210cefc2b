//! Preemptive frames driven through the frame loop

use retrohost_shared::AvEnable;
use retrohost_shared::device::joypad;

use super::test_utils::*;
use crate::command::Command;
use crate::test_utils::TestCore;

fn preempt_rig(frames: u32, core: TestCore) -> Rig {
    rig_with(core, b"game", |settings, _| {
        settings.runloop.preempt_frames = frames;
    })
}

fn states_saved(rig: &Rig) -> u64 {
    rig.host.engine().preempt().unwrap().states_saved()
}

#[test]
fn test_preempt_replays_on_input_change() {
    let mut rig = preempt_rig(2, TestCore::new());
    assert!(rig.host.engine().is_preempt());

    rig.ticks(10);
    assert_eq!(states_saved(&rig), 10);

    rig.input.handle().set_buttons(0, joypad::bit(joypad::B));
    rig.probe.clear_log();
    rig.tick();

    let engine = rig.host.engine().preempt().unwrap();
    assert_eq!(engine.replays(), 1);
    assert!(!engine.in_replay());
    assert_eq!(rig.probe.unserialized(), vec![8]);

    let runs = rig.probe.runs();
    assert_eq!(runs.len(), 3);
    for run in &runs[..2] {
        assert_eq!(run.input[0], joypad::bit(joypad::B));
        assert_eq!(run.av, AvEnable::PREEMPT_PREFRAME);
    }
    assert_eq!(runs[2].input[0], joypad::bit(joypad::B));
    assert_eq!(runs[2].av, AvEnable::VIDEO | AvEnable::AUDIO);
    assert_eq!(rig.host.frame_count(), 11);
    // Only the real frame reaches the drivers.
    assert_eq!(rig.video.frames(), 11);
}

#[test]
fn test_preempt_steady_input_replays_once() {
    let mut rig = preempt_rig(3, TestCore::new());
    rig.input.handle().set_buttons(0, joypad::bit(joypad::A));
    rig.ticks(20);
    assert_eq!(rig.host.engine().preempt().unwrap().replays(), 1);
    rig.ticks(20);
    assert_eq!(rig.host.engine().preempt().unwrap().replays(), 1);
}

#[test]
fn test_preempt_refused_without_savestates() {
    let rig = preempt_rig(2, TestCore::new().without_savestates());
    assert!(rig.host.engine().is_none());
    assert_eq!(
        rig.head_message().as_deref(),
        Some("Preemptive frames disabled: core does not support savestates.")
    );
}

#[test]
fn test_preempt_follows_setting() {
    let mut rig = rig();
    assert!(rig.host.engine().is_none());

    rig.host.ctx.settings.runloop.preempt_frames = 4;
    rig.host.command(Command::PreemptUpdate);
    assert_eq!(rig.host.engine().preempt().unwrap().frames(), 4);

    rig.host.ctx.settings.runloop.preempt_frames = 0;
    rig.host.command(Command::PreemptUpdate);
    assert!(rig.host.engine().is_none());
}

#[test]
fn test_load_state_resets_buffer() {
    let mut rig = preempt_rig(2, TestCore::new());
    rig.ticks(10);
    assert!(rig.host.command(Command::SaveState));
    assert_eq!(rig.head_message().as_deref(), Some("Saved state to slot #0."));

    rig.ticks(5);
    assert_eq!(rig.probe.frame(), 15);
    assert!(rig.host.command(Command::LoadState));
    assert_eq!(rig.probe.frame(), 10);
    assert_eq!(states_saved(&rig), 0);
    assert_eq!(
        rig.head_message().as_deref(),
        Some("Loaded state from slot #0.")
    );
}

#[test]
fn test_reset_resets_buffer() {
    let mut rig = preempt_rig(2, TestCore::new());
    rig.ticks(6);
    assert!(rig.host.command(Command::Reset));
    assert_eq!(rig.probe.resets(), 1);
    assert_eq!(states_saved(&rig), 0);
    assert_eq!(rig.head_message().as_deref(), Some("Reset."));
}

#[test]
fn test_rewind_toggle_restarts_preempt() {
    let mut rig = preempt_rig(2, TestCore::new());
    rig.ticks(10);
    assert_eq!(states_saved(&rig), 10);

    rig.host.ctx.settings.runloop.rewind_enable = true;
    assert!(rig.host.command(Command::RewindToggle));
    assert!(rig.host.ctx.rewind.is_some());
    assert_eq!(states_saved(&rig), 0);

    rig.ticks(3);
    rig.host.ctx.settings.runloop.rewind_enable = false;
    assert!(rig.host.command(Command::RewindToggle));
    assert!(rig.host.ctx.rewind.is_none());
    assert_eq!(states_saved(&rig), 0);
}
