//! Frame loop: progress, pause, frame advance and quitting

use super::test_utils::*;
use crate::command::Command;
use crate::drivers::{Drivers, NullAudio, NullMenu, NullVideo};
use crate::host::{Host, HostError, LaunchOptions, TickResult};
use crate::input::NullInput;
use crate::test_utils::TestCore;

#[test]
fn test_one_frame_per_tick() {
    let mut rig = rig();
    for _ in 0..30 {
        assert_eq!(rig.tick(), TickResult::Running);
    }
    assert_eq!(rig.host.frame_count(), 30);
    assert_eq!(rig.probe.frame(), 30);
    assert_eq!(rig.video.frames(), 30);
    assert_eq!(rig.audio.written().len(), 30 * 4);
}

#[test]
fn test_pause_and_frame_advance() {
    let mut rig = rig();
    rig.tick();
    assert_eq!(rig.host.frame_count(), 1);

    assert_eq!(rig.tap(PAUSE), TickResult::Waiting);
    assert!(rig.host.is_paused());
    assert_eq!(rig.host.frame_count(), 1);

    assert_eq!(rig.tap(FRAMEADVANCE), TickResult::Running);
    assert_eq!(rig.host.frame_count(), 2);
    assert!(rig.host.is_paused());

    rig.tap(FRAMEADVANCE);
    rig.tap(FRAMEADVANCE);
    assert_eq!(rig.host.frame_count(), 4);
    assert!(rig.host.is_paused());
}

#[test]
fn test_frame_advance_pauses_running_core() {
    let mut rig = rig();
    rig.tick();
    rig.tap(FRAMEADVANCE);
    assert!(rig.host.is_paused());
    let frames = rig.host.frame_count();
    rig.ticks(3);
    assert_eq!(rig.host.frame_count(), frames);
}

#[test]
fn test_pause_toggle_twice_is_identity() {
    let mut rig = rig();
    rig.ticks(5);
    for paused in [false, true] {
        if paused {
            rig.host.command(Command::Pause);
        }
        rig.host.command(Command::PauseToggle);
        rig.host.command(Command::PauseToggle);
        assert_eq!(rig.host.is_paused(), paused);
        assert_eq!(rig.host.frame_count(), 5);
    }
}

#[test]
fn test_quit_needs_confirmation() {
    let mut rig = rig();
    assert_eq!(rig.tap(QUIT), TickResult::Running);
    assert_eq!(rig.head_message().as_deref(), Some("Press again to quit..."));

    rig.input.handle().press_key(QUIT);
    assert_eq!(rig.tick(), TickResult::Quit);
}

#[test]
fn test_quit_confirmation_expires() {
    let mut rig = rig();
    rig.tap(QUIT);
    rig.ticks(130);
    assert_eq!(rig.head_message(), None);

    rig.input.handle().press_key(QUIT);
    assert_eq!(rig.tick(), TickResult::Running);
    assert_eq!(rig.head_message().as_deref(), Some("Press again to quit..."));
}

#[test]
fn test_max_frames_stops_loop() {
    let mut rig = rig_with(TestCore::new(), b"game", |_, launch| {
        launch.max_frames = Some(5);
    });
    rig.ticks(5);
    assert_eq!(rig.tick(), TickResult::Quit);
    assert_eq!(rig.host.frame_count(), 5);
}

#[test]
fn test_core_without_content_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = Host::new(
        test_settings(&dir),
        Drivers::new(
            Box::new(NullVideo),
            Box::new(NullAudio),
            Box::new(NullInput),
            Box::new(NullMenu),
        ),
        LaunchOptions::default(),
    );
    host.preload_core(Box::new(TestCore::new()));
    assert!(matches!(host.init(), Err(HostError::NoContent)));
    assert!(host.core().is_dummy());
}

#[test]
fn test_core_without_content_runs_when_supported() {
    let mut rig = rig_with(TestCore::new().with_no_game(), b"", |_, launch| {
        launch.content = None;
    });
    assert!(rig.host.ctx.content.no_content);
    assert_eq!(rig.probe.loaded(), None);
    rig.ticks(3);
    assert_eq!(rig.host.frame_count(), 3);
}

#[test]
fn test_menu_pauses_core() {
    let mut rig = rig();
    rig.tick();
    rig.host.command(Command::MenuToggle);
    assert_eq!(rig.tick(), TickResult::Waiting);
    assert_eq!(rig.host.frame_count(), 1);

    rig.host.command(Command::MenuToggle);
    assert_eq!(rig.tick(), TickResult::Running);
    assert_eq!(rig.host.frame_count(), 2);
}

#[test]
fn test_shutdown_unloads_content() {
    let mut rig = rig();
    rig.ticks(2);
    rig.host.shutdown();
    assert!(rig.probe.unloaded());
    assert!(!rig.host.ctx.content.loaded);
}

#[test]
fn test_reinit_polls_input_once() {
    let mut rig = rig();
    rig.ticks(3);
    let before = rig.input.handle().polls();
    assert!(rig.host.command(Command::Reinit));
    assert_eq!(rig.input.handle().polls(), before + 1);
}
