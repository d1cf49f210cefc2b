//! Disk swapping, rewind, save files and screenshots

use retrohost_shared::device::memory;

use super::test_utils::*;
use crate::command::Command;
use crate::test_utils::TestCore;

fn disk_index(rig: &mut Rig) -> u32 {
    rig.host.core_mut().disk_control().unwrap().get_image_index()
}

fn disk_ejected(rig: &mut Rig) -> bool {
    rig.host.core_mut().disk_control().unwrap().get_eject_state()
}

#[test]
fn test_disk_cycle() {
    let mut rig = rig_with(TestCore::new().with_disks(3), b"game", |_, _| {});
    assert!(rig.host.command(Command::DiskEjectToggle));
    assert!(disk_ejected(&mut rig));
    assert_eq!(rig.head_message().as_deref(), Some("Ejected virtual disk tray."));

    assert!(rig.host.command(Command::DiskNext));
    assert_eq!(disk_index(&mut rig), 1);
    assert_eq!(
        rig.head_message().as_deref(),
        Some("Setting disk 2 of 3 in tray.")
    );

    rig.host.command(Command::DiskPrev);
    assert_eq!(disk_index(&mut rig), 0);
    rig.host.command(Command::DiskPrev);
    assert_eq!(disk_index(&mut rig), 0);

    rig.host.command(Command::DiskEjectToggle);
    rig.host.command(Command::DiskEjectToggle);
    assert!(disk_ejected(&mut rig));
}

#[test]
fn test_disk_next_clamps_to_last_image() {
    let mut rig = rig_with(TestCore::new().with_disks(2), b"game", |_, _| {});
    rig.host.command(Command::DiskEjectToggle);
    rig.host.command(Command::DiskNext);
    rig.host.command(Command::DiskNext);
    assert_eq!(disk_index(&mut rig), 1);
}

#[test]
fn test_disk_swap_needs_open_tray() {
    let mut rig = rig_with(TestCore::new().with_disks(3), b"game", |_, _| {});
    assert!(!rig.host.command(Command::DiskNext));
    assert_eq!(disk_index(&mut rig), 0);
}

#[test]
fn test_disk_commands_without_interface() {
    let mut rig = rig();
    assert!(!rig.host.command(Command::DiskEjectToggle));
    assert_eq!(
        rig.head_message().as_deref(),
        Some("Core does not support Disk Options.")
    );
}

#[test]
fn test_rewind_steps_back_by_granularity() {
    // 32-byte states, room for ten of them.
    let mut rig = rig_with(TestCore::new(), b"game", |settings, _| {
        settings.runloop.rewind_enable = true;
        settings.runloop.rewind_buffer_size = 320;
        settings.runloop.rewind_granularity = 4;
    });
    rig.ticks(40);
    let rewind = rig.host.ctx.rewind.as_ref().unwrap();
    assert_eq!(rewind.capacity(), 10);
    assert_eq!(rewind.len(), 10);

    rig.probe.clear_log();
    rig.input.handle().press_key(REWIND);
    for _ in 0..20 {
        rig.tick();
        assert!(rig.host.ctx.drivers.audio_reverse());
    }
    assert_eq!(rig.probe.unserialized(), vec![36, 32, 28, 24, 20]);
    assert_eq!(rig.host.ctx.rewind.as_ref().unwrap().len(), 5);
    assert_eq!(rig.probe.frame(), 24);

    rig.input.handle().release_key(REWIND);
    rig.tick();
    assert!(!rig.host.ctx.drivers.audio_reverse());
}

#[test]
fn test_rewind_reports_empty_buffer() {
    let mut rig = rig_with(TestCore::new(), b"game", |settings, _| {
        settings.runloop.rewind_enable = true;
        settings.runloop.rewind_buffer_size = 64;
    });
    rig.ticks(2);
    rig.input.handle().press_key(REWIND);
    rig.ticks(3);
    assert_eq!(
        rig.head_message().as_deref(),
        Some("Reached end of rewind buffer.")
    );
}

#[test]
fn test_rewind_refused_without_savestates() {
    let rig = rig_with(TestCore::new().without_savestates(), b"game", |settings, _| {
        settings.runloop.rewind_enable = true;
    });
    assert!(rig.host.ctx.rewind.is_none());
    assert_eq!(
        rig.head_message().as_deref(),
        Some("Core does not support save states. Cannot use rewind.")
    );
}

#[test]
fn test_save_ram_round_trip() {
    let mut core = TestCore::new().with_sram(4);
    core.sram_mut().copy_from_slice(&[1, 2, 3, 4]);
    let mut first = rig_with(core, b"game", |_, _| {});
    first.ticks(2);
    first.host.shutdown();
    let srm = first.dir.path().join("game.srm");
    assert_eq!(std::fs::read(&srm).unwrap(), vec![1, 2, 3, 4]);

    let save_dir = first.dir.path().to_path_buf();
    let mut second = rig_with(TestCore::new().with_sram(4), b"game", |_, launch| {
        launch.save_path = Some(save_dir);
    });
    let sram = second
        .host
        .core_mut()
        .memory_data(memory::SAVE_RAM)
        .unwrap()
        .to_vec();
    assert_eq!(sram, vec![1, 2, 3, 4]);
}

#[test]
fn test_screenshot_written_next_to_content() {
    let mut rig = rig();
    rig.tick();
    assert!(rig.host.command(Command::TakeScreenshot));
    let pngs = std::fs::read_dir(rig.dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "png"))
        .count();
    assert_eq!(pngs, 1);
}

#[test]
fn test_screenshot_needs_a_frame() {
    let mut rig = rig();
    assert!(!rig.host.command(Command::TakeScreenshot));
    assert_eq!(
        rig.head_message().as_deref(),
        Some("Failed to take screenshot.")
    );
}
