//! Disk swap commands.

use crate::host::Host;
use crate::plugin::DiskControl;

const UNSUPPORTED: &str = "Core does not support Disk Options.";

/// The core's disk interface, if it registered one.
fn control(host: &mut Host) -> Option<&mut dyn DiskControl> {
    if !host.ctx.system.disk_control {
        return None;
    }
    host.core.disk_control()
}

pub(crate) fn eject_toggle(host: &mut Host) -> bool {
    let Some(disk) = control(host) else {
        host.ctx.warn(UNSUPPORTED, 1, 120);
        return false;
    };
    let eject = !disk.get_eject_state();
    if !disk.set_eject_state(eject) {
        host.ctx.warn("Failed to toggle virtual disk tray.", 1, 180);
        return false;
    }
    let msg = if eject {
        "Ejected virtual disk tray."
    } else {
        "Closed virtual disk tray."
    };
    host.ctx.notify(msg, 0, 180);
    true
}

/// Move to the next (`1`) or previous (`-1`) image. Only while the tray is
/// open; the index is clamped to the available images.
pub(crate) fn step(host: &mut Host, delta: i32) -> bool {
    let Some(disk) = control(host) else {
        host.ctx.warn(UNSUPPORTED, 1, 120);
        return false;
    };
    if !disk.get_eject_state() {
        tracing::debug!("Disk tray closed; not swapping");
        return false;
    }
    let count = disk.get_num_images();
    if count == 0 || count == u32::MAX {
        tracing::error!(count, "Core reported an invalid disk count");
        return false;
    }
    let current = disk.get_image_index();
    let index = if delta > 0 {
        (current + 1).min(count - 1)
    } else {
        current.saturating_sub(1)
    };
    if !disk.set_image_index(index) {
        host.ctx
            .warn(&format!("Failed to set disk {} in tray.", index + 1), 1, 180);
        return false;
    }
    host.ctx.notify(
        &format!("Setting disk {} of {} in tray.", index + 1, count),
        0,
        180,
    );
    true
}
