//! Netplay started from launch options, two hosts over loopback

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use super::test_utils::*;
use crate::command::Command;
use crate::host::NetplayRole;
use crate::netplay::{NETPLAY_DISCONNECTED, NetplayListener};
use crate::test_utils::TestCore;

/// A port both sockets were free on a moment ago.
fn free_port() -> u16 {
    let listener = NetplayListener::bind(0).unwrap();
    listener.port().unwrap()
}

fn netplay_rig(role: NetplayRole, port: u16, content: &[u8]) -> Rig {
    rig_with(TestCore::new(), content, |settings, launch| {
        settings.netplay.port = port;
        settings.netplay.delay_frames = 2;
        settings.video.frame_delay = 3;
        launch.netplay = Some(role);
    })
}

fn client_role() -> NetplayRole {
    NetplayRole::Client {
        server: "127.0.0.1".to_string(),
    }
}

/// Run `host` and `client` on their own threads; the client starts a bit
/// later so the host is listening.
fn run_pair<R: Send + 'static>(
    host: impl FnOnce() -> R + Send + 'static,
    client: impl FnOnce() -> R + Send + 'static,
) -> (R, R) {
    let host = thread::Builder::new()
        .name("host".into())
        .spawn(host)
        .unwrap();
    let client = thread::Builder::new()
        .name("client".into())
        .spawn(move || {
            thread::sleep(Duration::from_millis(200));
            client()
        })
        .unwrap();
    (host.join().unwrap(), client.join().unwrap())
}

#[derive(Debug)]
struct Failed {
    netplay: bool,
    message: Option<String>,
    frame_delay: u32,
}

#[test]
fn test_content_mismatch_tears_both_sides_down() {
    let port = free_port();
    let observe = |rig: Rig| Failed {
        netplay: rig.host.engine().is_netplay(),
        message: rig.head_message(),
        frame_delay: rig.host.ctx.settings.video.frame_delay,
    };
    let (host, client) = run_pair(
        move || observe(netplay_rig(NetplayRole::Host, port, b"aaaa")),
        move || observe(netplay_rig(client_role(), port, b"bbbb")),
    );
    for side in [host, client] {
        assert!(!side.netplay);
        assert_eq!(
            side.message.as_deref(),
            Some("Content CRC32s differ. Cannot use different games.")
        );
        assert_eq!(side.frame_delay, 3);
    }
}

#[derive(Debug, PartialEq)]
struct Session {
    hash: u64,
    frames: u64,
    masked_delay: u32,
    masked_pause: bool,
    restored_delay: u32,
    restored_pause: bool,
    engine_after: bool,
}

#[test]
fn test_session_masks_and_restores_settings() {
    let port = free_port();
    let barrier = Arc::new(Barrier::new(2));
    let play = move |role: NetplayRole, barrier: Arc<Barrier>| {
        move || {
            let mut rig = netplay_rig(role, port, b"game");
            assert!(rig.host.engine().is_netplay());
            assert!(rig.host.ctx.replay.rollback_states);
            let masked_delay = rig.host.ctx.settings.video.frame_delay;
            let masked_pause = rig.host.ctx.settings.menu.pause_libretro;
            assert!((rig.host.ctx.settings.runloop.slowmotion_ratio - 1.033).abs() < 1e-6);

            rig.ticks(40);
            barrier.wait();
            rig.host.command(Command::NetplayDeinit);
            Session {
                hash: rig.probe.hash(),
                frames: rig.host.frame_count(),
                masked_delay,
                masked_pause,
                restored_delay: rig.host.ctx.settings.video.frame_delay,
                restored_pause: rig.host.ctx.settings.menu.pause_libretro,
                engine_after: !rig.host.engine().is_none(),
            }
        }
    };
    let (host, client) = run_pair(
        play(NetplayRole::Host, barrier.clone()),
        play(client_role(), barrier),
    );

    assert_eq!(host, client);
    assert_eq!(host.frames, 40);
    assert_eq!(host.masked_delay, 0);
    assert!(!host.masked_pause);
    assert_eq!(host.restored_delay, 3);
    assert!(host.restored_pause);
    assert!(!host.engine_after);
}

#[test]
fn test_peer_leaving_ends_session_locally() {
    let port = free_port();
    let (host, client) = run_pair(
        move || {
            let mut rig = netplay_rig(NetplayRole::Host, port, b"game");
            let mut ticks = 0;
            while rig.host.engine().is_netplay() && ticks < 500 {
                rig.tick();
                ticks += 1;
            }
            let ended = !rig.host.engine().is_netplay();
            let warned = rig.host.ctx.messages.contains(NETPLAY_DISCONNECTED);
            // Play goes on without the peer.
            let frames = rig.host.frame_count();
            rig.ticks(5);
            (ended, warned, rig.host.frame_count() == frames + 5)
        },
        move || {
            let mut rig = netplay_rig(client_role(), port, b"game");
            rig.ticks(20);
            (rig.host.engine().is_netplay(), false, true)
        },
    );
    assert_eq!(host, (true, true, true));
    assert!(client.0);
}
