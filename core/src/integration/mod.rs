//! Integration tests for the retrohost frame loop
//!
//! Drive a [`Host`](crate::Host) over the deterministic test core with
//! scripted input and recording drivers, one `tick` at a time.

#[cfg(test)]
mod frame_loop_tests;
#[cfg(test)]
mod netplay_tests;
#[cfg(test)]
mod replay_tests;
#[cfg(test)]
mod session_tests;

#[cfg(test)]
pub(crate) mod test_utils {
    use retrohost_shared::Key;
    use tempfile::TempDir;

    use crate::config::Settings;
    use crate::drivers::{Drivers, NullMenu};
    use crate::host::{Host, LaunchOptions, TickResult};
    use crate::test_utils::{CoreProbe, RecordingAudio, RecordingVideo, ScriptedInput, TestCore};

    pub const PAUSE: Key = Key::ascii(b'p');
    pub const FRAMEADVANCE: Key = Key::ascii(b'k');
    pub const REWIND: Key = Key::ascii(b'r');
    pub const QUIT: Key = Key::ESCAPE;

    /// A host over a [`TestCore`], with handles on everything it drives.
    pub struct Rig {
        pub host: Host,
        pub input: ScriptedInput,
        pub video: RecordingVideo,
        pub audio: RecordingAudio,
        pub probe: CoreProbe,
        pub dir: TempDir,
    }

    /// Unthrottled settings that never touch the user's config directory.
    pub fn test_settings(dir: &TempDir) -> Settings {
        let mut settings = Settings::default();
        settings.runloop.core_throttle_enable = false;
        settings.runloop.pause_nonactive = false;
        settings.input.auto_remaps_enable = false;
        settings.paths.core_options_directory = Some(dir.path().join("options"));
        settings.paths.cheat_directory = Some(dir.path().join("cheats"));
        settings
    }

    /// Build and init a host running `core` on a content file holding
    /// `content`.
    pub fn rig_with(
        core: TestCore,
        content: &[u8],
        configure: impl FnOnce(&mut Settings, &mut LaunchOptions),
    ) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let game = dir.path().join("game.bin");
        std::fs::write(&game, content).unwrap();

        let mut settings = test_settings(&dir);
        let mut launch = LaunchOptions {
            content: Some(game),
            ..LaunchOptions::default()
        };
        configure(&mut settings, &mut launch);

        let input = ScriptedInput::default();
        let video = RecordingVideo::default();
        let audio = RecordingAudio::default();
        let drivers = Drivers::new(
            Box::new(video.clone()),
            Box::new(audio.clone()),
            Box::new(input.clone()),
            Box::new(NullMenu),
        );
        let probe = core.probe();
        let mut host = Host::new(settings, drivers, launch);
        host.preload_core(Box::new(core));
        host.init().unwrap();

        Rig {
            host,
            input,
            video,
            audio,
            probe,
            dir,
        }
    }

    pub fn rig() -> Rig {
        rig_with(TestCore::new(), b"game", |_, _| {})
    }

    impl Rig {
        pub fn tick(&mut self) -> TickResult {
            self.host.tick()
        }

        pub fn ticks(&mut self, n: usize) {
            for _ in 0..n {
                self.tick();
            }
        }

        /// Press `key` for one tick, then release it for one tick.
        pub fn tap(&mut self, key: Key) -> TickResult {
            self.input.handle().press_key(key);
            let result = self.tick();
            self.input.handle().release_key(key);
            self.tick();
            result
        }

        pub fn head_message(&self) -> Option<String> {
            self.host.ctx.messages.peek()
        }
    }
}
