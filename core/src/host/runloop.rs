//! One iteration of the frame loop.

use std::thread;
use std::time::{Duration, Instant};

use super::pacing::{self, PacingInput};
use super::state_checks::{self, Checks};
use super::{Host, TickResult};
use crate::command::{self, Command};
use crate::input::Hotkeys;
use crate::netplay::{NETPLAY_DISCONNECTED, NetplayError};
use crate::replay::{PreemptError, ReplayEngine};

/// Sleep while paused so the loop does not spin.
const PAUSED_SLEEP: Duration = Duration::from_millis(10);

pub(crate) const QUIT_CONFIRM: &str = "Press again to quit...";
const QUIT_CONFIRM_TICKS: u32 = 120;

enum EngineFailure {
    Preempt(PreemptError),
    Netplay(NetplayError),
}

impl Host {
    /// Run one iteration of the frame loop.
    pub fn tick(&mut self) -> TickResult {
        if let Some(text) = self.ctx.messages.pull() {
            self.ctx.drivers.video.message(&text);
        }
        self.ctx.input.begin_tick();

        let held = self.read_hotkeys();
        let checks = Checks {
            held,
            trigger: held & !self.ctx.runloop.last_input,
        };
        self.ctx.runloop.last_input = held;

        if checks.pressed(Hotkeys::QUIT) {
            self.confirm_quit();
        }
        if self.time_to_exit() {
            return self.quit();
        }

        self.frame_time();
        state_checks::pre(self, &checks);

        if state_checks::run(self, &checks) {
            thread::sleep(PAUSED_SLEEP);
            return TickResult::Waiting;
        }

        if self.ctx.runloop.menu_alive {
            self.ctx.drivers.menu.iterate(checks.trigger);
            if self.ctx.settings.menu.pause_libretro {
                self.pace(true);
                return TickResult::Waiting;
            }
        }

        if self.ctx.runloop.exec {
            return self.quit();
        }

        self.run_frame();
        self.pace(false);
        TickResult::Running
    }

    /// Poll devices for this tick and resolve the held hotkeys.
    fn read_hotkeys(&mut self) -> Hotkeys {
        let ctx = &mut self.ctx;
        let remap = ctx.settings.input.remap_binds_enable;
        ctx.input.poll_once(&mut *ctx.drivers.input, remap);
        let mut held = ctx
            .input
            .keys_pressed(&*ctx.drivers.input, &ctx.settings.input);

        if ctx.input.flushing {
            if held.is_empty() {
                ctx.input.flushing = false;
            }
            held = Hotkeys::empty();
        }
        if ctx.runloop.game_focus {
            held &= Hotkeys::GAME_FOCUS_TOGGLE;
        }
        held
    }

    /// First press asks for confirmation; a second press while the prompt
    /// is still showing quits.
    fn confirm_quit(&mut self) {
        if self.ctx.messages.peek().as_deref() == Some(QUIT_CONFIRM) {
            self.ctx.runloop.shutdown = true;
        } else {
            self.ctx.notify(QUIT_CONFIRM, 1, QUIT_CONFIRM_TICKS);
        }
    }

    fn time_to_exit(&mut self) -> bool {
        let rl = &self.ctx.runloop;
        if rl.core_shutdown
            && self.ctx.settings.runloop.load_dummy_on_core_shutdown
            && !self.core.is_dummy()
        {
            tracing::info!("Core shut down; switching to the dummy core");
            command::lifecycle::load_dummy(self);
            return false;
        }

        let max_frames_reached = self
            .ctx
            .launch
            .max_frames
            .is_some_and(|max| self.ctx.runloop.frame_count >= max);
        if max_frames_reached {
            tracing::info!(frames = self.ctx.runloop.frame_count, "Reached max frames");
        }
        let rl = &self.ctx.runloop;
        rl.shutdown || max_frames_reached || !self.ctx.drivers.video_alive()
    }

    fn quit(&mut self) -> TickResult {
        if self.ctx.runloop.core_shutdown {
            tracing::info!("Core requested shutdown");
        }
        self.ctx.runloop.shutdown = true;
        TickResult::Quit
    }

    /// Feed the frame-time callback, if the core registered one.
    fn frame_time(&mut self) {
        let Some(reference) = self.ctx.system.frame_time_reference else {
            return;
        };
        let rl = &self.ctx.runloop;
        let locked = rl.paused || rl.nonblock;
        let slowmotion = rl
            .is_slowmotion()
            .then_some(self.ctx.settings.runloop.slowmotion_ratio);
        let delta = self
            .ctx
            .frame_timer
            .delta(Instant::now(), reference, locked, slowmotion);
        self.with_core(|core, cb| core.frame_time(cb, delta));
    }

    /// The engine's pre-frame, exactly one real `run`, then post-frame work.
    fn run_frame(&mut self) {
        let pre = match &mut self.engine {
            ReplayEngine::None => Ok(()),
            ReplayEngine::Preempt(engine) => engine
                .pre_frame(&mut *self.core, &mut self.ctx)
                .map_err(EngineFailure::Preempt),
            ReplayEngine::Netplay(engine) => engine
                .pre_frame(&mut *self.core, &mut self.ctx)
                .map_err(EngineFailure::Netplay),
        };
        if let Err(failure) = pre {
            self.engine_failed(failure);
        }

        let frame_delay = self.ctx.settings.video.frame_delay;
        if frame_delay > 0 && !self.ctx.runloop.nonblock {
            thread::sleep(Duration::from_millis(u64::from(frame_delay)));
        }

        self.deliver_key_events();
        self.with_core(|core, cb| core.run(cb));
        self.ctx.runloop.frame_count += 1;

        let post = match &mut self.engine {
            ReplayEngine::Netplay(engine) => engine.post_frame(&mut self.ctx),
            _ => Ok(()),
        };
        if let Err(e) = post {
            self.engine_failed(EngineFailure::Netplay(e));
        }

        let muted = self.ctx.audio_muted();
        self.ctx.drivers.flush_audio(muted);
        for worker in &mut self.ctx.autosave {
            worker.tick(&mut *self.core);
        }
        self.drain_pending();
    }

    fn deliver_key_events(&mut self) {
        if !self.ctx.system.keyboard_callback {
            return;
        }
        for event in self.ctx.input.take_key_events() {
            self.with_core(|core, cb| {
                core.keyboard_event(cb, event.down, event.key, event.character, event.modifiers)
            });
        }
    }

    fn engine_failed(&mut self, failure: EngineFailure) {
        match failure {
            EngineFailure::Preempt(PreemptError::StateSizeGrew { old, new }) => {
                tracing::warn!(old, new, "Savestate size grew; reallocating preemptive frames");
                self.command(Command::PreemptUpdate);
            }
            EngineFailure::Preempt(e) => {
                self.engine = ReplayEngine::None;
                self.ctx.warn(&format!("Preemptive frames disabled: {e}."), 1, 180);
            }
            EngineFailure::Netplay(e) => {
                tracing::error!(error = %e, "Netplay failed");
                self.ctx.warn(NETPLAY_DISCONNECTED, 0, 480);
                self.command(Command::NetplayDeinit);
            }
        }
    }

    fn pace(&mut self, menu_paused: bool) {
        let rl = &self.ctx.runloop;
        let settings = &self.ctx.settings.runloop;
        let input = PacingInput {
            menu_paused,
            slowmotion: rl.is_slowmotion(),
            slowmotion_ratio: settings.slowmotion_ratio,
            fast_forward: rl.nonblock,
            fastforward_ratio: settings.fastforward_ratio,
            core_throttle: settings.core_throttle_enable,
            fps: self.ctx.throttled_fps(),
        };
        let interval = pacing::target_interval(&input);
        self.ctx.limiter.limit(interval);
    }
}
