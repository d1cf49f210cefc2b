//! Preemptive frames
//!
//! Hides `N` frames of input latency. Every tick the state before the frame
//! is saved into a ring of `N` slots. When the input the core cares about
//! changes, the oldest slot is loaded and the last `N` frames are re-run
//! with the new input under suspended A/V, so the frame shown this tick
//! already reflects it.
//!
//! ```text
//! tick t, input changed:
//!   load slots[start]            state before frame t-N
//!   run                          frame t-N   (hidden)
//!   save slots[start+1], run     frame t-N+1 (hidden)
//!   ...
//!   save slots[start]            state before frame t
//! then the frame loop runs frame t with A/V live
//! ```

use thiserror::Error;

use super::InputShadow;
use crate::host::{HostCallbacks, HostContext, InputOverlay};
use crate::plugin::Core;

/// Upper bound on configured preemptive frames.
pub const MAX_FRAMES: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreemptError {
    #[error("core does not support savestates")]
    Unsupported,
    #[error("core failed to serialize a preemptive state")]
    Serialize,
    #[error("core failed to load a preemptive state")]
    Unserialize,
    #[error("savestate size grew from {old} to {new} bytes")]
    StateSizeGrew { old: usize, new: usize },
}

pub struct PreemptEngine {
    frames: usize,
    slots: Vec<Vec<u8>>,
    state_size: usize,
    /// Slot replays start from; the oldest saved state.
    start: usize,
    states_saved: u64,
    shadow: InputShadow,
    in_replay: bool,
    replays: u64,
}

impl PreemptEngine {
    /// Allocate the ring for `frames` (clamped to `1..=MAX_FRAMES`).
    pub fn new(
        frames: u32,
        core: &mut dyn Core,
        ctx: &mut HostContext,
    ) -> Result<Self, PreemptError> {
        let frames = frames.clamp(1, MAX_FRAMES) as usize;
        let users = ctx.input.max_users();
        let state_size = {
            let mut cb = HostCallbacks::new(ctx, InputOverlay::Direct);
            core.serialize_size(&mut cb)
        };
        if state_size == 0 {
            return Err(PreemptError::Unsupported);
        }

        tracing::info!(frames, state_size, "Initializing preemptive frames");
        Ok(Self {
            frames,
            slots: vec![vec![0; state_size]; frames],
            state_size,
            start: 0,
            states_saved: 0,
            shadow: InputShadow::new(users),
            in_replay: false,
            replays: 0,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    pub fn states_saved(&self) -> u64 {
        self.states_saved
    }

    /// Number of replays run since init.
    pub fn replays(&self) -> u64 {
        self.replays
    }

    pub fn in_replay(&self) -> bool {
        self.in_replay
    }

    pub fn shadow_mut(&mut self) -> &mut InputShadow {
        &mut self.shadow
    }

    /// Invalidate the ring. Replays resume once `N` fresh states exist.
    pub fn reset_buffer(&mut self) {
        self.states_saved = 0;
        self.in_replay = false;
        tracing::debug!("Preemptive frames buffer reset");
    }

    fn next(&self, slot: usize) -> usize {
        (slot + 1) % self.frames
    }

    /// Poll, replay if needed, and save the state before this tick's frame.
    ///
    /// On error A/V is already restored; the caller should drop the engine.
    pub fn pre_frame(
        &mut self,
        core: &mut dyn Core,
        ctx: &mut HostContext,
    ) -> Result<(), PreemptError> {
        ctx.replay.in_preframe = true;
        let result = self.run_preframe(core, ctx);
        ctx.replay.resume_av();
        ctx.replay.in_preframe = false;
        result
    }

    fn run_preframe(
        &mut self,
        core: &mut dyn Core,
        ctx: &mut HostContext,
    ) -> Result<(), PreemptError> {
        let remap = ctx.settings.input.remap_binds_enable;
        ctx.input.poll_once(&mut *ctx.drivers.input, remap);
        if self.shadow.update(&ctx.input, &*ctx.drivers.input) {
            self.in_replay = true;
        }

        if self.in_replay && self.states_saved >= self.frames as u64 {
            ctx.replay.suspend_av();
            let replayed = self.replay(core, ctx);
            self.in_replay = false;
            ctx.replay.resume_av();
            replayed?;
            self.replays += 1;
        }

        self.save(core, ctx, self.start)?;
        self.start = self.next(self.start);
        self.states_saved += 1;
        Ok(())
    }

    fn replay(&mut self, core: &mut dyn Core, ctx: &mut HostContext) -> Result<(), PreemptError> {
        let start = self.start;
        let frames = self.frames;
        let Self { slots, shadow, .. } = self;
        let mut cb = HostCallbacks::new(ctx, InputOverlay::Preempt(shadow));

        if !core.unserialize(&mut cb, &slots[start]) {
            return Err(PreemptError::Unserialize);
        }
        core.run(&mut cb);

        let mut slot = (start + 1) % frames;
        while slot != start {
            if !core.serialize(&mut cb, &mut slots[slot]) {
                return Err(PreemptError::Serialize);
            }
            core.run(&mut cb);
            slot = (slot + 1) % frames;
        }
        Ok(())
    }

    fn save(
        &mut self,
        core: &mut dyn Core,
        ctx: &mut HostContext,
        slot: usize,
    ) -> Result<(), PreemptError> {
        let old = self.state_size;
        let Self { slots, shadow, .. } = self;
        let mut cb = HostCallbacks::new(ctx, InputOverlay::Preempt(shadow));
        if core.serialize(&mut cb, &mut slots[slot]) {
            return Ok(());
        }
        let new = core.serialize_size(&mut cb);
        if new > old {
            Err(PreemptError::StateSizeGrew { old, new })
        } else {
            Err(PreemptError::Serialize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::DummyCore;
    use crate::test_utils::{ScriptedInput, TestCore, test_context};
    use retrohost_shared::device::joypad;
    use retrohost_shared::{AvEnable, SavestateContext};

    /// Pre-frame then the real frame, as the frame loop does.
    fn tick(engine: &mut PreemptEngine, core: &mut TestCore, ctx: &mut HostContext) {
        ctx.input.begin_tick();
        engine.pre_frame(core, ctx).unwrap();
        let mut cb = HostCallbacks::new(ctx, InputOverlay::Preempt(engine.shadow_mut()));
        core.run(&mut cb);
    }

    #[test]
    fn test_unsupported_core_rejected() {
        let mut ctx = test_context(ScriptedInput::default());
        let mut core = DummyCore::new();
        assert_eq!(
            PreemptEngine::new(2, &mut core, &mut ctx).err(),
            Some(PreemptError::Unsupported)
        );
    }

    #[test]
    fn test_frames_clamped() {
        let mut ctx = test_context(ScriptedInput::default());
        let mut core = TestCore::new();
        assert_eq!(PreemptEngine::new(40, &mut core, &mut ctx).unwrap().frames(), 6);
        assert_eq!(PreemptEngine::new(0, &mut core, &mut ctx).unwrap().frames(), 1);
    }

    #[test]
    fn test_replay_from_state_n_frames_back() {
        let input = ScriptedInput::default();
        let mut ctx = test_context(input.clone());
        let mut core = TestCore::new();
        let probe = core.probe();
        let mut engine = PreemptEngine::new(2, &mut core, &mut ctx).unwrap();

        for _ in 0..10 {
            tick(&mut engine, &mut core, &mut ctx);
        }
        assert_eq!(engine.states_saved(), 10);
        assert_eq!(engine.replays(), 0);
        assert_eq!(probe.frame(), 10);

        input.handle().set_buttons(0, joypad::bit(joypad::B));
        probe.clear_log();
        tick(&mut engine, &mut core, &mut ctx);

        assert_eq!(engine.replays(), 1);
        // Saved at tick 9, before core frame 9 ran.
        assert_eq!(probe.unserialized(), vec![8]);
        let runs = probe.runs();
        assert_eq!(runs.len(), 3);
        for run in &runs[..2] {
            assert_eq!(run.input[0], joypad::bit(joypad::B));
            assert_eq!(run.av, AvEnable::PREEMPT_PREFRAME);
            assert_eq!(run.context, SavestateContext::RunaheadSameInstance);
        }
        assert_eq!(runs[2].av, AvEnable::VIDEO | AvEnable::AUDIO);
        assert_eq!(probe.frame(), 11);
        assert!(!engine.in_replay());
    }

    #[test]
    fn test_hidden_latency_matches_reference_run() {
        let input = ScriptedInput::default();
        let mut ctx = test_context(input.clone());
        let mut core = TestCore::new();
        let mut engine = PreemptEngine::new(3, &mut core, &mut ctx).unwrap();
        for _ in 0..8 {
            tick(&mut engine, &mut core, &mut ctx);
        }
        input.handle().set_buttons(0, joypad::bit(joypad::A));
        tick(&mut engine, &mut core, &mut ctx);

        // The same core fed the new input three frames earlier.
        let reference_input = ScriptedInput::default();
        let mut reference_ctx = test_context(reference_input.clone());
        let mut reference = TestCore::new();
        for frame in 1..=9 {
            if frame == 6 {
                reference_input
                    .handle()
                    .set_buttons(0, joypad::bit(joypad::A));
            }
            reference_ctx.input.begin_tick();
            let mut cb = HostCallbacks::new(&mut reference_ctx, InputOverlay::Direct);
            reference.run(&mut cb);
        }
        assert_eq!(core.probe().hash(), reference.probe().hash());
        assert_eq!(core.probe().frame(), reference.probe().frame());
    }

    #[test]
    fn test_reset_buffer_delays_replays() {
        let input = ScriptedInput::default();
        let mut ctx = test_context(input.clone());
        let mut core = TestCore::new();
        let mut engine = PreemptEngine::new(2, &mut core, &mut ctx).unwrap();
        for _ in 0..4 {
            tick(&mut engine, &mut core, &mut ctx);
        }
        engine.reset_buffer();

        input.handle().set_buttons(0, joypad::bit(joypad::Y));
        tick(&mut engine, &mut core, &mut ctx);
        assert_eq!(engine.replays(), 0);
        assert_eq!(engine.states_saved(), 1);
    }

    #[test]
    fn test_state_growth_reported() {
        let mut ctx = test_context(ScriptedInput::default());
        let mut core = TestCore::new();
        let mut engine = PreemptEngine::new(2, &mut core, &mut ctx).unwrap();
        tick(&mut engine, &mut core, &mut ctx);

        let old = engine.state_size();
        core.grow_state(16);
        ctx.input.begin_tick();
        assert_eq!(
            engine.pre_frame(&mut core, &mut ctx),
            Err(PreemptError::StateSizeGrew {
                old,
                new: old + 16
            })
        );
        assert!(!ctx.replay.in_preframe);
        assert_eq!(ctx.replay.av_enable(), AvEnable::VIDEO | AvEnable::AUDIO);
    }
}
