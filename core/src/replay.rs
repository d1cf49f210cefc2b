//! Savestate-driven replay engines
//!
//! Preemptive frames and netplay both keep a ring of savestates and re-run
//! frames with suspended audio and video. At most one engine is active at a
//! time; [`ReplayEngine`] owns it and decides which input overlay the core's
//! callbacks read through.
//!
//! The flags the environment callback consults (`GET_AUDIO_VIDEO_ENABLE`,
//! `GET_SAVESTATE_CONTEXT`) live in [`ReplayFlags`] on the host context, so
//! they can be answered without reaching into an engine.

pub mod preempt;
pub mod shadow;

pub use preempt::{MAX_FRAMES, PreemptEngine, PreemptError};
pub use shadow::InputShadow;

use retrohost_shared::{AvEnable, SavestateContext};

use crate::host::{HostCallbacks, HostContext, InputOverlay};
use crate::netplay::NetplayEngine;

/// Engine visibility flags shared with the environment callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayFlags {
    /// Preemptive frames is replaying hidden frames.
    pub in_preframe: bool,
    /// Netplay is connected; states may be exchanged with the peer.
    pub rollback_states: bool,
    pub video_suspended: bool,
    pub audio_suspended: bool,
    /// Cores may take same-instance fast paths for preemptive states.
    pub fast_savestates: bool,
}

impl ReplayFlags {
    pub fn suspend_av(&mut self) {
        self.video_suspended = true;
        self.audio_suspended = true;
    }

    pub fn resume_av(&mut self) {
        self.video_suspended = false;
        self.audio_suspended = false;
    }

    /// Answer to `GET_AUDIO_VIDEO_ENABLE`.
    pub fn av_enable(&self) -> AvEnable {
        let mut enable = AvEnable::empty();
        if !self.video_suspended {
            enable |= AvEnable::VIDEO;
        }
        if !self.audio_suspended {
            enable |= AvEnable::AUDIO;
        }
        if self.in_preframe {
            enable |= AvEnable::PREEMPT_PREFRAME;
        }
        enable
    }

    /// Answer to `GET_SAVESTATE_CONTEXT`.
    pub fn savestate_context(&self) -> SavestateContext {
        if self.in_preframe {
            if self.fast_savestates {
                SavestateContext::RunaheadSameInstance
            } else {
                SavestateContext::RunaheadSameBinary
            }
        } else if self.rollback_states {
            SavestateContext::RollbackNetplay
        } else {
            SavestateContext::Normal
        }
    }
}

/// The active replay engine, if any.
#[derive(Default)]
pub enum ReplayEngine {
    #[default]
    None,
    Preempt(Box<PreemptEngine>),
    Netplay(Box<NetplayEngine>),
}

impl ReplayEngine {
    /// Callbacks the core runs against outside of an engine's own replays.
    pub fn callbacks<'a>(&'a mut self, ctx: &'a mut HostContext) -> HostCallbacks<'a> {
        let overlay = match self {
            Self::None => InputOverlay::Direct,
            Self::Preempt(engine) => InputOverlay::Preempt(engine.shadow_mut()),
            Self::Netplay(engine) => InputOverlay::Netplay(engine.frame_inputs()),
        };
        HostCallbacks::new(ctx, overlay)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn is_preempt(&self) -> bool {
        matches!(self, Self::Preempt(_))
    }

    pub fn is_netplay(&self) -> bool {
        matches!(self, Self::Netplay(_))
    }

    pub fn preempt(&self) -> Option<&PreemptEngine> {
        match self {
            Self::Preempt(engine) => Some(engine),
            _ => None,
        }
    }

    pub fn preempt_mut(&mut self) -> Option<&mut PreemptEngine> {
        match self {
            Self::Preempt(engine) => Some(engine),
            _ => None,
        }
    }

    pub fn netplay(&self) -> Option<&NetplayEngine> {
        match self {
            Self::Netplay(engine) => Some(engine),
            _ => None,
        }
    }

    pub fn netplay_mut(&mut self) -> Option<&mut NetplayEngine> {
        match self {
            Self::Netplay(engine) => Some(engine),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Preempt(_) => "preempt",
            Self::Netplay(_) => "netplay",
        }
    }
}
