//! The host: owns the core, the replay engine and the shared context
//!
//! One [`Host::tick`] is one iteration of the frame loop. Embedders call it
//! from whatever outer loop they have (a headless loop, an event loop, a test)
//! and react to the returned [`TickResult`].

mod callbacks;
pub(crate) mod content;
mod context;
pub mod environment;
pub mod pacing;
mod runloop;
mod state_checks;

use std::path::PathBuf;

use thiserror::Error;

pub use callbacks::{HostCallbacks, InputOverlay};
pub use context::{
    ContentState, HostContext, LaunchOptions, MaskedSettings, NetplayRole, PatchOptions,
    RunloopState, SystemState,
};

use crate::command::{self, Command};
use crate::config::Settings;
use crate::drivers::Drivers;
use crate::plugin::{Core, DummyCore};
use crate::replay::ReplayEngine;

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    /// A frame ran.
    Running,
    /// No frame ran (paused, menu, idle); drop this tick's A/V.
    Waiting,
    /// The loop should stop; call [`Host::shutdown`].
    Quit,
}

/// Errors that stop the host from starting.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("core cannot start without content")]
    NoContent,
    #[error("failed to read content {path}: {source}")]
    ContentRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("core does not provide subsystem {0}")]
    UnknownSubsystem(String),
    #[error("core failed to load content")]
    ContentLoad,
    #[error("failed to initialize video driver")]
    Drivers,
}

pub struct Host {
    pub(crate) core: Box<dyn Core>,
    pub ctx: HostContext,
    pub(crate) engine: ReplayEngine,
    /// Core handed in by the embedder, used by the next `CoreInit`.
    pub(crate) staged_core: Option<Box<dyn Core>>,
    /// Next `CoreInit` loads the dummy core regardless of the configured path.
    pub(crate) force_dummy: bool,
}

impl Host {
    pub fn new(settings: Settings, drivers: Drivers, launch: LaunchOptions) -> Self {
        let mut ctx = HostContext::new(settings, drivers);
        ctx.launch = launch;
        Self {
            core: Box::new(DummyCore::new()),
            ctx,
            engine: ReplayEngine::None,
            staged_core: None,
            force_dummy: false,
        }
    }

    /// Use `core` instead of loading one from a path. Takes effect at the
    /// next core init.
    pub fn preload_core(&mut self, core: Box<dyn Core>) {
        self.staged_core = Some(core);
    }

    /// Load the core and content and bring every subsystem up.
    pub fn init(&mut self) -> Result<(), HostError> {
        command::lifecycle::init_core(self)?;
        if self.ctx.launch.start_in_menu && !self.ctx.runloop.menu_alive {
            self.command(Command::MenuToggle);
        }
        Ok(())
    }

    /// Dispatch `command`, then anything it deferred.
    pub fn command(&mut self, command: Command) -> bool {
        let ok = command::dispatch(self, command);
        self.drain_pending();
        ok
    }

    pub(crate) fn drain_pending(&mut self) {
        while let Some(command) = self.ctx.pending.pop_front() {
            command::dispatch(self, command);
        }
    }

    /// Run a core entry point against the callbacks of the active engine.
    pub(crate) fn with_core<R>(
        &mut self,
        f: impl FnOnce(&mut dyn Core, &mut HostCallbacks<'_>) -> R,
    ) -> R {
        let mut cb = self.engine.callbacks(&mut self.ctx);
        f(&mut *self.core, &mut cb)
    }

    pub fn core(&self) -> &dyn Core {
        &*self.core
    }

    pub fn core_mut(&mut self) -> &mut dyn Core {
        &mut *self.core
    }

    pub fn engine(&self) -> &ReplayEngine {
        &self.engine
    }

    pub fn frame_count(&self) -> u64 {
        self.ctx.runloop.frame_count
    }

    pub fn is_paused(&self) -> bool {
        self.ctx.runloop.paused
    }

    /// Content requested through `EXEC`, if the loop quit to restart with it.
    pub fn exec_content(&self) -> Option<&PathBuf> {
        if self.ctx.runloop.exec {
            self.ctx.launch.content.as_ref()
        } else {
            None
        }
    }

    /// Unload content and the core and bring the drivers down.
    pub fn shutdown(&mut self) {
        self.command(Command::CoreDeinit);
        tracing::info!(frames = self.ctx.runloop.frame_count, "Host shut down");
    }
}
