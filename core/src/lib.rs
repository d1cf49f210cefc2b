//! Retrohost Core - frame loop and plugin host for libretro-style cores
//!
//! This crate loads an emulator core, feeds it input, collects its audio and
//! video, and keeps everything around it (savestates, save RAM, cheats,
//! options, netplay) in step with the frame loop.
//!
//! # Architecture
//!
//! - [`Host`] - owns the core and runs one frame per [`Host::tick`]
//! - [`Core`] - capability set of a loaded core ([`DynamicCore`], [`DummyCore`])
//! - [`Command`] - every side effect the frontend can request
//! - [`ReplayEngine`] - preemptive frames or netplay, both built on savestates
//! - [`InputLayer`] - polling, remaps, turbo and hotkeys

pub mod autosave;
pub mod cheats;
pub mod command;
pub mod config;
pub mod core_options;
pub mod drivers;
pub mod host;
pub mod input;
#[cfg(test)]
mod integration;
pub mod message_queue;
pub mod netplay;
pub mod plugin;
pub mod replay;
pub mod savefile;
pub mod savestate;
pub mod screenshot;
#[cfg(test)]
pub mod test_utils;

pub use command::Command;
pub use config::{ConfigError, Settings};
pub use drivers::{AudioDriver, Drivers, MenuDriver, VideoDriver};
pub use host::{Host, HostContext, HostError, LaunchOptions, NetplayRole, TickResult};
pub use input::{InputDriver, InputLayer};
pub use message_queue::MessageQueue;
pub use netplay::{NetplayEngine, NetplayError};
pub use plugin::{Core, CoreCallbacks, CoreLoadError, DummyCore, DynamicCore};
pub use replay::{PreemptEngine, ReplayEngine};
pub use savefile::SramMode;
