//! Shared types for the retrohost frontend.
//!
//! Everything in this crate mirrors values defined by the core plugin ABI:
//! device and button identifiers, memory region ids, environment request
//! codes, A/V descriptions and keyboard key codes. Nothing here performs I/O,
//! so both the host and test harnesses can depend on it freely.

pub mod av;
pub mod device;
pub mod environment;
pub mod keyboard;

pub use av::{
    GameGeometry, PixelFormat, Region, Rotation, SystemAvInfo, SystemInfo, SystemTiming,
};
pub use environment::{AvEnable, HwContextType, Language, LogLevel, SavestateContext};
pub use keyboard::{Key, KeyModifiers};

/// Core plugin ABI version this frontend implements.
pub const API_VERSION: u32 = 1;

/// Maximum number of user ports the frontend tracks.
pub const MAX_USERS: usize = 16;

/// Error returned when a raw ABI value does not name a known variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value {value}")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: u32,
}
