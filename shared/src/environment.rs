//! Environment request codes and the small enums they carry.
//!
//! Codes flagged [`EXPERIMENTAL`] are still part of the stable ABI surface
//! cores use today; the flag only marks their history.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::UnknownValue;

/// Bit OR'ed into codes introduced as experimental.
pub const EXPERIMENTAL: u32 = 0x10000;
/// Bit reserved for frontend-private codes.
pub const PRIVATE: u32 = 0x20000;

pub const SET_ROTATION: u32 = 1;
pub const GET_OVERSCAN: u32 = 2;
pub const GET_CAN_DUPE: u32 = 3;
pub const SET_MESSAGE: u32 = 6;
pub const SHUTDOWN: u32 = 7;
pub const SET_PERFORMANCE_LEVEL: u32 = 8;
pub const GET_SYSTEM_DIRECTORY: u32 = 9;
pub const SET_PIXEL_FORMAT: u32 = 10;
pub const SET_INPUT_DESCRIPTORS: u32 = 11;
pub const SET_KEYBOARD_CALLBACK: u32 = 12;
pub const SET_DISK_CONTROL_INTERFACE: u32 = 13;
pub const SET_HW_RENDER: u32 = 14;
pub const GET_VARIABLE: u32 = 15;
pub const SET_VARIABLES: u32 = 16;
pub const GET_VARIABLE_UPDATE: u32 = 17;
pub const SET_SUPPORT_NO_GAME: u32 = 18;
pub const GET_LIBRETRO_PATH: u32 = 19;
pub const SET_FRAME_TIME_CALLBACK: u32 = 21;
pub const SET_AUDIO_CALLBACK: u32 = 22;
pub const GET_RUMBLE_INTERFACE: u32 = 23;
pub const GET_INPUT_DEVICE_CAPABILITIES: u32 = 24;
pub const GET_SENSOR_INTERFACE: u32 = 25 | EXPERIMENTAL;
pub const GET_LOG_INTERFACE: u32 = 27;
pub const GET_PERF_INTERFACE: u32 = 28;
pub const GET_CORE_ASSETS_DIRECTORY: u32 = 30;
pub const GET_SAVE_DIRECTORY: u32 = 31;
pub const SET_SYSTEM_AV_INFO: u32 = 32;
pub const SET_SUBSYSTEM_INFO: u32 = 34;
pub const SET_CONTROLLER_INFO: u32 = 35;
pub const SET_GEOMETRY: u32 = 37;
pub const GET_USERNAME: u32 = 38;
pub const GET_LANGUAGE: u32 = 39;
pub const SET_HW_SHARED_CONTEXT: u32 = 44 | EXPERIMENTAL;
pub const GET_LED_INTERFACE: u32 = 46 | EXPERIMENTAL;
pub const GET_AUDIO_VIDEO_ENABLE: u32 = 47 | EXPERIMENTAL;
pub const GET_FASTFORWARDING: u32 = 49 | EXPERIMENTAL;
pub const GET_TARGET_REFRESH_RATE: u32 = 50 | EXPERIMENTAL;
pub const GET_INPUT_BITMASKS: u32 = 51 | EXPERIMENTAL;
pub const GET_CORE_OPTIONS_VERSION: u32 = 52;
pub const SET_CORE_OPTIONS: u32 = 53;
pub const SET_CORE_OPTIONS_INTL: u32 = 54;
pub const SET_CORE_OPTIONS_DISPLAY: u32 = 55;
pub const SET_MESSAGE_EXT: u32 = 60;
pub const SET_CORE_OPTIONS_V2: u32 = 67;
pub const SET_CORE_OPTIONS_V2_INTL: u32 = 68;
pub const SET_CORE_OPTIONS_UPDATE_DISPLAY_CALLBACK: u32 = 69;
pub const GET_SAVESTATE_CONTEXT: u32 = 72 | EXPERIMENTAL;
pub const GET_CLEAR_ALL_THREAD_WAITS_CB: u32 = 3 | EXPERIMENTAL;

/// Frontend-private: restart with the given content path.
pub const EXEC: u32 = PRIVATE | 1;
/// Frontend-private: restart with the given content path and leave the menu.
pub const EXEC_ESCAPE: u32 = PRIVATE | 2;

/// Highest core options API version the host understands.
pub const CORE_OPTIONS_VERSION: u32 = 2;

/// What kind of savestate a core is being asked to produce or consume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum SavestateContext {
    /// A state the user may keep on disk.
    #[default]
    Normal = 0,
    /// Throwaway state reused by the same process and core instance.
    RunaheadSameInstance = 1,
    /// Throwaway state loaded into another instance of the same binary.
    RunaheadSameBinary = 2,
    /// State exchanged with a remote peer running the same binary.
    RollbackNetplay = 3,
}

bitflags! {
    /// Result of `GET_AUDIO_VIDEO_ENABLE`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AvEnable: u32 {
        const VIDEO = 1;
        const AUDIO = 2;
        /// Frame is a hidden preemptive-frames replay.
        const PREEMPT_PREFRAME = 4;
    }
}

/// Severity levels of the core log interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Warn,
            _ => Self::Error,
        }
    }
}

/// User interface languages a core may be told about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum Language {
    #[default]
    English = 0,
    Japanese = 1,
    French = 2,
    Spanish = 3,
    German = 4,
    Italian = 5,
}

impl Language {
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

/// Accelerated rendering contexts a core may request through `SET_HW_RENDER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HwContextType {
    None,
    OpenGl,
    OpenGlEs2,
    OpenGlCore,
    OpenGlEs3,
    OpenGlEsVersion,
    Vulkan,
}

impl HwContextType {
    pub fn from_raw(raw: u32) -> Result<Self, UnknownValue> {
        match raw {
            0 => Ok(Self::None),
            1 => Ok(Self::OpenGl),
            2 => Ok(Self::OpenGlEs2),
            3 => Ok(Self::OpenGlCore),
            4 => Ok(Self::OpenGlEs3),
            5 => Ok(Self::OpenGlEsVersion),
            6 => Ok(Self::Vulkan),
            value => Err(UnknownValue {
                kind: "hw context",
                value,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experimental_codes_are_distinct() {
        assert_ne!(GET_CLEAR_ALL_THREAD_WAITS_CB, GET_CAN_DUPE);
        assert_eq!(GET_CLEAR_ALL_THREAD_WAITS_CB & !EXPERIMENTAL, GET_CAN_DUPE);
        assert_ne!(EXEC, EXEC_ESCAPE);
        assert_eq!(EXEC & PRIVATE, PRIVATE);
    }

    #[test]
    fn test_av_enable_bits() {
        let preframe = AvEnable::PREEMPT_PREFRAME;
        assert_eq!(preframe.bits(), 4);
        assert_eq!((AvEnable::VIDEO | AvEnable::AUDIO).bits(), 3);
    }

    #[test]
    fn test_log_level_saturates() {
        assert_eq!(LogLevel::from_raw(0), LogLevel::Debug);
        assert_eq!(LogLevel::from_raw(42), LogLevel::Error);
    }
}
