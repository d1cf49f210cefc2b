//! Configuration management (`retrohost.toml`)
//!
//! Settings are stored in TOML in the platform-specific config directory.
//! `--config` replaces the default file and `--appendconfig` layers another
//! file on top of it, key by key.

use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use retrohost_shared::{Key, Language};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading or writing the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Frontend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub video: VideoSettings,
    #[serde(default)]
    pub audio: AudioSettings,
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub runloop: RunloopSettings,
    #[serde(default)]
    pub menu: MenuSettings,
    #[serde(default)]
    pub netplay: NetplaySettings,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub user: UserSettings,
    #[serde(default)]
    pub core: CoreSettings,

    /// Set when a setting is changed at runtime; only touched settings are
    /// written back on exit.
    #[serde(skip)]
    pub touched: bool,
}

/// Video settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Milliseconds to sleep before running the core each frame (default: 0)
    #[serde(default)]
    pub frame_delay: u32,
    /// Display refresh rate used for pacing when not following the core (default: 60.0)
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate: f64,
    /// Let cores rotate the display (default: true)
    #[serde(default = "default_true")]
    pub allow_rotate: bool,
    /// Insert a black frame between frames (default: false)
    #[serde(default)]
    pub black_frame_insertion: bool,
    /// Answer `GET_OVERSCAN` with "crop" (default: true)
    #[serde(default = "default_true")]
    pub crop_overscan: bool,
    /// Run fullscreen (default: false)
    #[serde(default)]
    pub fullscreen: bool,
}

/// Audio settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Output audio at all (default: true)
    #[serde(default = "default_true")]
    pub enable: bool,
    /// Start muted (default: false)
    #[serde(default)]
    pub mute: bool,
}

/// Input settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSettings {
    /// Number of user ports exposed to the core (default: 2)
    #[serde(default = "default_max_users")]
    pub max_users: usize,
    /// Key that must be held for hotkeys to fire; unset means hotkeys are always live
    #[serde(default)]
    pub enable_hotkey: Option<Key>,
    /// Hotkey name (e.g. `fast_forward`) to keyboard key
    #[serde(default = "default_hotkey_binds")]
    pub hotkey_binds: HashMap<String, Key>,
    /// Apply button/axis remapping (default: true)
    #[serde(default = "default_true")]
    pub remap_binds_enable: bool,
    /// Load remap files automatically at content load (default: true)
    #[serde(default = "default_true")]
    pub auto_remaps_enable: bool,
    /// Directory holding per-core remap files
    #[serde(default)]
    pub remap_directory: Option<PathBuf>,
    /// Device class requested per port, by port index (default: joypad)
    #[serde(default)]
    pub libretro_device: Vec<u32>,
    /// Default turbo period in frames (default: 6)
    #[serde(default = "default_turbo_period")]
    pub turbo_period: u32,
    /// Joypad button name (remap key names) to keyboard keys, for keyboard ports
    #[serde(default)]
    pub joykbd_binds: HashMap<String, Vec<Key>>,
    /// Key held to cancel a blocking wait, e.g. a stalled netplay peer (default: backspace)
    #[serde(default = "default_menu_cancel")]
    pub menu_cancel: Key,
}

/// Frame loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunloopSettings {
    /// Pause when the window loses focus (default: true)
    #[serde(default = "default_true")]
    pub pause_nonactive: bool,
    /// Pace to the core's fps instead of `video.refresh_rate` (default: true)
    #[serde(default = "default_true")]
    pub throttle_using_core_fps: bool,
    /// Pace at all when not fast-forwarding (default: true)
    #[serde(default = "default_true")]
    pub core_throttle_enable: bool,
    /// Fast-forward speed multiplier; `<= 1.0` means unthrottled (default: 0.0)
    #[serde(default)]
    pub fastforward_ratio: f32,
    /// Slow-motion divisor (default: 3.0)
    #[serde(default = "default_slowmotion_ratio")]
    pub slowmotion_ratio: f32,
    /// Keep a rewind history (default: false)
    #[serde(default)]
    pub rewind_enable: bool,
    /// Rewind history size in bytes (default: 20 MiB)
    #[serde(default = "default_rewind_buffer_size")]
    pub rewind_buffer_size: usize,
    /// Ticks between rewind pushes/pops (default: 1)
    #[serde(default = "default_one")]
    pub rewind_granularity: u32,
    /// Seconds between SRAM autosaves; 0 disables (default: 0)
    #[serde(default)]
    pub autosave_interval: u32,
    /// Pick the next free slot when saving (default: false)
    #[serde(default)]
    pub savestate_auto_index: bool,
    /// Write the `.auto` state on content unload (default: false)
    #[serde(default)]
    pub savestate_auto_save: bool,
    /// Load the `.auto` state on content load (default: false)
    #[serde(default)]
    pub savestate_auto_load: bool,
    /// RZIP-compress written savestates (default: true)
    #[serde(default = "default_true")]
    pub savestate_compression: bool,
    /// Active savestate slot (default: 0)
    #[serde(default)]
    pub state_slot: i32,
    /// Load the dummy core instead of quitting when a core shuts down (default: false)
    #[serde(default)]
    pub load_dummy_on_core_shutdown: bool,
    /// Frames of latency hidden by preemptive frames; 0 disables (default: 0)
    #[serde(default)]
    pub preempt_frames: u32,
    /// Let the core take same-instance fast paths during preemptive replays (default: true)
    #[serde(default = "default_true")]
    pub preempt_fast_savestates: bool,
}

/// Menu settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuSettings {
    /// Do not run the core while the menu is open (default: true)
    #[serde(default = "default_true")]
    pub pause_libretro: bool,
}

/// Netplay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetplaySettings {
    /// Nickname sent to the peer (default: "Anonymous")
    #[serde(default = "default_nick")]
    pub nick: String,
    /// Host resends its state when periodic CRCs differ (default: true)
    #[serde(default = "default_true")]
    pub periodic_resync: bool,
    /// Frames the local side may run ahead of confirmed peer input (default: 2)
    #[serde(default = "default_delay_frames")]
    pub delay_frames: u32,
    /// TCP/UDP port (default: 55435)
    #[serde(default = "default_netplay_port")]
    pub port: u16,
    /// Frames between state CRC comparisons (default: 60)
    #[serde(default = "default_sync_period")]
    pub sync_period: u32,
}

/// Directories handed to the core and used for saves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PathSettings {
    #[serde(default)]
    pub system_directory: Option<PathBuf>,
    #[serde(default)]
    pub save_directory: Option<PathBuf>,
    #[serde(default)]
    pub savestate_directory: Option<PathBuf>,
    #[serde(default)]
    pub core_assets_directory: Option<PathBuf>,
    #[serde(default)]
    pub cheat_directory: Option<PathBuf>,
    /// Directory for per-core option files (default: `<config dir>/core-options`)
    #[serde(default)]
    pub core_options_directory: Option<PathBuf>,
}

/// Identity reported to cores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserSettings {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language: Language,
}

/// Core selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CoreSettings {
    /// Shared library to load when none is given on the command line
    #[serde(default)]
    pub libretro_path: Option<PathBuf>,
    /// Group core options by category when the core provides them (default: false)
    #[serde(default)]
    pub option_categories: bool,
}

fn default_true() -> bool {
    true
}
fn default_one() -> u32 {
    1
}
fn default_refresh_rate() -> f64 {
    60.0
}
fn default_max_users() -> usize {
    2
}
fn default_turbo_period() -> u32 {
    6
}
fn default_slowmotion_ratio() -> f32 {
    3.0
}
fn default_rewind_buffer_size() -> usize {
    20 << 20
}
fn default_nick() -> String {
    "Anonymous".to_string()
}
fn default_delay_frames() -> u32 {
    2
}
fn default_netplay_port() -> u16 {
    55435
}
fn default_sync_period() -> u32 {
    60
}

fn default_menu_cancel() -> Key {
    Key::BACKSPACE
}

fn default_hotkey_binds() -> HashMap<String, Key> {
    [
        ("fast_forward", Key::SPACE),
        ("fast_forward_hold", Key::ascii(b'l')),
        ("load_state", Key::function(4)),
        ("save_state", Key::function(2)),
        ("fullscreen_toggle", Key::ascii(b'f')),
        ("quit", Key::ESCAPE),
        ("state_slot_plus", Key::function(7)),
        ("state_slot_minus", Key::function(6)),
        ("rewind", Key::ascii(b'r')),
        ("pause_toggle", Key::ascii(b'p')),
        ("frameadvance", Key::ascii(b'k')),
        ("reset", Key::ascii(b'h')),
        ("cheat_index_plus", Key::ascii(b'y')),
        ("cheat_index_minus", Key::ascii(b't')),
        ("cheat_toggle", Key::ascii(b'u')),
        ("screenshot", Key::function(8)),
        ("mute", Key::function(9)),
        ("netplay_flip", Key::ascii(b'i')),
        ("slowmotion", Key::ascii(b'e')),
        ("grab_mouse_toggle", Key::function(11)),
        ("menu_toggle", Key::function(1)),
    ]
    .into_iter()
    .map(|(name, key)| (name.to_string(), key))
    .collect()
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            frame_delay: 0,
            refresh_rate: default_refresh_rate(),
            allow_rotate: true,
            black_frame_insertion: false,
            crop_overscan: true,
            fullscreen: false,
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enable: true,
            mute: false,
        }
    }
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            max_users: default_max_users(),
            enable_hotkey: None,
            hotkey_binds: default_hotkey_binds(),
            remap_binds_enable: true,
            auto_remaps_enable: true,
            remap_directory: None,
            libretro_device: Vec::new(),
            turbo_period: default_turbo_period(),
            joykbd_binds: HashMap::new(),
            menu_cancel: default_menu_cancel(),
        }
    }
}

impl Default for RunloopSettings {
    fn default() -> Self {
        Self {
            pause_nonactive: true,
            throttle_using_core_fps: true,
            core_throttle_enable: true,
            fastforward_ratio: 0.0,
            slowmotion_ratio: default_slowmotion_ratio(),
            rewind_enable: false,
            rewind_buffer_size: default_rewind_buffer_size(),
            rewind_granularity: 1,
            autosave_interval: 0,
            savestate_auto_index: false,
            savestate_auto_save: false,
            savestate_auto_load: false,
            savestate_compression: true,
            state_slot: 0,
            load_dummy_on_core_shutdown: false,
            preempt_frames: 0,
            preempt_fast_savestates: true,
        }
    }
}

impl Default for MenuSettings {
    fn default() -> Self {
        Self {
            pause_libretro: true,
        }
    }
}

impl Default for NetplaySettings {
    fn default() -> Self {
        Self {
            nick: default_nick(),
            periodic_resync: true,
            delay_frames: default_delay_frames(),
            port: default_netplay_port(),
            sync_period: default_sync_period(),
        }
    }
}

/// Returns the platform-specific configuration directory.
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "retrohost", "retrohost")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

impl Settings {
    /// Default settings file, `<config dir>/retrohost.toml`.
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("retrohost.toml"))
    }

    /// Load settings from `path`.
    ///
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_table(read_table(path)?.unwrap_or_default(), path)
    }

    /// Load `base` and layer each of `appended` on top, key by key.
    pub fn load_layered(base: &Path, appended: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut table = read_table(base)?.unwrap_or_default();
        for path in appended {
            if let Some(overlay) = read_table(path)? {
                merge_tables(&mut table, overlay);
            }
        }
        Self::from_table(table, base)
    }

    fn from_table(table: toml::Table, path: &Path) -> Result<Self, ConfigError> {
        table.try_into().map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        write_string(path, &toml::to_string_pretty(self)?)
    }

    /// Device requested for `port`, defaulting to the joypad.
    pub fn libretro_device(&self, port: usize) -> u32 {
        self.input
            .libretro_device
            .get(port)
            .copied()
            .unwrap_or(retrohost_shared::device::JOYPAD)
    }

    /// Directory for per-core option files.
    pub fn core_options_dir(&self) -> Option<PathBuf> {
        self.paths
            .core_options_directory
            .clone()
            .or_else(|| config_dir().map(|dir| dir.join("core-options")))
    }
}

/// Read a TOML file as a table; `None` if it does not exist.
pub(crate) fn read_table(path: &Path) -> Result<Option<toml::Table>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    content
        .parse::<toml::Table>()
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Write a flat key/value table, creating parent directories.
pub(crate) fn write_table(path: &Path, table: &toml::Table) -> Result<(), ConfigError> {
    write_string(path, &toml::to_string(table)?)
}

fn write_string(path: &Path, content: &str) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, content).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge_tables(existing, nested)
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.input.max_users, 2);
        assert_eq!(settings.netplay.port, 55435);
        assert_eq!(settings.netplay.nick, "Anonymous");
        assert!(settings.menu.pause_libretro);
        assert_eq!(settings.runloop.rewind_granularity, 1);
        assert_eq!(
            settings.input.hotkey_binds.get("quit"),
            Some(&Key::ESCAPE)
        );
    }

    #[test]
    fn test_settings_deserialize_empty() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let toml_str = r#"
[runloop]
preempt_frames = 2

[input]
enable_hotkey = "rctrl"
"#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.runloop.preempt_frames, 2);
        assert!(settings.runloop.core_throttle_enable);
        assert_eq!(settings.input.enable_hotkey, Some(Key::RCTRL));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[video\nframe_delay = ").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_appendconfig_overrides_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.toml");
        let extra = dir.path().join("extra.toml");
        std::fs::write(&base, "[video]\nframe_delay = 4\nrefresh_rate = 50.0\n").unwrap();
        std::fs::write(&extra, "[video]\nframe_delay = 8\n").unwrap();

        let settings = Settings::load_layered(&base, &[extra]).unwrap();
        assert_eq!(settings.video.frame_delay, 8);
        assert_eq!(settings.video.refresh_rate, 50.0);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/retrohost.toml");
        let mut settings = Settings::default();
        settings.runloop.state_slot = 3;
        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.runloop.state_slot, 3);
    }
}
