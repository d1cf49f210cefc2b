//! Button and axis remapping, persisted per core, content directory or content
//!
//! Remap files are flat TOML tables (see [`InputRemap::to_table`]). Lookup
//! goes from the narrowest scope to the widest; the first file found decides
//! the scope the remap is later saved back to.

use std::path::{Path, PathBuf};

use retrohost_shared::device::{analog, joypad};
use thiserror::Error;

use super::turbo::TurboMode;
use crate::config::{self, ConfigError};

/// Key suffixes of the remap file, joypad buttons then stick axes.
pub const REMAP_KEYS: [&str; joypad::COUNT + analog::AXES] = [
    "b", "y", "select", "start", "up", "down", "left", "right", "a", "x", "l", "r", "l2", "r2",
    "l3", "r3", "l_x", "l_y", "r_x", "r_y",
];

/// Key suffixes of the stick half-axes, `axis * 2` plus then minus.
pub const HALF_AXIS_KEYS: [&str; analog::AXES * 2] = [
    "l_x_plus", "l_x_minus", "l_y_plus", "l_y_minus", "r_x_plus", "r_x_minus", "r_y_plus",
    "r_y_minus",
];

/// Target id meaning "this button does nothing".
pub const UNMAPPED: u32 = 1024;

#[derive(Debug, Error)]
pub enum RemapError {
    #[error(transparent)]
    File(#[from] ConfigError),
    #[error("no remap file path for scope {0:?}")]
    NoPath(RemapScope),
    #[error("failed to remove shadowing remap {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Which persisted remap file the in-memory remap belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RemapScope {
    #[default]
    ThisCore,
    ThisContentDir,
    ThisContentOnly,
    Global,
}

/// What drives one half of a core-facing stick axis.
///
/// Persisted as a single id: buttons keep their joypad id, half-axes follow
/// the buttons in [`HALF_AXIS_KEYS`] order, and [`UNMAPPED`] reads nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfSource {
    /// Physical joypad button, full deflection while held.
    Button(u32),
    /// Physical half-axis, `axis * 2` for plus and `axis * 2 + 1` for minus.
    HalfAxis(u32),
    Unmapped,
}

impl HalfSource {
    pub fn from_id(id: u32) -> Option<Self> {
        let buttons = joypad::COUNT as u32;
        match id {
            _ if id < buttons => Some(Self::Button(id)),
            _ if id < buttons + HALF_AXIS_KEYS.len() as u32 => Some(Self::HalfAxis(id - buttons)),
            UNMAPPED => Some(Self::Unmapped),
            _ => None,
        }
    }

    pub fn id(self) -> u32 {
        match self {
            Self::Button(id) => id,
            Self::HalfAxis(half) => joypad::COUNT as u32 + half,
            Self::Unmapped => UNMAPPED,
        }
    }
}

/// Sources of the two halves of a core-facing stick axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSource {
    pub plus: HalfSource,
    pub minus: HalfSource,
}

impl AxisSource {
    /// Both halves of physical axis `axis`, numbered `index * 2 + id`.
    pub const fn native(axis: u32) -> Self {
        Self {
            plus: HalfSource::HalfAxis(axis * 2),
            minus: HalfSource::HalfAxis(axis * 2 + 1),
        }
    }

    /// The physical axis this reads unchanged, if any.
    pub fn whole_axis(&self) -> Option<u32> {
        match (self.plus, self.minus) {
            (HalfSource::HalfAxis(plus), HalfSource::HalfAxis(minus))
                if plus % 2 == 0 && minus == plus + 1 =>
            {
                Some(plus / 2)
            }
            _ => None,
        }
    }
}

/// Remap of one user port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRemap {
    pub device: u32,
    /// `buttons[physical] = core-facing id`; [`UNMAPPED`] drops the button.
    pub buttons: [u32; joypad::COUNT],
    /// Sources of each core-facing stick axis, numbered `index * 2 + id`.
    pub axes: [AxisSource; analog::AXES],
    pub turbo: TurboMode,
    pub turbo_period: u32,
}

impl PortRemap {
    pub fn identity(device: u32, turbo_period: u32) -> Self {
        Self {
            device,
            buttons: std::array::from_fn(|i| i as u32),
            axes: std::array::from_fn(|i| AxisSource::native(i as u32)),
            turbo: TurboMode::Unbound,
            turbo_period,
        }
    }

    /// Permute a raw joypad mask.
    pub fn apply_buttons(&self, raw: u16) -> u16 {
        let mut out = 0;
        for (physical, &target) in self.buttons.iter().enumerate() {
            if raw & (1 << physical) != 0 && (target as usize) < joypad::COUNT {
                out |= 1 << target;
            }
        }
        out
    }

    /// Sources of the core-facing stick axis, or `None` for other channels.
    pub fn axis_source(&self, index: u32, id: u32) -> Option<AxisSource> {
        analog::channel(index, id)
            .filter(|&axis| axis < analog::AXES)
            .map(|axis| self.axes[axis])
    }
}

/// Remap state of every port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRemap {
    pub ports: Vec<PortRemap>,
    pub scope: RemapScope,
}

impl InputRemap {
    /// Identity remap with per-port devices from `device`.
    pub fn defaults(users: usize, device: impl Fn(usize) -> u32, turbo_period: u32) -> Self {
        Self {
            ports: (0..users)
                .map(|port| PortRemap::identity(device(port), turbo_period))
                .collect(),
            scope: RemapScope::default(),
        }
    }

    pub fn port(&self, port: usize) -> Option<&PortRemap> {
        self.ports.get(port)
    }

    /// Serialize, omitting every value equal to `defaults`.
    pub fn to_table(&self, defaults: &InputRemap) -> toml::Table {
        let mut table = toml::Table::new();
        for (n, (port, base)) in self.ports.iter().zip(&defaults.ports).enumerate() {
            let player = n + 1;
            let mut set = |key: &str, value: u32| {
                table.insert(
                    format!("input_player{player}_{key}"),
                    toml::Value::Integer(i64::from(value)),
                );
            };
            for ((key, value), base_value) in REMAP_KEYS.iter().zip(&port.buttons).zip(&base.buttons)
            {
                if value != base_value {
                    set(*key, *value);
                }
            }
            for (axis, (source, base_source)) in port.axes.iter().zip(&base.axes).enumerate() {
                if source == base_source {
                    continue;
                }
                // A plain axis swap keeps the short form.
                if let Some(physical) = source.whole_axis() {
                    set(REMAP_KEYS[joypad::COUNT + axis], physical);
                    continue;
                }
                let halves = [
                    (source.plus, base_source.plus, HALF_AXIS_KEYS[axis * 2]),
                    (source.minus, base_source.minus, HALF_AXIS_KEYS[axis * 2 + 1]),
                ];
                for (half, base_half, key) in halves {
                    if half != base_half {
                        set(key, half.id());
                    }
                }
            }
            if port.device != base.device {
                table.insert(
                    format!("input_libretro_device_p{player}"),
                    toml::Value::Integer(i64::from(port.device)),
                );
            }
            if port.turbo != base.turbo {
                table.insert(
                    format!("input_player{player}_turbo_id"),
                    toml::Value::Integer(port.turbo.to_raw()),
                );
            }
            if port.turbo_period != base.turbo_period {
                table.insert(
                    format!("input_player{player}_turbo_period"),
                    toml::Value::Integer(i64::from(port.turbo_period)),
                );
            }
        }
        table
    }

    /// Apply a table on top of `defaults`. Out-of-range values are ignored.
    pub fn from_table(table: &toml::Table, defaults: &InputRemap, scope: RemapScope) -> Self {
        let int = |key: String| table.get(&key).and_then(toml::Value::as_integer);
        let mut remap = defaults.clone();
        remap.scope = scope;
        for (n, port) in remap.ports.iter_mut().enumerate() {
            let player = n + 1;
            for (i, key) in REMAP_KEYS.iter().enumerate() {
                let Some(value) = int(format!("input_player{player}_{key}")) else {
                    continue;
                };
                let Ok(value) = u32::try_from(value) else {
                    continue;
                };
                if i < joypad::COUNT {
                    port.buttons[i] = value;
                } else if (value as usize) < analog::AXES {
                    port.axes[i - joypad::COUNT] = AxisSource::native(value);
                }
            }
            // Half-axis keys refine whatever the whole-axis keys set.
            for (i, key) in HALF_AXIS_KEYS.iter().enumerate() {
                let Some(half) = int(format!("input_player{player}_{key}"))
                    .and_then(|v| u32::try_from(v).ok())
                    .and_then(HalfSource::from_id)
                else {
                    continue;
                };
                let source = &mut port.axes[i / 2];
                if i % 2 == 0 {
                    source.plus = half;
                } else {
                    source.minus = half;
                }
            }
            if let Some(device) = int(format!("input_libretro_device_p{player}"))
                .and_then(|d| u32::try_from(d).ok())
            {
                port.device = device;
            }
            if let Some(turbo) =
                int(format!("input_player{player}_turbo_id")).and_then(TurboMode::from_raw)
            {
                port.turbo = turbo;
            }
            if let Some(period) = int(format!("input_player{player}_turbo_period"))
                .and_then(|p| u32::try_from(p).ok())
            {
                port.turbo_period = period;
            }
        }
        remap
    }

    /// Find the narrowest existing remap file and load it.
    pub fn load(paths: &RemapPaths, defaults: &InputRemap) -> Result<Option<Self>, RemapError> {
        for scope in [
            RemapScope::ThisContentOnly,
            RemapScope::ThisContentDir,
            RemapScope::ThisCore,
        ] {
            let Some(path) = paths.for_scope(scope) else {
                continue;
            };
            if let Some(table) = config::read_table(path)? {
                tracing::info!(path = %path.display(), ?scope, "Loaded remap file");
                return Ok(Some(Self::from_table(&table, defaults, scope)));
            }
        }
        Ok(None)
    }

    /// Save to the file of the current scope and remove narrower files that
    /// would shadow it.
    pub fn save(&self, paths: &RemapPaths, defaults: &InputRemap) -> Result<PathBuf, RemapError> {
        let path = paths
            .for_scope(self.scope)
            .ok_or(RemapError::NoPath(self.scope))?;
        config::write_table(path, &self.to_table(defaults))?;

        let narrower: &[RemapScope] = match self.scope {
            RemapScope::ThisCore => &[RemapScope::ThisContentDir, RemapScope::ThisContentOnly],
            RemapScope::ThisContentDir => &[RemapScope::ThisContentOnly],
            RemapScope::ThisContentOnly | RemapScope::Global => &[],
        };
        for scope in narrower {
            let Some(shadow) = paths.for_scope(*scope) else {
                continue;
            };
            match std::fs::remove_file(shadow) {
                Ok(()) => tracing::info!(path = %shadow.display(), "Removed shadowing remap"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(RemapError::Remove {
                        path: shadow.to_path_buf(),
                        source,
                    });
                }
            }
        }
        Ok(path.to_path_buf())
    }
}

/// Remap file locations for one core and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapPaths {
    core: PathBuf,
    content_dir: Option<PathBuf>,
    content: Option<PathBuf>,
}

impl RemapPaths {
    pub fn new(remap_dir: &Path, core_name: &str, content: Option<&Path>) -> Self {
        let core_dir = remap_dir.join(crate::core_options::sanitize_file_name(core_name));
        let content_dir = content.map(|c| {
            let dir_name = c
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "root".to_string());
            core_dir.join(format!("{dir_name}.rmp"))
        });
        let content_file = content.and_then(Path::file_stem).map(|stem| {
            core_dir.join(format!("{}.rmp", stem.to_string_lossy()))
        });
        Self {
            core: core_dir.join(format!(
                "{}.rmp",
                crate::core_options::sanitize_file_name(core_name)
            )),
            content_dir,
            content: content_file,
        }
    }

    pub fn for_scope(&self, scope: RemapScope) -> Option<&Path> {
        match scope {
            RemapScope::ThisCore => Some(&self.core),
            RemapScope::ThisContentDir => self.content_dir.as_deref(),
            RemapScope::ThisContentOnly => self.content.as_deref(),
            RemapScope::Global => None,
        }
    }
}
