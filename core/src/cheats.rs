//! Cheat table
//!
//! Cheat files are flat key/value tables:
//!
//! ```toml
//! cheats = 2
//! cheat0_desc = "Infinite lives"
//! cheat0_code = "00C-1F1-4C2"
//! cheat0_enable = true
//! ```
//!
//! Codes are opaque to the host; the core parses them on `cheat_set`.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{self, ConfigError};

#[derive(Debug, Error)]
pub enum CheatError {
    #[error(transparent)]
    File(#[from] ConfigError),
    #[error("cheat file {path} has no `cheats` count")]
    MissingCount { path: PathBuf },
    #[error("cheat file {path} is missing cheat{index}_code")]
    MissingCode { path: PathBuf, index: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cheat {
    pub desc: String,
    pub code: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CheatManager {
    cheats: Vec<Cheat>,
    /// Selected entry for `index_next` / `index_prev` / `toggle`.
    index: usize,
}

impl CheatManager {
    pub fn new(cheats: Vec<Cheat>) -> Self {
        Self { cheats, index: 0 }
    }

    /// Load a cheat file.
    pub fn load(path: &Path) -> Result<Self, CheatError> {
        let table = config::read_table(path)?.ok_or_else(|| CheatError::MissingCount {
            path: path.to_path_buf(),
        })?;
        let count = table
            .get("cheats")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| CheatError::MissingCount {
                path: path.to_path_buf(),
            })?;

        let mut cheats = Vec::with_capacity(count.max(0) as usize);
        for index in 0..count.max(0) as usize {
            let code = table
                .get(&format!("cheat{index}_code"))
                .and_then(toml::Value::as_str)
                .ok_or_else(|| CheatError::MissingCode {
                    path: path.to_path_buf(),
                    index,
                })?;
            let desc = table
                .get(&format!("cheat{index}_desc"))
                .and_then(toml::Value::as_str)
                .unwrap_or_default();
            let enabled = table
                .get(&format!("cheat{index}_enable"))
                .and_then(toml::Value::as_bool)
                .unwrap_or(false);
            cheats.push(Cheat {
                desc: desc.to_string(),
                code: code.to_string(),
                enabled,
            });
        }
        tracing::info!(path = %path.display(), count = cheats.len(), "Loaded cheats");
        Ok(Self::new(cheats))
    }

    pub fn save(&self, path: &Path) -> Result<(), CheatError> {
        let mut table = toml::Table::new();
        table.insert(
            "cheats".to_string(),
            toml::Value::Integer(self.cheats.len() as i64),
        );
        for (i, cheat) in self.cheats.iter().enumerate() {
            table.insert(
                format!("cheat{i}_desc"),
                toml::Value::String(cheat.desc.clone()),
            );
            table.insert(
                format!("cheat{i}_code"),
                toml::Value::String(cheat.code.clone()),
            );
            table.insert(format!("cheat{i}_enable"), toml::Value::Boolean(cheat.enabled));
        }
        config::write_table(path, &table)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cheats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cheats.is_empty()
    }

    pub fn cheats(&self) -> &[Cheat] {
        &self.cheats
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn index_next(&mut self) {
        if !self.cheats.is_empty() {
            self.index = (self.index + 1) % self.cheats.len();
        }
    }

    pub fn index_prev(&mut self) {
        if self.cheats.is_empty() {
            return;
        }
        self.index = if self.index == 0 {
            self.cheats.len() - 1
        } else {
            self.index - 1
        };
    }

    /// Flip the selected entry.
    pub fn toggle(&mut self) {
        if let Some(cheat) = self.cheats.get_mut(self.index) {
            cheat.enabled = !cheat.enabled;
        }
    }

    /// `Cheat: #i [ON|OFF]: desc` for the selected entry.
    pub fn status(&self) -> Option<String> {
        let cheat = self.cheats.get(self.index)?;
        Some(format!(
            "Cheat: #{} [{}]: {}",
            self.index,
            if cheat.enabled { "ON" } else { "OFF" },
            cheat.desc
        ))
    }

    /// Enabled, non-empty codes in index order, as fed to `cheat_set`.
    pub fn enabled_codes(&self) -> impl Iterator<Item = (u32, &str)> {
        self.cheats
            .iter()
            .enumerate()
            .filter(|(_, c)| c.enabled && !c.code.is_empty())
            .map(|(i, c)| (i as u32, c.code.as_str()))
    }
}

/// `{dir}/{core_name}/{basename}.cht`
pub fn cheat_path(dir: &Path, core_name: &str, basename: &str) -> PathBuf {
    dir.join(crate::core_options::sanitize_file_name(core_name))
        .join(format!("{basename}.cht"))
}
