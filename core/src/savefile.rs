//! Save RAM files
//!
//! Persistent memory regions (`SAVE_RAM`, `RTC`) are read into the core after
//! content loads and written back when content unloads, per [`SramMode`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use retrohost_shared::device::memory;
use thiserror::Error;

use crate::plugin::Core;

#[derive(Debug, Error)]
pub enum SaveFileError {
    #[error("failed to read save file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write save file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Whether save RAM is loaded at start and written at exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SramMode {
    NoLoadNoSave,
    NoLoadSave,
    LoadNoSave,
    #[default]
    LoadSave,
}

impl SramMode {
    pub fn load(self) -> bool {
        matches!(self, Self::LoadNoSave | Self::LoadSave)
    }

    pub fn save(self) -> bool {
        matches!(self, Self::NoLoadSave | Self::LoadSave)
    }
}

impl FromStr for SramMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "noload-nosave" => Ok(Self::NoLoadNoSave),
            "noload-save" => Ok(Self::NoLoadSave),
            "load-nosave" => Ok(Self::LoadNoSave),
            "load-save" => Ok(Self::LoadSave),
            other => Err(format!(
                "invalid sram mode '{other}' (expected noload-nosave, noload-save, load-nosave or load-save)"
            )),
        }
    }
}

/// One persistent memory region and its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFile {
    pub id: u32,
    pub path: PathBuf,
}

/// `{dir}/{basename}.srm` and `{dir}/{basename}.rtc`.
pub fn save_files(dir: &Path, basename: &str) -> Vec<SaveFile> {
    memory::PERSISTENT
        .iter()
        .map(|&(id, ext)| SaveFile {
            id,
            path: dir.join(format!("{basename}.{ext}")),
        })
        .collect()
}

/// Copy a save file into core memory. Returns false if the core has no
/// such region or the file does not exist.
pub fn load(core: &mut dyn Core, file: &SaveFile) -> Result<bool, SaveFileError> {
    let Some(region) = core.memory_data(file.id).filter(|r| !r.is_empty()) else {
        return Ok(false);
    };
    let data = match std::fs::read(&file.path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(source) => {
            return Err(SaveFileError::Read {
                path: file.path.clone(),
                source,
            });
        }
    };
    if data.len() != region.len() {
        tracing::warn!(
            path = %file.path.display(),
            file = data.len(),
            core = region.len(),
            "Save file size differs from core memory"
        );
    }
    let len = data.len().min(region.len());
    region[..len].copy_from_slice(&data[..len]);
    tracing::info!(path = %file.path.display(), size = len, "Loaded save file");
    Ok(true)
}

/// Write core memory to its save file. Returns false if the region is empty.
pub fn save(core: &mut dyn Core, file: &SaveFile) -> Result<bool, SaveFileError> {
    let Some(region) = core.memory_data(file.id).filter(|r| !r.is_empty()) else {
        return Ok(false);
    };
    write(&file.path, region)?;
    tracing::info!(path = %file.path.display(), size = region.len(), "Saved save file");
    Ok(true)
}

pub(crate) fn write(path: &Path, data: &[u8]) -> Result<(), SaveFileError> {
    let write_err = |source| SaveFileError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, data).map_err(write_err)
}
