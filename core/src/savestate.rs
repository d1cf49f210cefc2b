//! Savestate files and in-memory captures
//!
//! States are opaque blobs of `serialize_size()` bytes. On disk they may be
//! wrapped in RZIP; reads detect the wrapper by its magic.
//!
//! Slot paths follow `{dir}/{basename}{slot}`: slot 0 has no suffix, positive
//! slots append the number and the negative slot is the `.auto` state.

pub mod rewind;
pub mod rzip;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::plugin::{Core, CoreCallbacks};

pub use rewind::RewindManager;
pub use rzip::RzipError;

/// Slot used for save-on-exit and load-on-start.
pub const AUTO_SLOT: i32 = -1;

#[derive(Debug, Error)]
pub enum SavestateError {
    #[error("core does not support savestates")]
    Unsupported,
    #[error("core failed to serialize its state")]
    Serialize,
    #[error("core failed to unserialize the state")]
    Unserialize,
    #[error("failed to read state {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write state {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Rzip(#[from] RzipError),
}

/// Path of `slot` for a content whose state basename is `basename`
/// (typically `game.state`).
pub fn state_path(dir: &Path, basename: &str, slot: i32) -> PathBuf {
    let name = match slot {
        0 => basename.to_string(),
        s if s > 0 => format!("{basename}{s}"),
        _ => format!("{basename}.auto"),
    };
    dir.join(name)
}

/// Highest numbered slot that exists on disk, for auto-increment.
pub fn highest_slot(dir: &Path, basename: &str) -> Option<i32> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let suffix = name.strip_prefix(basename)?;
            if suffix.is_empty() {
                return Some(0);
            }
            suffix.parse::<i32>().ok().filter(|slot| *slot > 0)
        })
        .max()
}

/// Serialize the core into a fresh buffer.
pub fn capture(core: &mut dyn Core, cb: &mut dyn CoreCallbacks) -> Result<Vec<u8>, SavestateError> {
    let size = core.serialize_size(cb);
    if size == 0 {
        return Err(SavestateError::Unsupported);
    }
    let mut buf = vec![0u8; size];
    if !core.serialize(cb, &mut buf) {
        return Err(SavestateError::Serialize);
    }
    Ok(buf)
}

pub fn restore(
    core: &mut dyn Core,
    cb: &mut dyn CoreCallbacks,
    data: &[u8],
) -> Result<(), SavestateError> {
    if core.serialize_size(cb) == 0 {
        return Err(SavestateError::Unsupported);
    }
    if core.unserialize(cb, data) {
        Ok(())
    } else {
        Err(SavestateError::Unserialize)
    }
}

/// Write a state, RZIP-compressed when `compress` is set.
pub fn write(path: &Path, data: &[u8], compress: bool) -> Result<(), SavestateError> {
    let write_err = |source| SavestateError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    if compress {
        let packed = rzip::compress(data, rzip::DEFAULT_CHUNK_SIZE)?;
        std::fs::write(path, packed).map_err(write_err)?;
    } else {
        std::fs::write(path, data).map_err(write_err)?;
    }
    tracing::debug!(path = %path.display(), size = data.len(), compress, "Wrote state");
    Ok(())
}

/// Read a state, unwrapping RZIP if present.
pub fn read(path: &Path) -> Result<Vec<u8>, SavestateError> {
    let data = std::fs::read(path).map_err(|source| SavestateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if rzip::is_rzip(&data) {
        Ok(rzip::decompress(&data)?)
    } else {
        Ok(data)
    }
}
