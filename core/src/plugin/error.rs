//! Errors raised while loading a core

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreLoadError {
    /// The host binary itself exports the core ABI, so symbols would not
    /// resolve to the plugin.
    #[error("host process already exports retro_init; refusing to load a dynamic core")]
    HostExportsSymbols,
    #[error("failed to open core {path}: {source}")]
    Open {
        path: PathBuf,
        source: libloading::Error,
    },
    #[error("core {path} is missing symbol {symbol}: {source}")]
    MissingSymbol {
        path: PathBuf,
        symbol: &'static str,
        source: libloading::Error,
    },
    #[error("core API version {core} does not match host version {host}")]
    ApiMismatch { core: u32, host: u32 },
}
