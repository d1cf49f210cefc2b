use std::io;

use thiserror::Error;

/// Shown when the session is lost and play goes on locally.
pub const NETPLAY_DISCONNECTED: &str = "Netplay has disconnected. Will continue without connection.";

/// Netplay failures. The mismatch variants carry the text shown to the user.
#[derive(Debug, Error)]
pub enum NetplayError {
    #[error("netplay I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("failed to resolve netplay host {0}")]
    Resolve(String),
    #[error("Content CRC32s differ. Cannot use different games.")]
    ContentMismatch,
    #[error(
        "Implementations differ, make sure you're using exact same libretro implementations and frontend version."
    )]
    ImplementationMismatch,
    #[error("Content SRAM sizes do not correspond.")]
    SramMismatch,
    #[error("invalid nickname")]
    InvalidNick,
    #[error("peer refused the command")]
    Nak,
    #[error("netplay protocol error: {0}")]
    Protocol(String),
    #[error("peer disconnected")]
    Disconnected,
    #[error("cancelled by user")]
    Cancelled,
    #[error("core failed to serialize a netplay state")]
    Serialize,
    #[error("core failed to load a netplay state")]
    Unserialize,
    #[error("Cannot flip users if you're not the host.")]
    NotHost,
    #[error("Cannot flip users yet. Wait a second or two before attempting flip.")]
    FlipTooSoon,
    #[error("core does not support savestates")]
    Unsupported,
}

impl NetplayError {
    /// Errors that leave the connection usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotHost | Self::FlipTooSoon | Self::Nak)
    }

    /// Errors whose text is meant for the user as-is.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::ContentMismatch
                | Self::ImplementationMismatch
                | Self::SramMismatch
                | Self::NotHost
                | Self::FlipTooSoon
        )
    }
}
