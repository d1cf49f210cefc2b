//! Two-peer netplay
//!
//! Peers run in lock-step on the same core and content. Each side runs
//! ahead on its own input plus a prediction of the peer's (the last input
//! it confirmed), and sends its input for the last [`UDP_FRAME_PACKETS`]
//! frames in every UDP packet. When a packet shows a prediction was wrong,
//! the engine loads the state saved before that frame and replays up to the
//! present with suspended A/V.
//!
//! The TCP stream carries the handshake and commands that must not be lost:
//! player flips and full savestates. Every command is answered with an ACK
//! or NAK before the sender continues.

mod engine;
mod error;
pub mod handshake;
mod timeline;
mod transport;
pub mod wire;


pub use engine::{NetplayConfig, NetplayEngine};
pub use error::{NETPLAY_DISCONNECTED, NetplayError};
pub use timeline::{FLIP_LEAD, MAX_DELAY_FRAMES};
pub use transport::NetplayListener;
pub use wire::UDP_FRAME_PACKETS;
