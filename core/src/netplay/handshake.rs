//! Connection handshake
//!
//! ```text
//! client -> host   u32 content_crc, u32 impl_magic, u32 sram_size,
//!                  u8 nick_len, nick
//! host -> client   ACK, or NAK + u32 reason
//! host -> client   sram_size bytes of save RAM, u8 nick_len, nick
//! ```

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::NetplayError;
use super::transport::closed;
use super::wire::{self, Cmd};

/// Longest nickname accepted on the wire.
pub const MAX_NICK_LEN: usize = 32;

const REJECT_CONTENT: u32 = 1;
const REJECT_IMPLEMENTATION: u32 = 2;
const REJECT_SRAM: u32 = 3;
const REJECT_NICK: u32 = 4;

/// What each side announces about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub content_crc: u32,
    pub magic: u32,
    pub sram_size: u32,
    pub nick: String,
}

/// Digest over everything that has to match for two peers to stay in sync:
/// the plugin ABI, the core build and the frontend build.
pub fn impl_magic(
    api_version: u32,
    library_name: &str,
    library_version: &str,
    frontend_version: &str,
) -> u32 {
    let mut magic = api_version;
    for (i, b) in library_name.bytes().enumerate() {
        magic ^= u32::from(b) << (i & 0xf);
    }
    for (i, b) in library_version.bytes().enumerate() {
        magic ^= u32::from(b) << (i & 0xf);
    }
    for (i, b) in frontend_version.bytes().enumerate() {
        magic ^= u32::from(b) << ((i & 0xf) + 16);
    }
    magic
}

/// `nick` cut to [`MAX_NICK_LEN`] bytes on a character boundary.
pub fn clamp_nick(nick: &str) -> String {
    let mut end = nick.len().min(MAX_NICK_LEN);
    while !nick.is_char_boundary(end) {
        end -= 1;
    }
    nick[..end].to_string()
}

fn write_nick(w: &mut impl Write, nick: &str) -> Result<(), NetplayError> {
    let nick = clamp_nick(nick);
    w.write_u8(nick.len() as u8).map_err(closed)?;
    w.write_all(nick.as_bytes()).map_err(closed)?;
    Ok(())
}

fn read_nick(r: &mut impl Read) -> Result<String, NetplayError> {
    let len = usize::from(r.read_u8().map_err(closed)?);
    if len > MAX_NICK_LEN {
        return Err(NetplayError::InvalidNick);
    }
    let mut buf = vec![0; len];
    r.read_exact(&mut buf).map_err(closed)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn reason_error(reason: u32) -> NetplayError {
    match reason {
        REJECT_CONTENT => NetplayError::ContentMismatch,
        REJECT_IMPLEMENTATION => NetplayError::ImplementationMismatch,
        REJECT_SRAM => NetplayError::SramMismatch,
        REJECT_NICK => NetplayError::InvalidNick,
        other => NetplayError::Protocol(format!("unknown handshake rejection {other}")),
    }
}

/// Client half. Fills `sram` with the host's save RAM and returns the
/// host's nickname.
pub(crate) fn client<S: Read + Write>(
    stream: &mut S,
    local: &PeerInfo,
    sram: &mut [u8],
) -> Result<String, NetplayError> {
    let mut header = Vec::with_capacity(12);
    header.write_u32::<BigEndian>(local.content_crc)?;
    header.write_u32::<BigEndian>(local.magic)?;
    header.write_u32::<BigEndian>(local.sram_size)?;
    stream.write_all(&header).map_err(closed)?;
    write_nick(stream, &local.nick)?;
    stream.flush().map_err(closed)?;

    let (id, _) = wire::read_header(stream).map_err(closed)?;
    match Cmd::from_id(id) {
        Some(Cmd::Ack) => {}
        Some(Cmd::Nak) => {
            let reason = stream.read_u32::<BigEndian>().map_err(closed)?;
            let e = reason_error(reason);
            tracing::error!(error = %e, "Host rejected the connection");
            return Err(e);
        }
        _ => {
            return Err(NetplayError::Protocol(format!(
                "unexpected handshake response {id}"
            )));
        }
    }

    stream.read_exact(sram).map_err(closed)?;
    read_nick(stream)
}

/// Host half. Checks the client against `local`, sends `sram` and returns
/// the client's nickname.
pub(crate) fn host<S: Read + Write>(
    stream: &mut S,
    local: &PeerInfo,
    sram: &[u8],
) -> Result<String, NetplayError> {
    let content_crc = stream.read_u32::<BigEndian>().map_err(closed)?;
    let magic = stream.read_u32::<BigEndian>().map_err(closed)?;
    let sram_size = stream.read_u32::<BigEndian>().map_err(closed)?;
    let nick = read_nick(stream);

    let rejection = if content_crc != local.content_crc {
        Some(REJECT_CONTENT)
    } else if magic != local.magic {
        Some(REJECT_IMPLEMENTATION)
    } else if sram_size != local.sram_size {
        Some(REJECT_SRAM)
    } else if nick.is_err() {
        Some(REJECT_NICK)
    } else {
        None
    };

    if let Some(reason) = rejection {
        let e = reason_error(reason);
        tracing::error!(error = %e, "Rejecting netplay client");
        wire::write_command(stream, Cmd::Nak, &reason.to_be_bytes()).map_err(closed)?;
        return Err(e);
    }
    let nick = nick?;

    wire::write_command(stream, Cmd::Ack, &[]).map_err(closed)?;
    stream.write_all(sram).map_err(closed)?;
    write_nick(stream, &local.nick)?;
    stream.flush().map_err(closed)?;
    Ok(nick)
}

#[cfg(test)]
mod tests {
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    use super::*;

    fn info(content_crc: u32, sram_size: u32, nick: &str) -> PeerInfo {
        PeerInfo {
            content_crc,
            magic: impl_magic(1, "test", "1.0", "0.1.0"),
            sram_size,
            nick: nick.to_string(),
        }
    }

    /// Run both halves over loopback and return (host, client) results.
    fn handshake(
        host_info: PeerInfo,
        host_sram: Vec<u8>,
        client_info: PeerInfo,
    ) -> (
        Result<String, NetplayError>,
        Result<(String, Vec<u8>), NetplayError>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let guest = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            let mut sram = vec![0; client_info.sram_size as usize];
            client(&mut stream, &client_info, &mut sram).map(|nick| (nick, sram))
        });
        let (mut stream, _) = listener.accept().unwrap();
        let host_result = host(&mut stream, &host_info, &host_sram);
        (host_result, guest.join().unwrap())
    }

    #[test]
    fn test_sram_and_nicks_exchanged() {
        let (host_result, client_result) = handshake(
            info(0xAAAA, 4, "host"),
            vec![1, 2, 3, 4],
            info(0xAAAA, 4, "guest"),
        );
        assert_eq!(host_result.unwrap(), "guest");
        let (nick, sram) = client_result.unwrap();
        assert_eq!(nick, "host");
        assert_eq!(sram, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_content_mismatch_reported_to_both() {
        let (host_result, client_result) =
            handshake(info(0xAAAA, 0, "a"), Vec::new(), info(0xBBBB, 0, "b"));
        assert!(matches!(host_result, Err(NetplayError::ContentMismatch)));
        let err = client_result.unwrap_err();
        assert!(matches!(err, NetplayError::ContentMismatch));
        assert_eq!(
            err.to_string(),
            "Content CRC32s differ. Cannot use different games."
        );
    }

    #[test]
    fn test_sram_mismatch_rejected() {
        let (host_result, client_result) =
            handshake(info(1, 8, "a"), vec![0; 8], info(1, 16, "b"));
        assert!(matches!(host_result, Err(NetplayError::SramMismatch)));
        assert!(matches!(client_result, Err(NetplayError::SramMismatch)));
    }

    #[test]
    fn test_magic_covers_every_input() {
        let base = impl_magic(1, "core", "1.0", "0.1.0");
        assert_eq!(base, impl_magic(1, "core", "1.0", "0.1.0"));
        assert_ne!(base, impl_magic(2, "core", "1.0", "0.1.0"));
        assert_ne!(base, impl_magic(1, "cora", "1.0", "0.1.0"));
        assert_ne!(base, impl_magic(1, "core", "1.1", "0.1.0"));
        assert_ne!(base, impl_magic(1, "core", "1.0", "0.2.0"));
    }

    #[test]
    fn test_long_nick_clamped() {
        let long = "x".repeat(40);
        assert_eq!(clamp_nick(&long).len(), MAX_NICK_LEN);
        assert_eq!(clamp_nick("ñ".repeat(20).as_str()).len(), 32);
    }
}
