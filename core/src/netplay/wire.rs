//! Netplay wire format
//!
//! All integers are big-endian.
//!
//! ```text
//! UDP input packet (240 bytes, oldest record first):
//!   20 x { u32 frame, u32 input | lag << 16, u32 state_crc }
//!
//! TCP command:
//!   u32 cmd << 16 | payload_size & 0xffff, payload
//! ```
//!
//! Savestate payloads can exceed the 16-bit size field; receivers read the
//! locally known state size instead.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

/// Frames carried by every input packet.
pub const UDP_FRAME_PACKETS: usize = 20;

const RECORD_SIZE: usize = 12;

/// Size of one input packet.
pub const PACKET_SIZE: usize = UDP_FRAME_PACKETS * RECORD_SIZE;

/// One frame of a peer's input as sent over UDP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameRecord {
    /// Frame number; 0 marks an unused record.
    pub frame: u32,
    pub input: u16,
    /// Frames the sender was running ahead of its confirmed input.
    pub lag: u16,
    /// State CRC of this frame, 0 when not computed.
    pub crc: u32,
}

pub fn encode_packet(records: &[FrameRecord; UDP_FRAME_PACKETS]) -> [u8; PACKET_SIZE] {
    let mut out = [0u8; PACKET_SIZE];
    for (record, chunk) in records.iter().zip(out.chunks_exact_mut(RECORD_SIZE)) {
        BigEndian::write_u32(&mut chunk[0..4], record.frame);
        BigEndian::write_u32(
            &mut chunk[4..8],
            u32::from(record.input) | u32::from(record.lag) << 16,
        );
        BigEndian::write_u32(&mut chunk[8..12], record.crc);
    }
    out
}

/// `None` unless `buf` is exactly one packet.
pub fn decode_packet(buf: &[u8]) -> Option<[FrameRecord; UDP_FRAME_PACKETS]> {
    if buf.len() != PACKET_SIZE {
        return None;
    }
    let mut records = [FrameRecord::default(); UDP_FRAME_PACKETS];
    let mut cursor = buf;
    for record in &mut records {
        let frame = cursor.read_u32::<BigEndian>().ok()?;
        let state = cursor.read_u32::<BigEndian>().ok()?;
        let crc = cursor.read_u32::<BigEndian>().ok()?;
        *record = FrameRecord {
            frame,
            input: state as u16,
            lag: (state >> 16) as u16,
            crc,
        };
    }
    Some(records)
}

/// TCP command ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmd {
    Ack,
    Nak,
    FlipPlayers,
    LoadSavestate,
    Resync,
}

impl Cmd {
    pub fn id(self) -> u16 {
        match self {
            Self::Ack => 0,
            Self::Nak => 1,
            Self::FlipPlayers => 2,
            Self::LoadSavestate => 3,
            Self::Resync => 4,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Some(match id {
            0 => Self::Ack,
            1 => Self::Nak,
            2 => Self::FlipPlayers,
            3 => Self::LoadSavestate,
            4 => Self::Resync,
            _ => return None,
        })
    }
}

pub fn header(cmd: Cmd, size: usize) -> u32 {
    u32::from(cmd.id()) << 16 | (size & 0xffff) as u32
}

/// `(command id, payload size)` of a header word.
pub fn split_header(header: u32) -> (u16, u16) {
    ((header >> 16) as u16, header as u16)
}

pub fn write_command(w: &mut impl Write, cmd: Cmd, payload: &[u8]) -> io::Result<()> {
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.write_u32::<BigEndian>(header(cmd, payload.len()))?;
    buf.extend_from_slice(payload);
    w.write_all(&buf)?;
    w.flush()
}

pub fn read_header(r: &mut impl Read) -> io::Result<(u16, u16)> {
    Ok(split_header(r.read_u32::<BigEndian>()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_layout() {
        let mut records = [FrameRecord::default(); UDP_FRAME_PACKETS];
        records[UDP_FRAME_PACKETS - 1] = FrameRecord {
            frame: 7,
            input: 0x0102,
            lag: 3,
            crc: 0xdead_beef,
        };
        let bytes = encode_packet(&records);
        assert_eq!(bytes.len(), 240);
        assert_eq!(&bytes[228..240], &[0, 0, 0, 7, 0, 3, 1, 2, 0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decode_packet(&bytes), Some(records));
    }

    #[test]
    fn test_short_packet_rejected() {
        assert_eq!(decode_packet(&[0; 236]), None);
    }

    #[test]
    fn test_header_truncates_size() {
        let h = header(Cmd::LoadSavestate, 0x1_0004);
        assert_eq!(split_header(h), (3, 4));

        let mut buf = Vec::new();
        write_command(&mut buf, Cmd::FlipPlayers, &[0, 0, 0, 42]).unwrap();
        assert_eq!(buf, vec![0, 2, 0, 4, 0, 0, 0, 42]);
        assert_eq!(read_header(&mut &buf[..]).unwrap(), (2, 4));
    }

    #[test]
    fn test_unknown_command_id() {
        assert_eq!(Cmd::from_id(4), Some(Cmd::Resync));
        assert_eq!(Cmd::from_id(9), None);
    }
}
