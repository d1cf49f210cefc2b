//! RZIP framed deflate container
//!
//! ```text
//! header (20 bytes):
//!   [0..8]   magic "#RZIPv1#"
//!   [8..12]  u32 LE uncompressed chunk size
//!   [12..20] u64 LE total uncompressed size
//! chunks, until the total is reached:
//!   u32 LE compressed size, then a raw deflate stream
//! ```

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use thiserror::Error;

pub const MAGIC: &[u8; 8] = b"#RZIPv1#";
pub const HEADER_SIZE: usize = 20;
pub const DEFAULT_CHUNK_SIZE: u32 = 128 * 1024;

#[derive(Debug, Error)]
pub enum RzipError {
    #[error("not an RZIP stream")]
    BadMagic,
    #[error("RZIP header declares a zero chunk size")]
    ZeroChunkSize,
    #[error("RZIP stream truncated after {decoded} of {total} bytes")]
    Truncated { decoded: u64, total: u64 },
    #[error("RZIP chunk inflated to {actual} bytes, limit is {limit}")]
    ChunkTooLarge { actual: usize, limit: u32 },
    #[error("RZIP I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether `data` starts with the RZIP magic.
pub fn is_rzip(data: &[u8]) -> bool {
    data.len() >= HEADER_SIZE && data.starts_with(MAGIC)
}

/// Compress `data` into an RZIP stream.
pub fn compress(data: &[u8], chunk_size: u32) -> Result<Vec<u8>, RzipError> {
    if chunk_size == 0 {
        return Err(RzipError::ZeroChunkSize);
    }
    let mut out = Vec::with_capacity(HEADER_SIZE + data.len() / 2);
    out.extend_from_slice(MAGIC);
    out.write_u32::<LittleEndian>(chunk_size)?;
    out.write_u64::<LittleEndian>(data.len() as u64)?;

    for chunk in data.chunks(chunk_size as usize) {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(chunk)?;
        let payload = encoder.finish()?;
        out.write_u32::<LittleEndian>(payload.len() as u32)?;
        out.extend_from_slice(&payload);
    }
    Ok(out)
}

/// Decompress an RZIP stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, RzipError> {
    if !is_rzip(data) {
        return Err(RzipError::BadMagic);
    }
    let body = &data[MAGIC.len()..];
    let mut cursor = Cursor::new(body);
    let chunk_size = cursor.read_u32::<LittleEndian>()?;
    let total = cursor.read_u64::<LittleEndian>()?;
    if chunk_size == 0 {
        return Err(RzipError::ZeroChunkSize);
    }

    let mut out = Vec::with_capacity(total.min(1 << 30) as usize);
    while (out.len() as u64) < total {
        let truncated = |decoded: usize| RzipError::Truncated {
            decoded: decoded as u64,
            total,
        };
        let size = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| truncated(out.len()))? as usize;
        let start = cursor.position() as usize;
        let payload = body
            .get(start..start + size)
            .ok_or_else(|| truncated(out.len()))?;
        cursor.set_position((start + size) as u64);

        let before = out.len();
        DeflateDecoder::new(payload)
            .take(u64::from(chunk_size) + 1)
            .read_to_end(&mut out)?;
        let inflated = out.len() - before;
        if inflated > chunk_size as usize {
            return Err(RzipError::ChunkTooLarge {
                actual: inflated,
                limit: chunk_size,
            });
        }
        if inflated == 0 {
            return Err(truncated(out.len()));
        }
    }
    out.truncate(total as usize);
    Ok(out)
}
