//! PNG screenshots of the last presented frame.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use retrohost_shared::PixelFormat;
use thiserror::Error;

use crate::drivers::CachedFrame;

#[derive(Debug, Error)]
pub enum ScreenshotError {
    #[error("failed to create screenshot {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode screenshot: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("frame of {width}x{height} does not fit its {len} byte buffer")]
    Truncated { width: u32, height: u32, len: usize },
}

/// `{dir}/{basename}-{YYYY-mm-dd_HH-MM-SS}.png`
pub fn screenshot_path(dir: &Path, basename: &str) -> PathBuf {
    let now = chrono::Local::now();
    dir.join(format!("{basename}-{}.png", now.format("%Y-%m-%d_%H-%M-%S")))
}

/// Encode `frame` as an 8-bit RGB PNG at `path`.
pub fn write_png(path: &Path, frame: &CachedFrame) -> Result<(), ScreenshotError> {
    let rgb = to_rgb8(frame)?;
    let io_err = |source| ScreenshotError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = File::create(path).map_err(io_err)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&rgb)?;

    tracing::info!(path = %path.display(), "Screenshot saved");
    Ok(())
}

/// Convert any core pixel format to packed RGB8 rows.
fn to_rgb8(frame: &CachedFrame) -> Result<Vec<u8>, ScreenshotError> {
    let bpp = frame.format.bytes_per_pixel();
    let row_len = frame.width as usize * bpp;
    let needed = frame.pitch * (frame.height as usize).saturating_sub(1) + row_len;
    if frame.height > 0 && (frame.pitch < row_len || frame.data.len() < needed) {
        return Err(ScreenshotError::Truncated {
            width: frame.width,
            height: frame.height,
            len: frame.data.len(),
        });
    }

    let mut out = Vec::with_capacity(frame.width as usize * frame.height as usize * 3);
    for y in 0..frame.height as usize {
        let row = &frame.data[y * frame.pitch..y * frame.pitch + row_len];
        for px in row.chunks_exact(bpp) {
            out.extend_from_slice(&pixel_rgb(frame.format, px));
        }
    }
    Ok(out)
}

fn pixel_rgb(format: PixelFormat, px: &[u8]) -> [u8; 3] {
    let expand5 = |v: u16| ((v << 3) | (v >> 2)) as u8;
    let expand6 = |v: u16| ((v << 2) | (v >> 4)) as u8;
    match format {
        PixelFormat::Xrgb8888 => [px[2], px[1], px[0]],
        PixelFormat::Rgb565 => {
            let v = u16::from_le_bytes([px[0], px[1]]);
            [
                expand5((v >> 11) & 0x1f),
                expand6((v >> 5) & 0x3f),
                expand5(v & 0x1f),
            ]
        }
        PixelFormat::Rgb1555 => {
            let v = u16::from_le_bytes([px[0], px[1]]);
            [
                expand5((v >> 10) & 0x1f),
                expand5((v >> 5) & 0x1f),
                expand5(v & 0x1f),
            ]
        }
    }
}
