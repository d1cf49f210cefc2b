//! Audio/video descriptions reported by a core.

use serde::{Deserialize, Serialize};

use crate::UnknownValue;

/// Static information about a loaded core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub library_name: String,
    pub library_version: String,
    /// `|`-separated list of content extensions.
    pub valid_extensions: String,
    /// Core wants a path instead of a content buffer.
    pub need_fullpath: bool,
    pub block_extract: bool,
}

/// Frame dimensions and display aspect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GameGeometry {
    pub base_width: u32,
    pub base_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    /// Display aspect ratio; `<= 0.0` means `base_width / base_height`.
    pub aspect_ratio: f32,
}

impl GameGeometry {
    /// Effective aspect ratio, falling back to the pixel ratio.
    pub fn effective_aspect(&self) -> f32 {
        if self.aspect_ratio > 0.0 {
            self.aspect_ratio
        } else if self.base_height > 0 {
            self.base_width as f32 / self.base_height as f32
        } else {
            1.0
        }
    }

    /// True if any of base size or aspect ratio differ.
    pub fn differs_from(&self, other: &GameGeometry) -> bool {
        self.base_width != other.base_width
            || self.base_height != other.base_height
            || self.aspect_ratio != other.aspect_ratio
    }
}

/// Frame and sample rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemTiming {
    pub fps: f64,
    pub sample_rate: f64,
}

impl Default for SystemTiming {
    fn default() -> Self {
        Self {
            fps: 60.0,
            sample_rate: 44_100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemAvInfo {
    pub geometry: GameGeometry,
    pub timing: SystemTiming,
}

/// Framebuffer pixel layouts a core may request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 0RGB1555, the ABI default.
    #[default]
    Rgb1555,
    Xrgb8888,
    Rgb565,
}

impl PixelFormat {
    pub fn from_raw(raw: u32) -> Result<Self, UnknownValue> {
        match raw {
            0 => Ok(Self::Rgb1555),
            1 => Ok(Self::Xrgb8888),
            2 => Ok(Self::Rgb565),
            value => Err(UnknownValue {
                kind: "pixel format",
                value,
            }),
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb1555 | Self::Rgb565 => 2,
            Self::Xrgb8888 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Rgb1555 => "0RGB1555",
            Self::Xrgb8888 => "XRGB8888",
            Self::Rgb565 => "RGB565",
        }
    }
}

/// Display rotation in 90 degree counter-clockwise steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_raw(raw: u32) -> Result<Self, UnknownValue> {
        match raw {
            0 => Ok(Self::Deg0),
            1 => Ok(Self::Deg90),
            2 => Ok(Self::Deg180),
            3 => Ok(Self::Deg270),
            value => Err(UnknownValue {
                kind: "rotation",
                value,
            }),
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

/// Video standard reported by `get_region`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    #[default]
    Ntsc,
    Pal,
}

impl Region {
    pub fn from_raw(raw: u32) -> Self {
        if raw == 1 { Self::Pal } else { Self::Ntsc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_from_raw() {
        assert_eq!(PixelFormat::from_raw(2), Ok(PixelFormat::Rgb565));
        let err = PixelFormat::from_raw(9).unwrap_err();
        assert_eq!(err.value, 9);
        assert!(err.to_string().contains("pixel format"));
    }

    #[test]
    fn test_geometry_change_detection() {
        let a = GameGeometry {
            base_width: 320,
            base_height: 240,
            max_width: 640,
            max_height: 480,
            aspect_ratio: 4.0 / 3.0,
        };
        let mut b = a;
        b.max_width = 1024;
        assert!(!a.differs_from(&b));
        b.base_height = 224;
        assert!(a.differs_from(&b));
    }

    #[test]
    fn test_effective_aspect_fallback() {
        let geom = GameGeometry {
            base_width: 256,
            base_height: 128,
            ..Default::default()
        };
        assert_eq!(geom.effective_aspect(), 2.0);
    }
}
