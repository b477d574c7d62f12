use serde::{Deserialize, Serialize};

/// 8-bit RGB color, the canonical color precision of a record.
///
/// Formats with wider channels (LAS stores 16 bits per channel) or packed
/// representations (PCD's single `rgb` field) convert at the boundary
/// through the methods below.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

const RGB16_SCALE: u16 = 256;
const LEGACY_CHANNEL_MAX: f64 = 65535.0;
const LEGACY_UNPACK_SCALE: f64 = 16_777_216.0; // 256^3

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Downscales 16-bit LAS channels by integer division.
    pub fn from_rgb16(r: u16, g: u16, b: u16) -> Self {
        Self {
            r: (r / RGB16_SCALE) as u8,
            g: (g / RGB16_SCALE) as u8,
            b: (b / RGB16_SCALE) as u8,
        }
    }

    pub fn to_rgb16(self) -> [u16; 3] {
        [
            self.r as u16 * RGB16_SCALE,
            self.g as u16 * RGB16_SCALE,
            self.b as u16 * RGB16_SCALE,
        ]
    }

    /// `0x00RRGGBB`, the PCL layout of the packed `rgb` field.
    pub fn to_pcl_u32(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Ignores the alpha byte of `rgba` values.
    pub fn from_pcl_u32(packed: u32) -> Self {
        Self {
            r: ((packed >> 16) & 0xff) as u8,
            g: ((packed >> 8) & 0xff) as u8,
            b: (packed & 0xff) as u8,
        }
    }

    /// Stores the PCL integer layout as the bit pattern of an `f32`.
    pub fn to_pcl_packed(self) -> f32 {
        f32::from_bits(self.to_pcl_u32())
    }

    pub fn from_pcl_packed(packed: f32) -> Self {
        Self::from_pcl_u32(packed.to_bits())
    }

    /// Sum of the three 16-bit channel fractions.
    ///
    /// Older tools wrote PCD color this way. Distinct colors can produce the
    /// same sum, so [`Color::from_legacy_fraction`] is only an approximation
    /// of the inverse.
    pub fn to_legacy_fraction(self) -> f32 {
        let sum: f64 = self
            .to_rgb16()
            .iter()
            .map(|&c| c as f64 / LEGACY_CHANNEL_MAX)
            .sum();
        sum as f32
    }

    pub fn from_legacy_fraction(packed: f32) -> Self {
        let scaled = (packed as f64 * LEGACY_UNPACK_SCALE).round();
        let value = if scaled.is_finite() && scaled > 0.0 {
            scaled as u64
        } else {
            0
        };

        Self {
            r: (value / 65536).min(255) as u8,
            g: ((value / 256) % 256) as u8,
            b: (value % 256) as u8,
        }
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Color> for [u8; 3] {
    fn from(color: Color) -> Self {
        [color.r, color.g, color.b]
    }
}
