//! Texel format conversion
//!
//! Converts raw texels into one of two canonical layouts: RGBA8 for colour
//! and colour-indexed formats, I8A8 for intensity formats.
//!
//! Format codes are `class << 5 | size << 3`:
//!
//! | Code | Format | Output |
//! |---|---|---|
//! | 0x10 | RGBA16 (5-5-5-1) | RGBA8 |
//! | 0x18 | RGBA32 | RGBA8 |
//! | 0x40 | CI4 | RGBA8 via palette |
//! | 0x48 | CI8 | RGBA8 via palette |
//! | 0x60 | IA4 (3-bit I, 1-bit A) | I8A8 |
//! | 0x68 | IA8 (4-bit I, 4-bit A) | I8A8 |
//! | 0x70 | IA16 | I8A8 |
//! | 0x80 | I4 | I8A8 |
//! | 0x88 | I8 | I8A8 |
//! | 0x90 | I16 | I8A8 |

use gbi_core::graphics::ColorOps;
use gbi_core::logging::{log, LogCategory, LogLevel};
use gbi_core::types::PixelLayout;

/// A supported texel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum TexelFormat {
    RGBA16,
    RGBA32,
    CI4,
    CI8,
    IA4,
    IA8,
    IA16,
    I4,
    I8,
    I16,
}

impl TexelFormat {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x10 => Some(TexelFormat::RGBA16),
            0x18 => Some(TexelFormat::RGBA32),
            0x40 => Some(TexelFormat::CI4),
            0x48 => Some(TexelFormat::CI8),
            0x60 => Some(TexelFormat::IA4),
            0x68 => Some(TexelFormat::IA8),
            0x70 => Some(TexelFormat::IA16),
            0x80 => Some(TexelFormat::I4),
            0x88 => Some(TexelFormat::I8),
            0x90 => Some(TexelFormat::I16),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            TexelFormat::RGBA16 => 0x10,
            TexelFormat::RGBA32 => 0x18,
            TexelFormat::CI4 => 0x40,
            TexelFormat::CI8 => 0x48,
            TexelFormat::IA4 => 0x60,
            TexelFormat::IA8 => 0x68,
            TexelFormat::IA16 => 0x70,
            TexelFormat::I4 => 0x80,
            TexelFormat::I8 => 0x88,
            TexelFormat::I16 => 0x90,
        }
    }

    pub fn bits_per_texel(self) -> usize {
        match self {
            TexelFormat::CI4 | TexelFormat::IA4 | TexelFormat::I4 => 4,
            TexelFormat::CI8 | TexelFormat::IA8 | TexelFormat::I8 => 8,
            TexelFormat::RGBA16 | TexelFormat::IA16 | TexelFormat::I16 => 16,
            TexelFormat::RGBA32 => 32,
        }
    }

    pub fn is_color_indexed(self) -> bool {
        matches!(self, TexelFormat::CI4 | TexelFormat::CI8)
    }

    /// Bytes of source data `texels` texels occupy
    pub fn source_len(self, texels: usize) -> usize {
        (texels * self.bits_per_texel()).div_ceil(8)
    }
}

/// Output layout for a format code, from its class bits alone
///
/// RGBA and CI decode to RGBA8; IA and I decode to I8A8. Other classes
/// (YUV, and the unused 5..7) have no layout.
pub fn destination_layout(code: u8) -> Option<PixelLayout> {
    match code & 0xE0 {
        0x00 | 0x40 => Some(PixelLayout::Rgba8),
        0x60 | 0x80 => Some(PixelLayout::I8A8),
        _ => None,
    }
}

/// An expanded RGBA8 palette
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    entries: Vec<[u8; 4]>,
}

impl Palette {
    /// Decode `count` big-endian 5-5-5-1 entries
    ///
    /// Entries past the end of `bytes` are left out.
    pub fn from_rgba5551(bytes: &[u8], count: usize) -> Self {
        let entries = bytes
            .chunks_exact(2)
            .take(count)
            .map(|pair| ColorOps::rgba5551_to_rgba8(u16::from_be_bytes([pair[0], pair[1]])))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Colour of `index`, transparent black when out of range
    #[inline]
    pub fn lookup(&self, index: usize) -> [u8; 4] {
        self.entries.get(index).copied().unwrap_or([0; 4])
    }

    /// Checksum of the expanded entries, used to key CI textures
    pub fn checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        for entry in &self.entries {
            hasher.update(entry);
        }
        hasher.finalize()
    }
}

/// Result of a texel conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPixels {
    pub layout: PixelLayout,
    pub pixels: Vec<u8>,
}

impl DecodedPixels {
    /// A zero-filled buffer in the layout `code` would decode to
    pub fn zeroed(code: u8, width: u32, height: u32) -> Self {
        let layout = destination_layout(code).unwrap_or(PixelLayout::Rgba8);
        Self {
            layout,
            pixels: vec![0; layout.buffer_len(width, height)],
        }
    }
}

/// Convert `width * height` texels of format `code` from `src`
///
/// Missing source bytes read as zero. Unsupported formats, and CI formats
/// without a palette, produce a zero-filled buffer.
pub fn decode_texels(
    code: u8,
    src: &[u8],
    width: u32,
    height: u32,
    palette: Option<&Palette>,
) -> DecodedPixels {
    let Some(format) = TexelFormat::from_code(code) else {
        log(LogCategory::Texture, LogLevel::Warn, || {
            format!("unsupported texture format {:#04X}", code)
        });
        return DecodedPixels::zeroed(code, width, height);
    };

    let texels = width as usize * height as usize;
    let mut out = DecodedPixels::zeroed(code, width, height);
    let dst = &mut out.pixels;
    let byte = |i: usize| src.get(i).copied().unwrap_or(0);
    let nibble = |t: usize| {
        let b = byte(t / 2);
        if t % 2 == 0 {
            b >> 4
        } else {
            b & 0x0F
        }
    };

    match format {
        TexelFormat::CI4 | TexelFormat::CI8 => {
            let Some(palette) = palette else {
                log(LogCategory::Texture, LogLevel::Warn, || {
                    format!("{:?} texture without a palette", format)
                });
                return out;
            };
            for t in 0..texels {
                let index = if format == TexelFormat::CI4 {
                    nibble(t)
                } else {
                    byte(t)
                };
                dst[t * 4..t * 4 + 4].copy_from_slice(&palette.lookup(index as usize));
            }
        }
        TexelFormat::I4 => {
            for t in 0..texels {
                let i = ColorOps::expand_4bit(nibble(t));
                dst[t * 2] = i;
                dst[t * 2 + 1] = i;
            }
        }
        TexelFormat::I8 => {
            for t in 0..texels {
                let i = byte(t);
                dst[t * 2] = i;
                dst[t * 2 + 1] = i;
            }
        }
        TexelFormat::IA4 => {
            for t in 0..texels {
                let n = nibble(t);
                let i = n & 0x0E;
                dst[t * 2] = (i << 4) | i;
                dst[t * 2 + 1] = if n & 0x01 != 0 { 0xFF } else { 0x00 };
            }
        }
        TexelFormat::IA8 => {
            for t in 0..texels {
                let b = byte(t);
                dst[t * 2] = ColorOps::expand_4bit(b >> 4);
                dst[t * 2 + 1] = ColorOps::expand_4bit(b & 0x0F);
            }
        }
        TexelFormat::IA16 | TexelFormat::I16 => {
            for t in 0..texels {
                dst[t * 2] = byte(t * 2);
                dst[t * 2 + 1] = byte(t * 2 + 1);
            }
        }
        TexelFormat::RGBA16 => {
            for t in 0..texels {
                let texel = u16::from_be_bytes([byte(t * 2), byte(t * 2 + 1)]);
                dst[t * 4..t * 4 + 4].copy_from_slice(&ColorOps::rgba5551_to_rgba8(texel));
            }
        }
        TexelFormat::RGBA32 => {
            let n = (texels * 4).min(src.len());
            dst[..n].copy_from_slice(&src[..n]);
        }
    }

    out
}
