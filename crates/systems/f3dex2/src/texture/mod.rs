//! Texture pipeline
//!
//! Textures are described by `G_SETTIMG`, `G_SETTILE` and `G_SETTILESIZE`
//! and only decoded when the first triangle after a texture load is drawn.
//! Decoding goes through the session's [`TextureCache`], so the same tile
//! referenced twice is converted once.

pub mod cache;
pub mod codec;

use gbi_core::types::PixelLayout;
use gbi_core::SegmentedAddress;
use serde::Serialize;

pub use cache::{TextureCache, TextureKey};
pub use codec::{decode_texels, destination_layout, DecodedPixels, Palette, TexelFormat};

/// Texture image source set by `G_SETTIMG`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureImage {
    /// Format class (RGBA, YUV, CI, IA, I)
    pub format: u8,
    /// Size class (4, 8, 16 or 32 bits)
    pub size: u8,
    pub width: u32,
    pub address: SegmentedAddress,
}

impl TextureImage {
    pub fn from_words(w0: u32, w1: u32) -> Self {
        Self {
            format: ((w0 >> 21) & 0x7) as u8,
            size: ((w0 >> 19) & 0x3) as u8,
            width: (w0 & 0x0FFF) + 1,
            address: SegmentedAddress(w1),
        }
    }
}

/// Coordinate wrap mode for one texture axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum WrapMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

impl WrapMode {
    /// From the two-bit clamp/mirror field of `G_SETTILE`
    pub fn from_cm(cm: u8) -> Self {
        match cm & 0x3 {
            1 => WrapMode::MirroredRepeat,
            2 | 3 => WrapMode::ClampToEdge,
            _ => WrapMode::Repeat,
        }
    }
}

/// Tile parameters set by `G_SETTILE` and `G_SETTILESIZE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileDescriptor {
    /// `class << 5 | size << 3`
    pub format: u8,
    /// Texel source, copied from the texture image on load
    pub address: SegmentedAddress,
    /// Line size in 64-bit words
    pub line: u32,
    pub tmem: u32,
    pub palette: u8,
    pub cms: u8,
    pub cmt: u8,
    pub mask_s: u8,
    pub mask_t: u8,
    pub shift_s: u8,
    pub shift_t: u8,
    pub uls: u32,
    pub ult: u32,
    pub lrs: u32,
    pub lrt: u32,
}

impl TileDescriptor {
    /// Parse `G_SETTILE`
    pub fn from_set_tile(w0: u32, w1: u32) -> Self {
        Self {
            format: ((w0 >> 16) & 0xF8) as u8,
            tmem: w0 & 0x1FF,
            line: (w0 >> 9) & 0x1FF,
            palette: ((w1 >> 20) & 0xF) as u8,
            cmt: ((w1 >> 18) & 0x3) as u8,
            mask_t: ((w1 >> 14) & 0xF) as u8,
            shift_t: ((w1 >> 10) & 0xF) as u8,
            cms: ((w1 >> 8) & 0x3) as u8,
            mask_s: ((w1 >> 4) & 0xF) as u8,
            shift_s: (w1 & 0xF) as u8,
            ..Self::default()
        }
    }

    /// Apply `G_SETTILESIZE`; coordinates are the integer parts of the 10.2 values
    pub fn set_size(&mut self, w0: u32, w1: u32) {
        self.uls = (w0 >> 14) & 0x3FF;
        self.ult = (w0 >> 2) & 0x3FF;
        self.lrs = (w1 >> 14) & 0x3FF;
        self.lrt = (w1 >> 2) & 0x3FF;
    }

    pub fn wrap_s(&self) -> WrapMode {
        WrapMode::from_cm(self.cms)
    }

    pub fn wrap_t(&self) -> WrapMode {
        WrapMode::from_cm(self.cmt)
    }

    pub fn texel_format(&self) -> Option<TexelFormat> {
        TexelFormat::from_code(self.format)
    }

    fn tile_width(&self) -> u32 {
        (self.lrs + 1).saturating_sub(self.uls)
    }

    fn tile_height(&self) -> u32 {
        (self.lrt + 1).saturating_sub(self.ult)
    }

    /// Texture dimensions in texels
    ///
    /// Each axis takes the mask size when a mask is set and fits in TMEM,
    /// else the tile rectangle when it fits, else the line size. Formats
    /// without a TMEM limit use the tile rectangle.
    pub fn texture_size(&self) -> (u32, u32) {
        let tile_w = self.tile_width();
        let tile_h = self.tile_height();

        let Some((max_texel, line_shift)) = tmem_limits(self.format) else {
            return (tile_w.max(1), tile_h.max(1));
        };

        let line_w = self.line << line_shift;
        let line_h = if line_w == 0 {
            0
        } else {
            (max_texel / line_w).min(tile_h)
        };

        let mask_w = 1u32 << self.mask_s;
        let mask_h = 1u32 << self.mask_t;
        let mask_fits = mask_w * mask_h <= max_texel;
        let tile_fits = tile_w * tile_h <= max_texel;

        let width = if self.mask_s > 0 && mask_fits {
            mask_w
        } else if tile_fits {
            tile_w
        } else {
            line_w
        };
        let height = if self.mask_t > 0 && mask_fits {
            mask_h
        } else if tile_fits {
            tile_h
        } else {
            line_h
        };

        (width.max(1), height.max(1))
    }
}

/// TMEM texel capacity and line-size shift for each format code
fn tmem_limits(code: u8) -> Option<(u32, u32)> {
    match code {
        0x00 | 0x40 => Some((4096, 4)),
        0x60 | 0x80 => Some((8196, 4)),
        0x08 | 0x48 => Some((2048, 3)),
        0x68 | 0x88 => Some((4096, 3)),
        0x10 | 0x70 => Some((2048, 2)),
        0x50 | 0x90 => Some((2048, 0)),
        0x18 => Some((1024, 2)),
        _ => None,
    }
}

/// A texture converted to a canonical layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedTexture {
    /// Session-unique id, increasing in decode order
    pub id: u32,
    pub address: SegmentedAddress,
    pub format: u8,
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    /// CRC-32 of `pixels`
    pub checksum: u32,
    #[serde(skip)]
    pub pixels: Vec<u8>,
}

impl DecodedTexture {
    pub fn new(
        id: u32,
        tile: &TileDescriptor,
        width: u32,
        height: u32,
        decoded: DecodedPixels,
    ) -> Self {
        Self {
            id,
            address: tile.address,
            format: tile.format,
            width,
            height,
            layout: decoded.layout,
            wrap_s: tile.wrap_s(),
            wrap_t: tile.wrap_t(),
            checksum: crc32fast::hash(&decoded.pixels),
            pixels: decoded.pixels,
        }
    }

    /// Pixels widened to RGBA8
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self.layout {
            PixelLayout::Rgba8 => self.pixels.clone(),
            PixelLayout::I8A8 => gbi_core::graphics::ColorOps::i8a8_to_rgba8(&self.pixels),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(format: u8, line: u32, mask_s: u8, mask_t: u8, lrs: u32, lrt: u32) -> TileDescriptor {
        TileDescriptor {
            format,
            line,
            mask_s,
            mask_t,
            lrs,
            lrt,
            ..TileDescriptor::default()
        }
    }

    #[test]
    fn test_set_texture_image() {
        // RGBA 16-bit, width 32
        let image = TextureImage::from_words(0xFD10_001F, 0x0600_1000);
        assert_eq!(image.format, 0);
        assert_eq!(image.size, 2);
        assert_eq!(image.width, 32);
        assert_eq!(image.address, SegmentedAddress(0x0600_1000));
    }

    #[test]
    fn test_set_tile_fields() {
        // RGBA16, line 8, tmem 0; palette 3, cmt mirror, maskT 5, cms clamp, maskS 5
        let w0 = 0xF510_1000;
        let w1 = (3 << 20) | (1 << 18) | (5 << 14) | (2 << 8) | (5 << 4);
        let tile = TileDescriptor::from_set_tile(w0, w1);
        assert_eq!(tile.format, 0x10);
        assert_eq!(tile.line, 8);
        assert_eq!(tile.tmem, 0);
        assert_eq!(tile.palette, 3);
        assert_eq!(tile.wrap_t(), WrapMode::MirroredRepeat);
        assert_eq!(tile.wrap_s(), WrapMode::ClampToEdge);
        assert_eq!(tile.mask_s, 5);
        assert_eq!(tile.mask_t, 5);
    }

    #[test]
    fn test_set_tile_size() {
        let mut tile = TileDescriptor::default();
        // (0,0) .. (31,31) in 10.2 fixed point
        tile.set_size(0xF200_0000, 0x0007_C07C);
        assert_eq!((tile.uls, tile.ult, tile.lrs, tile.lrt), (0, 0, 31, 31));
    }

    #[test]
    fn test_wrap_modes() {
        assert_eq!(WrapMode::from_cm(0), WrapMode::Repeat);
        assert_eq!(WrapMode::from_cm(1), WrapMode::MirroredRepeat);
        assert_eq!(WrapMode::from_cm(2), WrapMode::ClampToEdge);
        assert_eq!(WrapMode::from_cm(3), WrapMode::ClampToEdge);
    }

    #[test]
    fn test_texture_size_from_mask() {
        // RGBA16 32x32 with masks of 5
        assert_eq!(tile(0x10, 8, 5, 5, 31, 31).texture_size(), (32, 32));
    }

    #[test]
    fn test_texture_size_mask_wins_over_oversized_rect() {
        // RGBA16 64x64 rect is over the 2048 texel budget; masks of 5 give 32x32
        assert_eq!(tile(0x10, 16, 5, 5, 63, 63).texture_size(), (32, 32));
    }

    #[test]
    fn test_texture_size_from_tile_rect() {
        assert_eq!(tile(0x10, 8, 0, 0, 31, 15).texture_size(), (32, 16));
    }

    #[test]
    fn test_texture_size_oversized_mask_falls_back() {
        // 64x64 mask exceeds 2048 texels; the tile rect fits
        assert_eq!(tile(0x10, 8, 6, 6, 31, 31).texture_size(), (32, 32));
    }

    #[test]
    fn test_texture_size_from_line() {
        // Tile rect 64x64 does not fit in 2048 texels: line 8 << 2 = 32 wide,
        // 2048 / 32 = 64 lines, capped by the tile height
        assert_eq!(tile(0x10, 8, 0, 0, 63, 63).texture_size(), (32, 64));
    }

    #[test]
    fn test_texture_size_unknown_format() {
        assert_eq!(tile(0xA0, 0, 0, 0, 7, 3).texture_size(), (8, 4));
    }

    #[test]
    fn test_texture_size_never_zero() {
        // Oversized rect and zero line
        assert_eq!(tile(0x10, 0, 0, 0, 63, 63).texture_size(), (1, 1));
    }

    #[test]
    fn test_decoded_texture_to_rgba() {
        let t = tile(0x88, 1, 0, 0, 1, 0);
        let decoded = decode_texels(0x88, &[0x10, 0x20], 2, 1, None);
        let texture = DecodedTexture::new(0, &t, 2, 1, decoded);
        assert_eq!(texture.layout, PixelLayout::I8A8);
        assert_eq!(
            texture.to_rgba8(),
            vec![0x10, 0x10, 0x10, 0x10, 0x20, 0x20, 0x20, 0x20]
        );
        assert_eq!(texture.checksum, crc32fast::hash(&[0x10, 0x10, 0x20, 0x20]));
    }
}
