//! Channel expansion helpers for packed texel formats
//!
//! Packed texels store channels with fewer than eight bits. Expansion
//! replicates the high bits into the low bits so that the full-scale value
//! maps to 0xFF and zero stays zero.

/// Color operation utilities
pub struct ColorOps;

impl ColorOps {
    /// Expand a 4-bit channel by nibble replication (`0xA` -> `0xAA`)
    ///
    /// # Example
    ///
    /// ```
    /// use gbi_core::graphics::ColorOps;
    ///
    /// assert_eq!(ColorOps::expand_4bit(0xA), 0xAA);
    /// assert_eq!(ColorOps::expand_4bit(0xF), 0xFF);
    /// ```
    #[inline]
    pub fn expand_4bit(nibble: u8) -> u8 {
        let n = nibble & 0x0F;
        (n << 4) | n
    }

    /// Expand a 5-bit channel to 8 bits as `(c << 3) | (c >> 2)`
    #[inline]
    pub fn expand_5bit(channel: u8) -> u8 {
        let c = channel & 0x1F;
        (c << 3) | (c >> 2)
    }

    /// Decode one 5-5-5-1 texel into RGBA8
    ///
    /// # Example
    ///
    /// ```
    /// use gbi_core::graphics::ColorOps;
    ///
    /// assert_eq!(ColorOps::rgba5551_to_rgba8(0xF801), [255, 0, 0, 255]);
    /// ```
    #[inline]
    pub fn rgba5551_to_rgba8(texel: u16) -> [u8; 4] {
        let r = ((texel >> 11) & 0x1F) as u8;
        let g = ((texel >> 6) & 0x1F) as u8;
        let b = ((texel >> 1) & 0x1F) as u8;
        let a = if texel & 0x0001 != 0 { 0xFF } else { 0x00 };
        [
            Self::expand_5bit(r),
            Self::expand_5bit(g),
            Self::expand_5bit(b),
            a,
        ]
    }

    /// Widen intensity-alpha pairs to RGBA8 (intensity copied to R, G and B)
    pub fn i8a8_to_rgba8(pixels: &[u8]) -> Vec<u8> {
        pixels
            .chunks_exact(2)
            .flat_map(|ia| [ia[0], ia[0], ia[0], ia[1]])
            .collect()
    }
}
