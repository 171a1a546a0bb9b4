//! Core primitives shared by the display-list decoder and its front ends.

pub mod graphics;
pub mod logging;
pub mod memory;

pub mod types {
    use serde::{Deserialize, Serialize};

    /// Canonical in-memory layout of a decoded pixel buffer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum PixelLayout {
        /// Four bytes per pixel: R, G, B, A
        Rgba8,
        /// Two bytes per pixel: intensity, alpha
        I8A8,
    }

    impl PixelLayout {
        pub fn bytes_per_pixel(self) -> usize {
            match self {
                PixelLayout::Rgba8 => 4,
                PixelLayout::I8A8 => 2,
            }
        }

        /// Size of a `width` x `height` buffer in this layout
        pub fn buffer_len(self, width: u32, height: u32) -> usize {
            width as usize * height as usize * self.bytes_per_pixel()
        }
    }
}

pub use memory::{BackingImage, BankTable, BankedImage, MemoryResolver, SegmentedAddress};

#[cfg(test)]
mod tests {
    use super::types::PixelLayout;

    #[test]
    fn pixel_layout_sizes() {
        assert_eq!(PixelLayout::Rgba8.bytes_per_pixel(), 4);
        assert_eq!(PixelLayout::I8A8.bytes_per_pixel(), 2);
        assert_eq!(PixelLayout::Rgba8.buffer_len(32, 16), 2048);
        assert_eq!(PixelLayout::I8A8.buffer_len(0, 16), 0);
    }
}
