//! Per-session memo of decoded textures

use std::collections::HashMap;
use std::sync::Arc;

use gbi_core::logging::{log, LogCategory, LogLevel};

use super::DecodedTexture;

/// Identity of a decoded texture
///
/// The resolved source offset alone is not enough: the same bytes read with
/// another format, size or palette decode to different pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKey {
    /// Resolved source offset; `None` when the source address is unmapped
    pub offset: Option<usize>,
    pub format: u8,
    pub width: u32,
    pub height: u32,
    /// Palette checksum, for colour-indexed formats only
    pub palette: Option<u32>,
}

#[derive(Debug, Default)]
pub struct TextureCache {
    entries: HashMap<TextureKey, Arc<DecodedTexture>>,
    textures: Vec<Arc<DecodedTexture>>,
    hits: u32,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the texture for `key`, decoding it on a miss
    ///
    /// `decode` receives the id the new texture must carry. The second value
    /// is true on a cache hit.
    pub fn get_or_decode<F>(&mut self, key: TextureKey, decode: F) -> (Arc<DecodedTexture>, bool)
    where
        F: FnOnce(u32) -> DecodedTexture,
    {
        if let Some(texture) = self.entries.get(&key) {
            self.hits += 1;
            log(LogCategory::Texture, LogLevel::Trace, || {
                format!("texture cache hit for {:?} -> #{}", key.offset, texture.id)
            });
            return (Arc::clone(texture), true);
        }

        let id = self.textures.len() as u32;
        let texture = Arc::new(decode(id));
        log(LogCategory::Texture, LogLevel::Debug, || {
            format!(
                "decoded texture #{} at {:?}: format {:#04X}, {}x{}",
                id, key.offset, key.format, texture.width, texture.height
            )
        });
        self.entries.insert(key, Arc::clone(&texture));
        self.textures.push(Arc::clone(&texture));
        (texture, false)
    }

    /// Number of decodes performed
    pub fn decodes(&self) -> u32 {
        self.textures.len() as u32
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    /// Every decoded texture, in decode order
    pub fn textures(&self) -> &[Arc<DecodedTexture>] {
        &self.textures
    }

    pub fn into_textures(self) -> Vec<Arc<DecodedTexture>> {
        self.textures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{decode_texels, TileDescriptor};

    fn key(offset: usize, palette: Option<u32>) -> TextureKey {
        TextureKey {
            offset: Some(offset),
            format: 0x88,
            width: 2,
            height: 1,
            palette,
        }
    }

    fn decode(id: u32) -> DecodedTexture {
        let tile = TileDescriptor {
            format: 0x88,
            ..TileDescriptor::default()
        };
        DecodedTexture::new(id, &tile, 2, 1, decode_texels(0x88, &[1, 2], 2, 1, None))
    }

    #[test]
    fn test_hit_returns_same_texture() {
        let mut cache = TextureCache::new();
        let (first, hit) = cache.get_or_decode(key(0x100, None), decode);
        assert!(!hit);
        let (second, hit) = cache.get_or_decode(key(0x100, None), |_| {
            panic!("must not decode on a hit")
        });
        assert!(hit);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.decodes(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_distinct_keys_decode_separately() {
        let mut cache = TextureCache::new();
        let (a, _) = cache.get_or_decode(key(0x100, None), decode);
        let (b, _) = cache.get_or_decode(key(0x200, None), decode);
        let (c, _) = cache.get_or_decode(key(0x100, Some(7)), decode);
        assert_eq!((a.id, b.id, c.id), (0, 1, 2));
        assert_eq!(cache.textures().len(), 3);
        assert_eq!(cache.hits(), 0);
    }
}
