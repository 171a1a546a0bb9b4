//! PNG export of decoded textures

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gbi_f3dex2::DecodedTexture;

/// File name for a texture: id, source address and format
pub fn texture_file_name(texture: &DecodedTexture) -> String {
    format!(
        "tex{:04}_{}_fmt{:02X}_{}x{}.png",
        texture.id, texture.address, texture.format, texture.width, texture.height
    )
}

/// Write one texture as an RGBA PNG
pub fn write_png(path: &Path, texture: &DecodedTexture) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), texture.width, texture.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&texture.to_rgba8())?;
    Ok(())
}

/// Write every texture into `dir`, returning the paths written
pub fn dump_textures<'a, I>(dir: &Path, textures: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = &'a DecodedTexture>,
{
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = Vec::new();
    for texture in textures {
        let path = dir.join(texture_file_name(texture));
        write_png(&path, texture)?;
        log::debug!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbi_f3dex2::texture::{decode_texels, TileDescriptor};

    fn texture() -> DecodedTexture {
        let tile = TileDescriptor {
            format: 0x88,
            address: gbi_core::SegmentedAddress(0x0600_1000),
            ..TileDescriptor::default()
        };
        DecodedTexture::new(3, &tile, 2, 2, decode_texels(0x88, &[0, 64, 128, 255], 2, 2, None))
    }

    #[test]
    fn test_texture_file_name() {
        assert_eq!(
            texture_file_name(&texture()),
            "tex0003_06001000_fmt88_2x2.png"
        );
    }

    #[test]
    fn test_dump_round_trip() {
        let dir = std::env::temp_dir().join(format!("gbi-dump-{}", std::process::id()));
        let texture = texture();
        let written = dump_textures(&dir, [&texture]).unwrap();
        assert_eq!(written.len(), 1);

        let decoder = png::Decoder::new(File::open(&written[0]).unwrap());
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (2, 2));
        assert_eq!(&buf[..info.buffer_size()], texture.to_rgba8().as_slice());

        let _ = fs::remove_dir_all(&dir);
    }
}
