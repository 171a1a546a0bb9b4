//! Helpers for building display lists in a byte image

#![allow(dead_code)]

use gbi_core::{BackingImage, BankTable};
use gbi_f3dex2::render_state::{BlendMode, CullMode};
use gbi_f3dex2::{DecodedTexture, RenderBackend, VertexBuffer};

/// Segment every test image is mapped at
pub const SEGMENT: u32 = 0x06;

pub fn seg(offset: usize) -> u32 {
    (SEGMENT << 24) | offset as u32
}

/// A zeroed image with a write cursor for display-list words
pub struct ImageBuilder {
    pub mem: Vec<u8>,
}

impl ImageBuilder {
    pub fn new(size: usize) -> Self {
        Self {
            mem: vec![0u8; size],
        }
    }

    /// Write one instruction at `addr`, returning the next address
    pub fn cmd(&mut self, addr: usize, w0: u32, w1: u32) -> usize {
        self.mem[addr..addr + 4].copy_from_slice(&w0.to_be_bytes());
        self.mem[addr + 4..addr + 8].copy_from_slice(&w1.to_be_bytes());
        addr + 8
    }

    pub fn end(&mut self, addr: usize) -> usize {
        self.cmd(addr, 0xDF00_0000, 0)
    }

    /// `G_VTX` loading `count` vertices into slots starting at `first`
    pub fn vtx(&mut self, addr: usize, first: u32, count: u32, src: usize) -> usize {
        let w0 = 0x0100_0000 | (count << 12) | (((first + count) & 0x7F) << 1);
        self.cmd(addr, w0, seg(src))
    }

    pub fn tri1(&mut self, addr: usize, a: u32, b: u32, c: u32) -> usize {
        self.cmd(addr, 0x0500_0000 | tri_word(a, b, c), 0)
    }

    pub fn tri2(&mut self, addr: usize, t0: [u32; 3], t1: [u32; 3]) -> usize {
        self.cmd(
            addr,
            0x0600_0000 | tri_word(t0[0], t0[1], t0[2]),
            tri_word(t1[0], t1[1], t1[2]),
        )
    }

    pub fn call(&mut self, addr: usize, target: u32) -> usize {
        self.cmd(addr, 0xDE00_0000, target)
    }

    pub fn branch(&mut self, addr: usize, target: u32) -> usize {
        self.cmd(addr, 0xDE01_0000, target)
    }

    /// 16-byte vertex record
    pub fn vertex(&mut self, addr: usize, pos: [i16; 3], st: [i16; 2], rgba: [u8; 4]) {
        let rec = &mut self.mem[addr..addr + 16];
        rec[0..2].copy_from_slice(&pos[0].to_be_bytes());
        rec[2..4].copy_from_slice(&pos[1].to_be_bytes());
        rec[4..6].copy_from_slice(&pos[2].to_be_bytes());
        rec[6..8].fill(0);
        rec[8..10].copy_from_slice(&st[0].to_be_bytes());
        rec[10..12].copy_from_slice(&st[1].to_be_bytes());
        rec[12..16].copy_from_slice(&rgba);
    }

    /// A 16.16 fixed-point matrix at `addr` (values in column-major order)
    pub fn matrix(&mut self, addr: usize, values: [f32; 16]) {
        for (k, v) in values.iter().enumerate() {
            let fixed = (v * 65536.0) as i32 as u32;
            self.mem[addr + k * 2..addr + k * 2 + 2]
                .copy_from_slice(&((fixed >> 16) as u16).to_be_bytes());
            self.mem[addr + 32 + k * 2..addr + 32 + k * 2 + 2]
                .copy_from_slice(&(fixed as u16).to_be_bytes());
        }
    }

    /// The seven-instruction texture load of a `width` x `height` texture
    ///
    /// `format` is the format code (`class << 5 | size << 3`). Masks are
    /// derived from the dimensions, which must be powers of two.
    pub fn load_texture(
        &mut self,
        addr: usize,
        format: u8,
        width: u32,
        height: u32,
        src: usize,
    ) -> usize {
        self.load_texture_from(addr, format, width, height, seg(src), 0)
    }

    /// Texture load from any segmented address into tile `tile`
    pub fn load_texture_from(
        &mut self,
        addr: usize,
        format: u8,
        width: u32,
        height: u32,
        src: u32,
        tile: u32,
    ) -> usize {
        let fmt = (format as u32) << 16;
        let mask_s = width.trailing_zeros();
        let mask_t = height.trailing_zeros();
        let mut pc = addr;
        pc = self.cmd(pc, 0xFD00_0000 | fmt | (width - 1), src);
        pc = self.cmd(pc, 0xF500_0000 | fmt, 0x0700_0000);
        pc = self.cmd(pc, 0xE600_0000, 0);
        pc = self.cmd(pc, 0xF300_0000, 0x0700_0000);
        pc = self.cmd(pc, 0xE700_0000, 0);
        pc = self.cmd(
            pc,
            0xF500_0000 | fmt,
            (tile << 24) | (mask_t << 14) | (mask_s << 4),
        );
        self.cmd(
            pc,
            0xF200_0000,
            ((width - 1) << 14) | ((height - 1) << 2),
        )
    }

    pub fn build(self) -> BackingImage {
        BackingImage::from_bytes(self.mem)
    }
}

pub fn tri_word(a: u32, b: u32, c: u32) -> u32 {
    ((a * 2) << 16) | ((b * 2) << 8) | (c * 2)
}

pub fn banks() -> BankTable {
    BankTable::new().with_bank(SEGMENT as u8, 0, None)
}

/// Backend that records every call as a line of text
#[derive(Default)]
pub struct RecordingBackend {
    pub calls: Vec<String>,
}

impl RenderBackend for RecordingBackend {
    fn bind_vertex_buffer(&mut self, buffer: &VertexBuffer) {
        self.calls.push(format!("bind_vertex_buffer {}", buffer.id));
    }

    fn bind_index_buffer(&mut self, indices: &[u8]) {
        self.calls.push(format!("bind_index_buffer {:?}", indices));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.calls.push(format!("set_cull_mode {:?}", mode));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.calls.push(format!("set_depth_test {}", enabled));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.calls.push(format!("set_depth_write {}", enabled));
    }

    fn set_polygon_offset(&mut self, enabled: bool) {
        self.calls.push(format!("set_polygon_offset {}", enabled));
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.calls.push(format!("set_blend_mode {:?}", mode));
    }

    fn set_alpha_test_mode(&mut self, mode: u8) {
        self.calls.push(format!("set_alpha_test_mode {}", mode));
    }

    fn set_use_vertex_colors(&mut self, enabled: bool) {
        self.calls.push(format!("set_use_vertex_colors {}", enabled));
    }

    fn bind_texture(&mut self, texture: &DecodedTexture, scale: [f32; 2]) {
        self.calls.push(format!(
            "bind_texture {} {}x{} {:?}",
            texture.id, texture.width, texture.height, scale
        ));
    }

    fn draw_indexed_triangles(&mut self, triangles: usize) {
        self.calls.push(format!("draw_indexed_triangles {}", triangles));
    }
}
