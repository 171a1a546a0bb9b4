//! Vertex cache and vertex-buffer snapshots
//!
//! `G_VTX` writes transformed vertices into a 32-slot arena. Triangles index
//! into that arena, so every draw needs the arena contents as they were when
//! the draw was issued. The cache snapshots the whole arena into a new
//! [`VertexBuffer`] only when something was written since the last snapshot.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use gbi_core::logging::{log, LogCategory, LogLevel};
use gbi_core::{MemoryResolver, SegmentedAddress};

use crate::matrix::Mat4;

/// Number of vertex slots
pub const VERTEX_CACHE_SIZE: usize = 32;

/// Size of one vertex record in memory
pub const VERTEX_RECORD_SIZE: usize = 16;

/// One transformed vertex, laid out for direct upload
///
/// Stride is 36 bytes: position, texture coordinate, colour (or normal).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub const STRIDE: usize = std::mem::size_of::<Vertex>();

    /// Decode a 16-byte record and transform its position
    ///
    /// Layout (big-endian): x, y, z as i16 at 0, 2, 4; two padding bytes;
    /// s, t as 10.5 fixed point at 8, 10; four colour or normal bytes at 12.
    pub fn from_record(record: &[u8], matrix: &Mat4) -> Option<Vertex> {
        if record.len() < VERTEX_RECORD_SIZE {
            return None;
        }
        let i16_at = |i: usize| i16::from_be_bytes([record[i], record[i + 1]]) as f32;

        let position = matrix.transform_point([i16_at(0), i16_at(2), i16_at(4)]);
        let tex_coord = [i16_at(8) / 32.0, i16_at(10) / 32.0];
        let color = [
            record[12] as f32 / 255.0,
            record[13] as f32 / 255.0,
            record[14] as f32 / 255.0,
            record[15] as f32 / 255.0,
        ];

        Some(Vertex {
            position,
            tex_coord,
            color,
        })
    }
}

/// Immutable snapshot of the vertex arena, shared by every draw that uses it
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBuffer {
    /// Session-unique id, increasing in upload order
    pub id: u32,
    pub vertices: [Vertex; VERTEX_CACHE_SIZE],
}

impl VertexBuffer {
    /// Raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// The 32-slot vertex arena with a single dirty flag
#[derive(Debug, Clone)]
pub struct VertexCache {
    slots: [Vertex; VERTEX_CACHE_SIZE],
    dirty: bool,
    current: Option<Arc<VertexBuffer>>,
    next_id: u32,
}

impl VertexCache {
    pub fn new() -> Self {
        Self {
            slots: [Vertex::default(); VERTEX_CACHE_SIZE],
            dirty: false,
            current: None,
            next_id: 0,
        }
    }

    pub fn slot(&self, index: usize) -> Option<&Vertex> {
        self.slots.get(index)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of snapshots taken so far
    pub fn uploads(&self) -> u32 {
        self.next_id
    }

    /// Load `count` records starting at `addr` into slots `first..`
    ///
    /// Records that fall outside the arena or whose address does not
    /// resolve are skipped. Returns how many slots were written.
    pub fn load<R: MemoryResolver + ?Sized>(
        &mut self,
        memory: &R,
        addr: SegmentedAddress,
        first: i32,
        count: u32,
        matrix: &Mat4,
    ) -> usize {
        let mut written = 0;
        for i in 0..count {
            let slot = first + i as i32;
            if !(0..VERTEX_CACHE_SIZE as i32).contains(&slot) {
                log(LogCategory::Vertex, LogLevel::Debug, || {
                    format!("G_VTX: slot {} outside the vertex cache", slot)
                });
                continue;
            }

            let record_addr = addr.add(i * VERTEX_RECORD_SIZE as u32);
            let vertex = memory
                .resolve(record_addr)
                .and_then(|offset| memory.slice(offset, VERTEX_RECORD_SIZE))
                .and_then(|record| Vertex::from_record(record, matrix));

            match vertex {
                Some(vertex) => {
                    self.slots[slot as usize] = vertex;
                    self.dirty = true;
                    written += 1;
                }
                None => {
                    log(LogCategory::Vertex, LogLevel::Warn, || {
                        format!("G_VTX: unmapped vertex record at {}", record_addr)
                    });
                }
            }
        }
        written
    }

    /// The buffer draws should index into
    ///
    /// Takes a new snapshot when the arena changed since the last one, or
    /// when none was taken yet. The second value reports whether a new
    /// snapshot was made.
    pub fn snapshot(&mut self) -> (Arc<VertexBuffer>, bool) {
        if let Some(current) = &self.current {
            if !self.dirty {
                return (Arc::clone(current), false);
            }
        }

        let buffer = Arc::new(VertexBuffer {
            id: self.next_id,
            vertices: self.slots,
        });
        self.next_id += 1;
        self.dirty = false;
        self.current = Some(Arc::clone(&buffer));

        log(LogCategory::Vertex, LogLevel::Trace, || {
            format!("vertex buffer {} uploaded", buffer.id)
        });
        (buffer, true)
    }
}

impl Default for VertexCache {
    fn default() -> Self {
        Self::new()
    }
}
