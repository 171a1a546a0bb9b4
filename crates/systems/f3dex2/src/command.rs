//! Emitted render commands and the backend they replay into
//!
//! The decoder never talks to a GPU. It records [`Command`]s in emission
//! order; a [`RenderBackend`] implementation turns them into real draw calls
//! by replaying them in that same order.
//!
//! ```text
//! Interpreter -> Vec<Command> -> Command::apply -> RenderBackend
//! ```

use std::sync::Arc;

use crate::render_state::{BlendMode, CullMode, GeometryState, RenderModeState};
use crate::texture::DecodedTexture;
use crate::vertex::VertexBuffer;

/// Capability surface a renderer exposes to replayed commands
pub trait RenderBackend {
    fn bind_vertex_buffer(&mut self, buffer: &VertexBuffer);

    fn bind_index_buffer(&mut self, indices: &[u8]);

    fn set_cull_mode(&mut self, mode: CullMode);

    fn set_depth_test(&mut self, enabled: bool);

    fn set_depth_write(&mut self, enabled: bool);

    /// Decal surfaces are drawn with a depth bias
    fn set_polygon_offset(&mut self, enabled: bool);

    fn set_blend_mode(&mut self, mode: BlendMode);

    /// 1: coverage times alpha, 2: alpha as coverage, 0: off
    fn set_alpha_test_mode(&mut self, mode: u8);

    fn set_use_vertex_colors(&mut self, enabled: bool);

    /// Bind a texture; `scale` multiplies the vertex texture coordinates
    fn bind_texture(&mut self, texture: &DecodedTexture, scale: [f32; 2]);

    /// Draw `triangles` triangles from the bound vertex and index buffers
    fn draw_indexed_triangles(&mut self, triangles: usize);
}

/// A texture binding together with the `G_TEXTURE` scale in effect
#[derive(Debug, Clone, PartialEq)]
pub struct TextureBinding {
    pub texture: Arc<DecodedTexture>,
    pub scale: [f32; 2],
}

/// One recorded render operation
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetGeometryMode(GeometryState),
    SetRenderMode(RenderModeState),
    BindTexture(TextureBinding),
    DrawTriangles {
        vertices: Arc<VertexBuffer>,
        /// Three slot indices per triangle
        indices: Vec<u8>,
    },
}

impl Command {
    /// Stable name, used for summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Command::SetGeometryMode(_) => "set_geometry_mode",
            Command::SetRenderMode(_) => "set_render_mode",
            Command::BindTexture(_) => "bind_texture",
            Command::DrawTriangles { .. } => "draw_triangles",
        }
    }

    /// Perform this command's effect on `backend`
    pub fn apply(&self, backend: &mut dyn RenderBackend) {
        match self {
            Command::SetGeometryMode(state) => {
                backend.set_cull_mode(state.cull);
                backend.set_use_vertex_colors(state.use_vertex_colors);
            }
            Command::SetRenderMode(state) => {
                backend.set_depth_test(state.depth_test);
                backend.set_depth_write(state.depth_write);
                backend.set_polygon_offset(state.polygon_offset);
                backend.set_blend_mode(state.blend);
                backend.set_alpha_test_mode(state.alpha_test);
            }
            Command::BindTexture(binding) => {
                backend.bind_texture(&binding.texture, binding.scale);
            }
            Command::DrawTriangles { vertices, indices } => {
                backend.bind_vertex_buffer(vertices);
                backend.bind_index_buffer(indices);
                backend.draw_indexed_triangles(indices.len() / 3);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::{Vertex, VERTEX_CACHE_SIZE};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl RenderBackend for Recorder {
        fn bind_vertex_buffer(&mut self, buffer: &VertexBuffer) {
            self.calls.push(format!("vb {}", buffer.id));
        }
        fn bind_index_buffer(&mut self, indices: &[u8]) {
            self.calls.push(format!("ib {:?}", indices));
        }
        fn set_cull_mode(&mut self, mode: CullMode) {
            self.calls.push(format!("cull {:?}", mode));
        }
        fn set_depth_test(&mut self, enabled: bool) {
            self.calls.push(format!("depth_test {}", enabled));
        }
        fn set_depth_write(&mut self, enabled: bool) {
            self.calls.push(format!("depth_write {}", enabled));
        }
        fn set_polygon_offset(&mut self, enabled: bool) {
            self.calls.push(format!("offset {}", enabled));
        }
        fn set_blend_mode(&mut self, mode: BlendMode) {
            self.calls.push(format!("blend {:?}", mode));
        }
        fn set_alpha_test_mode(&mut self, mode: u8) {
            self.calls.push(format!("alpha {}", mode));
        }
        fn set_use_vertex_colors(&mut self, enabled: bool) {
            self.calls.push(format!("vertex_colors {}", enabled));
        }
        fn bind_texture(&mut self, texture: &DecodedTexture, scale: [f32; 2]) {
            self.calls
                .push(format!("texture {} {:?}", texture.id, scale));
        }
        fn draw_indexed_triangles(&mut self, triangles: usize) {
            self.calls.push(format!("draw {}", triangles));
        }
    }

    #[test]
    fn test_apply_geometry_and_render_mode() {
        let mut backend = Recorder::default();
        Command::SetGeometryMode(GeometryState::from_mode(0x400)).apply(&mut backend);
        Command::SetRenderMode(RenderModeState::from_render_mode(0x4030)).apply(&mut backend);
        assert_eq!(
            backend.calls,
            vec![
                "cull Back",
                "vertex_colors true",
                "depth_test true",
                "depth_write true",
                "offset false",
                "blend Additive",
                "alpha 0",
            ]
        );
    }

    #[test]
    fn test_apply_draw() {
        let vertices = Arc::new(VertexBuffer {
            id: 4,
            vertices: [Vertex::default(); VERTEX_CACHE_SIZE],
        });
        let command = Command::DrawTriangles {
            vertices,
            indices: vec![0, 1, 2, 2, 1, 3],
        };
        assert_eq!(command.kind(), "draw_triangles");

        let mut backend = Recorder::default();
        command.apply(&mut backend);
        assert_eq!(
            backend.calls,
            vec!["vb 4", "ib [0, 1, 2, 2, 1, 3]", "draw 2"]
        );
    }
}
