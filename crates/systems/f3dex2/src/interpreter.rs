//! F3DEX2 display-list interpreter
//!
//! Walks a display list against a segmented memory image and records what a
//! renderer needs to draw it: vertex buffers, decoded textures, render state
//! and draw calls, in order.
//!
//! # Execution model
//!
//! One [`Interpreter`] is one decode session. Sub-lists called with `G_DL`
//! share all of its state; the return addresses live on an explicit stack so
//! that a malformed or cyclic list can never overflow the native stack.
//! Both the call depth and the number of executed instructions are bounded
//! by [`DecodeLimits`](crate::DecodeLimits). Tripping a bound stops the
//! session and keeps everything emitted so far. A texture-load block only
//! takes the seven-instruction fast path when all seven fit under the
//! instruction limit; otherwise it runs one instruction at a time, so a
//! session never executes more than `max_instructions`.
//!
//! `G_DL` follows the microcode: bits 16..23 of the first word equal to 1
//! mark a branch (`G_DL_NOPUSH`) that replaces the current list and never
//! returns, and any other value is a call that returns after the sub-list's
//! `G_ENDDL`. Readers that treat every `G_DL` as a call will decode more of
//! a list that branches than this interpreter does.
//!
//! Nothing read from the image is trusted. Unmapped addresses skip the
//! instruction that used them; a list whose next instruction cannot be read
//! ends as if it had reached `G_ENDDL`.

use gbi_core::logging::{log, LogCategory, LogLevel};
use gbi_core::{MemoryResolver, SegmentedAddress};

use crate::command::{Command, TextureBinding};
use crate::matrix::{Mat4, MatrixStack};
use crate::opcode::{
    matches_texture_load_idiom, Instruction, Opcode, INSTRUCTION_SIZE, TEXTURE_LOAD_IDIOM,
};
use crate::render_state::{update_geometry_mode, GeometryState, OtherModeUpdate, RenderModeState};
use crate::texture::{
    decode_texels, DecodedPixels, DecodedTexture, Palette, TextureCache, TextureImage,
    TextureKey, TileDescriptor,
};
use crate::vertex::{VertexCache, VERTEX_CACHE_SIZE};
use crate::{DecodeError, DecodeOptions, DecodeResult, DecodeStats};

/// What the interpreter does after an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    /// `G_ENDDL`: return to the caller, or finish
    End,
    Call(SegmentedAddress),
    Branch(SegmentedAddress),
}

/// State of one decode session
pub struct Interpreter<'m, R: MemoryResolver + ?Sized> {
    memory: &'m R,
    options: DecodeOptions,

    matrices: MatrixStack,
    /// 24-bit geometry mode
    geometry_mode: u32,
    other_mode_l: u32,

    texture_image: Option<TextureImage>,
    tile: TileDescriptor,
    /// Loaded by the last texture block, bound on the next draw
    pending_texture: Option<TileDescriptor>,
    palette: Option<Palette>,
    texture_scale: [f32; 2],

    vertices: VertexCache,
    textures: TextureCache,

    commands: Vec<Command>,
    stats: DecodeStats,
}

impl<'m, R: MemoryResolver + ?Sized> Interpreter<'m, R> {
    pub fn new(memory: &'m R, options: DecodeOptions) -> Self {
        Self {
            memory,
            options,
            matrices: MatrixStack::new(),
            geometry_mode: 0,
            other_mode_l: 0,
            texture_image: None,
            tile: TileDescriptor::default(),
            pending_texture: None,
            palette: None,
            texture_scale: [1.0, 1.0],
            vertices: VertexCache::new(),
            textures: TextureCache::new(),
            commands: Vec::new(),
            stats: DecodeStats::default(),
        }
    }

    pub fn geometry_mode(&self) -> u32 {
        self.geometry_mode
    }

    pub fn other_mode_l(&self) -> u32 {
        self.other_mode_l
    }

    pub fn current_matrix(&self) -> &Mat4 {
        self.matrices.current()
    }

    pub fn vertices(&self) -> &VertexCache {
        &self.vertices
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Execute the list at `start` and everything it calls
    ///
    /// Returns the reason the session stopped early, if it did.
    pub fn execute(&mut self, start: SegmentedAddress) -> Option<DecodeError> {
        if self.memory.resolve(start).is_none() {
            log(LogCategory::Interpreter, LogLevel::Warn, || {
                format!("display list start {} is unmapped", start)
            });
            return None;
        }

        let limits = self.options.limits;
        let mut returns: Vec<SegmentedAddress> = Vec::new();
        let mut pc = start;

        loop {
            if self.stats.instructions >= limits.max_instructions {
                let err = DecodeError::InstructionLimit {
                    limit: limits.max_instructions,
                };
                log(LogCategory::Interpreter, LogLevel::Warn, || err.to_string());
                return Some(err);
            }

            let Some(instruction) = self.read_instruction(pc) else {
                log(LogCategory::Interpreter, LogLevel::Warn, || {
                    format!("display list read past the image at {}; ending list", pc)
                });
                match returns.pop() {
                    Some(ret) => {
                        pc = ret;
                        continue;
                    }
                    None => return None,
                }
            };

            let idiom_len = TEXTURE_LOAD_IDIOM.len();
            let idiom_fits = self.stats.instructions + idiom_len <= limits.max_instructions;
            if instruction.opcode_byte() == Opcode::SETTIMG && idiom_fits {
                if let Some(block) = self.read_idiom_window(pc) {
                    self.stats.instructions += idiom_len;
                    self.load_texture_block(&block);
                    pc = pc.add(INSTRUCTION_SIZE * idiom_len as u32);
                    continue;
                }
            }

            self.stats.instructions += 1;
            match self.step(instruction) {
                Flow::Next => pc = pc.add(INSTRUCTION_SIZE),
                Flow::End => match returns.pop() {
                    Some(ret) => pc = ret,
                    None => return None,
                },
                Flow::Call(target) => {
                    if returns.len() >= limits.max_call_depth {
                        let err = DecodeError::CallDepthExceeded {
                            depth: returns.len() + 1,
                            address: target,
                        };
                        log(LogCategory::Interpreter, LogLevel::Warn, || err.to_string());
                        return Some(err);
                    }
                    returns.push(pc.add(INSTRUCTION_SIZE));
                    pc = target;
                }
                Flow::Branch(target) => pc = target,
            }
        }
    }

    /// Consume the session and collect its output
    pub fn finish(self, truncated: Option<DecodeError>) -> DecodeResult {
        let mut stats = self.stats;
        stats.vertex_uploads = self.vertices.uploads();
        stats.texture_decodes = self.textures.decodes();
        stats.texture_cache_hits = self.textures.hits();
        DecodeResult {
            commands: self.commands,
            textures: self.textures.into_textures(),
            stats,
            truncated,
        }
    }

    fn read_instruction(&self, addr: SegmentedAddress) -> Option<Instruction> {
        let offset = self.memory.resolve(addr)?;
        let w0 = self.memory.read_u32(offset)?;
        let w1 = self.memory.read_u32(offset.checked_add(4)?)?;
        Some(Instruction::new(w0, w1))
    }

    /// The seven instructions at `pc`, if they form a texture-load block
    fn read_idiom_window(&self, pc: SegmentedAddress) -> Option<[Instruction; 7]> {
        let mut window = [Instruction::default(); 7];
        for (i, slot) in window.iter_mut().enumerate() {
            *slot = self.read_instruction(pc.add(INSTRUCTION_SIZE * i as u32))?;
        }
        matches_texture_load_idiom(&window).then_some(window)
    }

    /// Execute a single instruction
    fn step(&mut self, instruction: Instruction) -> Flow {
        let Instruction { w0, w1 } = instruction;
        match instruction.opcode() {
            Opcode::Vtx => {
                let count = instruction.w0_bits(12, 8);
                let first = instruction.w0_bits(1, 7) as i32 - count as i32;
                let matrix = *self.matrices.current();
                self.vertices
                    .load(self.memory, SegmentedAddress(w1), first, count, &matrix);
                Flow::Next
            }
            Opcode::Tri1 => {
                self.draw_triangles(&[triangle_indices(w0)]);
                Flow::Next
            }
            Opcode::Tri2 => {
                self.draw_triangles(&[triangle_indices(w0), triangle_indices(w1)]);
                Flow::Next
            }
            Opcode::Texture => {
                self.texture_scale = [
                    ((w1 >> 16) + 1) as f32 / 65536.0,
                    ((w1 & 0xFFFF) + 1) as f32 / 65536.0,
                ];
                Flow::Next
            }
            Opcode::PopMtx => {
                self.matrices.pop();
                Flow::Next
            }
            Opcode::GeometryMode => {
                self.geometry_mode = update_geometry_mode(self.geometry_mode, w0, w1);
                self.commands.push(Command::SetGeometryMode(GeometryState::from_mode(
                    self.geometry_mode,
                )));
                Flow::Next
            }
            Opcode::Mtx => {
                self.load_matrix(w1);
                Flow::Next
            }
            Opcode::Dl => {
                let target = SegmentedAddress(w1);
                if self.memory.resolve(target).is_none() {
                    log(LogCategory::Interpreter, LogLevel::Warn, || {
                        format!("G_DL target {} is unmapped; skipping", target)
                    });
                    return Flow::Next;
                }
                if instruction.w0_bits(16, 8) == 1 {
                    Flow::Branch(target)
                } else {
                    Flow::Call(target)
                }
            }
            Opcode::EndDl => Flow::End,
            Opcode::SetOtherModeL => {
                let update = OtherModeUpdate::decode(w0, w1);
                self.other_mode_l = update.apply(self.other_mode_l);
                if update.is_render_mode() {
                    self.commands
                        .push(Command::SetRenderMode(RenderModeState::from_render_mode(w1)));
                }
                Flow::Next
            }
            Opcode::LoadTlut => {
                self.load_palette(w1);
                Flow::Next
            }
            Opcode::SetTileSize => {
                self.tile.set_size(w0, w1);
                Flow::Next
            }
            Opcode::SetTile => {
                self.tile = TileDescriptor::from_set_tile(w0, w1);
                Flow::Next
            }
            Opcode::SetTImg => {
                self.texture_image = Some(TextureImage::from_words(w0, w1));
                Flow::Next
            }
            Opcode::SetOtherModeH
            | Opcode::RdpLoadSync
            | Opcode::RdpPipeSync
            | Opcode::LoadBlock
            | Opcode::SetPrimColor
            | Opcode::SetEnvColor
            | Opcode::SetCombine => {
                log(LogCategory::Stubs, LogLevel::Trace, || {
                    format!("ignoring {:?}", instruction)
                });
                Flow::Next
            }
            Opcode::Unknown(byte) => {
                log(LogCategory::Stubs, LogLevel::Trace, || {
                    format!("skipping unknown opcode {:#04X}", byte)
                });
                Flow::Next
            }
        }
    }

    /// `G_MTX`: push, then multiply the loaded matrix onto the current one
    fn load_matrix(&mut self, w1: u32) {
        let mut addr = w1;
        if addr & 0x8000_0000 != 0 {
            self.matrices.pop();
            addr &= 0x7FFF_FFFF;
        }

        self.geometry_mode = 0;
        self.other_mode_l = 0;
        self.matrices.push();

        let addr = SegmentedAddress(addr);
        match Mat4::load(self.memory, addr) {
            Some(m) => self.matrices.multiply(&m),
            None => log(LogCategory::Matrix, LogLevel::Warn, || {
                format!("G_MTX: matrix at {} is unmapped or truncated", addr)
            }),
        }
    }

    /// `G_LOADTLUT`: read the palette from the current texture image
    fn load_palette(&mut self, w1: u32) {
        let count = (((w1 & 0x00FF_F000) >> 14) + 1) as usize;
        let Some(image) = self.texture_image else {
            log(LogCategory::Texture, LogLevel::Warn, || {
                "G_LOADTLUT without a texture image".to_string()
            });
            return;
        };
        let Some(offset) = self.memory.resolve(image.address) else {
            log(LogCategory::Texture, LogLevel::Warn, || {
                format!("G_LOADTLUT: palette at {} is unmapped", image.address)
            });
            return;
        };
        let palette = Palette::from_rgba5551(self.source_bytes(offset, count * 2), count);
        log(LogCategory::Texture, LogLevel::Debug, || {
            format!("loaded {} palette entries from {}", palette.len(), image.address)
        });
        self.palette = Some(palette);
    }

    /// Apply a recognised texture-load block
    fn load_texture_block(&mut self, block: &[Instruction; 7]) {
        let tile_index = block[5].w1_bits(24, 3);
        if tile_index != 0 {
            log(LogCategory::Texture, LogLevel::Debug, || {
                format!("ignoring texture load into tile {}", tile_index)
            });
            return;
        }

        let image = TextureImage::from_words(block[0].w0, block[0].w1);
        self.texture_image = Some(image);
        self.tile = TileDescriptor::from_set_tile(block[5].w0, block[5].w1);
        self.tile.set_size(block[6].w0, block[6].w1);
        self.tile.address = image.address;
        self.pending_texture = Some(self.tile);
    }

    /// Decode or look up the pending texture and bind it
    fn resolve_pending_texture(&mut self) {
        let Some(tile) = self.pending_texture.take() else {
            return;
        };

        let (width, height) = tile.texture_size();
        let offset = self.memory.resolve(tile.address);
        let is_ci = tile.texel_format().is_some_and(|f| f.is_color_indexed());
        let key = TextureKey {
            offset,
            format: tile.format,
            width,
            height,
            palette: if is_ci {
                self.palette.as_ref().map(Palette::checksum)
            } else {
                None
            },
        };

        let memory = self.memory;
        let palette = self.palette.as_ref();
        let (texture, _) = self.textures.get_or_decode(key, |id| {
            let pixels = match (offset, tile.texel_format()) {
                (Some(offset), Some(format)) => {
                    let len = format.source_len(width as usize * height as usize);
                    let src = clamped_slice(memory.bytes(), offset, len);
                    decode_texels(tile.format, src, width, height, palette)
                }
                (None, _) => {
                    log(LogCategory::Texture, LogLevel::Warn, || {
                        format!("texture source {} is unmapped", tile.address)
                    });
                    DecodedPixels::zeroed(tile.format, width, height)
                }
                (Some(_), None) => decode_texels(tile.format, &[], width, height, palette),
            };
            DecodedTexture::new(id, &tile, width, height, pixels)
        });

        self.commands.push(Command::BindTexture(TextureBinding {
            texture,
            scale: self.texture_scale,
        }));
    }

    /// Emit one draw for the triangles whose indices are all in range
    fn draw_triangles(&mut self, triangles: &[[u8; 3]]) {
        let mut indices = Vec::with_capacity(triangles.len() * 3);
        for tri in triangles {
            if tri.iter().all(|&i| (i as usize) < VERTEX_CACHE_SIZE) {
                indices.extend_from_slice(tri);
            } else {
                log(LogCategory::Vertex, LogLevel::Debug, || {
                    format!("dropping triangle {:?}: index outside the vertex cache", tri)
                });
            }
        }
        if indices.is_empty() {
            return;
        }

        self.resolve_pending_texture();
        let (vertices, _) = self.vertices.snapshot();
        self.commands.push(Command::DrawTriangles { vertices, indices });
    }

    fn source_bytes(&self, offset: usize, len: usize) -> &'m [u8] {
        let memory: &'m R = self.memory;
        clamped_slice(memory.bytes(), offset, len)
    }
}

/// The three 7-bit slot indices packed at bits 17, 9 and 1
fn triangle_indices(word: u32) -> [u8; 3] {
    [
        ((word >> 17) & 0x7F) as u8,
        ((word >> 9) & 0x7F) as u8,
        ((word >> 1) & 0x7F) as u8,
    ]
}

/// Up to `len` bytes from `offset`, cut short at the end of `bytes`
fn clamped_slice(bytes: &[u8], offset: usize, len: usize) -> &[u8] {
    let start = offset.min(bytes.len());
    let end = offset.saturating_add(len).min(bytes.len());
    &bytes[start..end]
}
