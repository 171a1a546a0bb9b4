//! F3DEX2 display-list decoder
//!
//! Reconstructs renderable scene data from an F3DEX2 display list stored in
//! a segmented memory image: transformed vertex buffers, decoded textures,
//! and the ordered render commands that tie them together.
//!
//! # Architecture
//!
//! ```text
//! MemoryResolver -> Interpreter -> { VertexCache, MatrixStack, TextureCache }
//!                        |
//!                        v
//!                  DecodeResult { commands, textures, stats }
//!                        |
//!                        v  (replay)
//!                  RenderBackend
//! ```
//!
//! A decode is a single synchronous session. Nothing is shared between
//! sessions, including the texture cache.
//!
//! # Example
//!
//! ```
//! use gbi_core::{BackingImage, BankTable};
//!
//! // A list that only ends
//! let image = BackingImage::from_bytes(vec![0xDF, 0, 0, 0, 0, 0, 0, 0]);
//! let banks = BankTable::new().with_bank(6, 0, None);
//!
//! let result = gbi_f3dex2::decode_image(&image, &banks, 0x0600_0000);
//! assert!(result.commands.is_empty());
//! assert_eq!(result.stats.instructions, 1);
//! ```

pub mod command;
pub mod interpreter;
pub mod matrix;
pub mod opcode;
pub mod render_state;
pub mod texture;
pub mod vertex;

use std::collections::BTreeMap;
use std::sync::Arc;

use gbi_core::{BackingImage, BankTable, BankedImage, MemoryResolver, SegmentedAddress};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use command::{Command, RenderBackend, TextureBinding};
pub use interpreter::Interpreter;
pub use texture::DecodedTexture;
pub use vertex::{Vertex, VertexBuffer};

/// Why a session stopped before its top-level list ended
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Display list call depth {depth} exceeds the limit (call to {address})")]
    CallDepthExceeded {
        depth: usize,
        address: SegmentedAddress,
    },
    #[error("Instruction limit of {limit} reached")]
    InstructionLimit { limit: usize },
}

/// Bounds on a single decode session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeLimits {
    /// Maximum nesting of `G_DL` calls
    pub max_call_depth: usize,
    /// Maximum executed instructions, sub-lists included
    pub max_instructions: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_call_depth: 64,
            max_instructions: 1 << 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    pub limits: DecodeLimits,
}

/// Counters collected during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DecodeStats {
    /// Executed instructions; a texture-load block counts as seven
    pub instructions: usize,
    /// Vertex-buffer snapshots taken
    pub vertex_uploads: u32,
    /// Textures converted by the pixel codec
    pub texture_decodes: u32,
    /// Texture loads served from the cache
    pub texture_cache_hits: u32,
}

/// Everything one decode session produced
#[derive(Debug, Clone)]
pub struct DecodeResult {
    /// Render commands in emission order
    pub commands: Vec<Command>,
    /// Decoded textures in decode order
    pub textures: Vec<Arc<DecodedTexture>>,
    pub stats: DecodeStats,
    /// Set when a limit stopped the session early
    pub truncated: Option<DecodeError>,
}

impl DecodeResult {
    /// Apply every command to `backend`, in emission order
    pub fn replay(&self, backend: &mut dyn RenderBackend) {
        for command in &self.commands {
            command.apply(backend);
        }
    }

    /// Number of triangles across all draw commands
    pub fn triangle_count(&self) -> usize {
        self.commands
            .iter()
            .map(|command| match command {
                Command::DrawTriangles { indices, .. } => indices.len() / 3,
                _ => 0,
            })
            .sum()
    }

    pub fn summary(&self) -> DecodeSummary {
        let mut commands = BTreeMap::new();
        for command in &self.commands {
            *commands.entry(command.kind()).or_insert(0) += 1;
        }
        DecodeSummary {
            commands,
            triangles: self.triangle_count(),
            textures: self.textures.iter().map(|t| t.as_ref().clone()).collect(),
            stats: self.stats,
            truncated: self.truncated.as_ref().map(ToString::to_string),
        }
    }
}

/// Serializable overview of a [`DecodeResult`]
#[derive(Debug, Clone, Serialize)]
pub struct DecodeSummary {
    /// Command count by kind
    pub commands: BTreeMap<&'static str, usize>,
    pub triangles: usize,
    /// Texture metadata; pixel data is left out
    pub textures: Vec<DecodedTexture>,
    pub stats: DecodeStats,
    pub truncated: Option<String>,
}

/// Decode the display list at `start`
///
/// An unmapped start address yields an empty result.
pub fn decode<R: MemoryResolver + ?Sized>(
    memory: &R,
    start: SegmentedAddress,
    options: &DecodeOptions,
) -> DecodeResult {
    let mut interpreter = Interpreter::new(memory, *options);
    let truncated = interpreter.execute(start);
    interpreter.finish(truncated)
}

/// Decode with the stock bank-table resolver and default options
pub fn decode_image(image: &BackingImage, banks: &BankTable, start: u32) -> DecodeResult {
    let memory = BankedImage::new(image, banks);
    decode(&memory, SegmentedAddress(start), &DecodeOptions::default())
}
