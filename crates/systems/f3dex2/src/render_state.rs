//! Geometry-mode and other-mode translation into backend render state

use serde::Serialize;

/// Geometry-mode bits the decoder looks at
pub mod geometry {
    pub const CULL_FRONT: u32 = 0x0000_0200;
    pub const CULL_BACK: u32 = 0x0000_0400;
    pub const LIGHTING: u32 = 0x0002_0000;
    /// Geometry mode is a 24-bit register
    pub const MASK: u32 = 0x00FF_FFFF;
}

/// Render-mode bits of the low other-mode word
pub mod render_mode {
    pub const Z_CMP: u32 = 0x0010;
    pub const Z_UPD: u32 = 0x0020;
    pub const ZMODE_DEC: u32 = 0x0C00;
    pub const CVG_X_ALPHA: u32 = 0x1000;
    pub const ALPHA_CVG_SEL: u32 = 0x2000;
    pub const FORCE_BL: u32 = 0x4000;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CullMode {
    None,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BlendMode {
    /// Blending disabled
    Opaque,
    /// `src * 1 + dst * 1`
    Additive,
}

/// Backend state derived from the geometry mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GeometryState {
    pub cull: CullMode,
    /// False when lighting is enabled and the colour bytes are normals
    pub use_vertex_colors: bool,
}

impl GeometryState {
    pub fn from_mode(mode: u32) -> Self {
        let cull = match (
            mode & geometry::CULL_FRONT != 0,
            mode & geometry::CULL_BACK != 0,
        ) {
            (false, false) => CullMode::None,
            (true, false) => CullMode::Front,
            (false, true) => CullMode::Back,
            (true, true) => CullMode::FrontAndBack,
        };
        Self {
            cull,
            use_vertex_colors: mode & geometry::LIGHTING == 0,
        }
    }
}

/// Apply a `G_GEOMETRYMODE` clear/set pair to the current mode
pub fn update_geometry_mode(mode: u32, w0: u32, w1: u32) -> u32 {
    ((mode & !(w0 & geometry::MASK)) | w1) & geometry::MASK
}

/// Backend state derived from the render-mode field of the low other-mode word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderModeState {
    pub depth_test: bool,
    pub depth_write: bool,
    /// Decal depth mode, rendered with a polygon offset
    pub polygon_offset: bool,
    pub blend: BlendMode,
    /// 1: coverage times alpha, 2: alpha as coverage, 0: neither.
    /// Coverage times alpha wins when both are set.
    pub alpha_test: u8,
}

impl RenderModeState {
    pub fn from_render_mode(bits: u32) -> Self {
        let forced_blend = bits & render_mode::FORCE_BL != 0;
        let alpha_test = if forced_blend {
            0
        } else if bits & render_mode::CVG_X_ALPHA != 0 {
            1
        } else if bits & render_mode::ALPHA_CVG_SEL != 0 {
            2
        } else {
            0
        };

        Self {
            depth_test: bits & render_mode::Z_CMP != 0,
            depth_write: bits & render_mode::Z_UPD != 0,
            polygon_offset: bits & render_mode::ZMODE_DEC != 0,
            blend: if forced_blend {
                BlendMode::Additive
            } else {
                BlendMode::Opaque
            },
            alpha_test,
        }
    }
}

/// A decoded `G_SETOTHERMODE_L` field update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtherModeUpdate {
    pub shift: u32,
    pub length: u32,
    pub data: u32,
}

impl OtherModeUpdate {
    /// Shift of the render-mode field
    pub const RENDER_MODE_SHIFT: u32 = 3;

    pub fn decode(w0: u32, w1: u32) -> Self {
        let length = (w0 & 0xFF) + 1;
        let shift = 32u32
            .saturating_sub((w0 >> 8) & 0xFF)
            .saturating_sub(length);
        Self {
            shift,
            length,
            data: w1,
        }
    }

    /// True for the update that replaces the render-mode field
    pub fn is_render_mode(&self) -> bool {
        self.length == 32 - Self::RENDER_MODE_SHIFT
    }

    /// Merge the field into `mode`
    pub fn apply(&self, mode: u32) -> u32 {
        let field = if self.length >= 32 {
            u32::MAX
        } else {
            ((1u32 << self.length) - 1) << self.shift
        };
        (mode & !field) | (self.data & field)
    }
}
