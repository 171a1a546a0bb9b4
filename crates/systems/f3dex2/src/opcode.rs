//! F3DEX2 instruction words and opcode table
//!
//! Every display-list instruction is 8 bytes: two big-endian 32-bit words.
//! The opcode is the top byte of the first word.
//!
//! | Opcode | Name | Handled |
//! |---|---|---|
//! | 0x01 | G_VTX | load vertices into the vertex cache |
//! | 0x05 | G_TRI1 | one triangle |
//! | 0x06 | G_TRI2 | two triangles |
//! | 0xD7 | G_TEXTURE | texture coordinate scale |
//! | 0xD8 | G_POPMTX | pop the transform stack |
//! | 0xD9 | G_GEOMETRYMODE | cull/lighting flags |
//! | 0xDA | G_MTX | push and multiply a matrix |
//! | 0xDE | G_DL | call or branch to a sub-list |
//! | 0xDF | G_ENDDL | end of list |
//! | 0xE2 | G_SETOTHERMODE_L | depth/blend render mode |
//! | 0xE3 | G_SETOTHERMODE_H | ignored |
//! | 0xE6 | G_RDPLOADSYNC | part of the texture-load idiom |
//! | 0xE7 | G_RDPPIPESYNC | part of the texture-load idiom |
//! | 0xF0 | G_LOADTLUT | palette load |
//! | 0xF2 | G_SETTILESIZE | tile rectangle |
//! | 0xF3 | G_LOADBLOCK | part of the texture-load idiom |
//! | 0xF5 | G_SETTILE | tile parameters |
//! | 0xF9 | G_SETPRIMCOLOR | ignored |
//! | 0xFB | G_SETENVCOLOR | ignored |
//! | 0xFC | G_SETCOMBINE | ignored |
//! | 0xFD | G_SETTIMG | texture image source |

use std::fmt;

/// Size of one instruction in bytes
pub const INSTRUCTION_SIZE: u32 = 8;

/// Known F3DEX2 opcodes, plus an explicit catch-all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Vtx,
    Tri1,
    Tri2,
    Texture,
    PopMtx,
    GeometryMode,
    Mtx,
    Dl,
    EndDl,
    SetOtherModeL,
    SetOtherModeH,
    RdpLoadSync,
    RdpPipeSync,
    LoadTlut,
    SetTileSize,
    LoadBlock,
    SetTile,
    SetPrimColor,
    SetEnvColor,
    SetCombine,
    SetTImg,
    /// Anything not in the table; skipped by the interpreter
    Unknown(u8),
}

impl Opcode {
    pub const VTX: u8 = 0x01;
    pub const TRI1: u8 = 0x05;
    pub const TRI2: u8 = 0x06;
    pub const TEXTURE: u8 = 0xD7;
    pub const POPMTX: u8 = 0xD8;
    pub const GEOMETRYMODE: u8 = 0xD9;
    pub const MTX: u8 = 0xDA;
    pub const DL: u8 = 0xDE;
    pub const ENDDL: u8 = 0xDF;
    pub const SETOTHERMODE_L: u8 = 0xE2;
    pub const SETOTHERMODE_H: u8 = 0xE3;
    pub const RDPLOADSYNC: u8 = 0xE6;
    pub const RDPPIPESYNC: u8 = 0xE7;
    pub const LOADTLUT: u8 = 0xF0;
    pub const SETTILESIZE: u8 = 0xF2;
    pub const LOADBLOCK: u8 = 0xF3;
    pub const SETTILE: u8 = 0xF5;
    pub const SETPRIMCOLOR: u8 = 0xF9;
    pub const SETENVCOLOR: u8 = 0xFB;
    pub const SETCOMBINE: u8 = 0xFC;
    pub const SETTIMG: u8 = 0xFD;

    pub fn from_byte(byte: u8) -> Self {
        match byte {
            Self::VTX => Opcode::Vtx,
            Self::TRI1 => Opcode::Tri1,
            Self::TRI2 => Opcode::Tri2,
            Self::TEXTURE => Opcode::Texture,
            Self::POPMTX => Opcode::PopMtx,
            Self::GEOMETRYMODE => Opcode::GeometryMode,
            Self::MTX => Opcode::Mtx,
            Self::DL => Opcode::Dl,
            Self::ENDDL => Opcode::EndDl,
            Self::SETOTHERMODE_L => Opcode::SetOtherModeL,
            Self::SETOTHERMODE_H => Opcode::SetOtherModeH,
            Self::RDPLOADSYNC => Opcode::RdpLoadSync,
            Self::RDPPIPESYNC => Opcode::RdpPipeSync,
            Self::LOADTLUT => Opcode::LoadTlut,
            Self::SETTILESIZE => Opcode::SetTileSize,
            Self::LOADBLOCK => Opcode::LoadBlock,
            Self::SETTILE => Opcode::SetTile,
            Self::SETPRIMCOLOR => Opcode::SetPrimColor,
            Self::SETENVCOLOR => Opcode::SetEnvColor,
            Self::SETCOMBINE => Opcode::SetCombine,
            Self::SETTIMG => Opcode::SetTImg,
            other => Opcode::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Opcode::Vtx => Self::VTX,
            Opcode::Tri1 => Self::TRI1,
            Opcode::Tri2 => Self::TRI2,
            Opcode::Texture => Self::TEXTURE,
            Opcode::PopMtx => Self::POPMTX,
            Opcode::GeometryMode => Self::GEOMETRYMODE,
            Opcode::Mtx => Self::MTX,
            Opcode::Dl => Self::DL,
            Opcode::EndDl => Self::ENDDL,
            Opcode::SetOtherModeL => Self::SETOTHERMODE_L,
            Opcode::SetOtherModeH => Self::SETOTHERMODE_H,
            Opcode::RdpLoadSync => Self::RDPLOADSYNC,
            Opcode::RdpPipeSync => Self::RDPPIPESYNC,
            Opcode::LoadTlut => Self::LOADTLUT,
            Opcode::SetTileSize => Self::SETTILESIZE,
            Opcode::LoadBlock => Self::LOADBLOCK,
            Opcode::SetTile => Self::SETTILE,
            Opcode::SetPrimColor => Self::SETPRIMCOLOR,
            Opcode::SetEnvColor => Self::SETENVCOLOR,
            Opcode::SetCombine => Self::SETCOMBINE,
            Opcode::SetTImg => Self::SETTIMG,
            Opcode::Unknown(byte) => byte,
        }
    }
}

/// The fixed micro-sequence one logical texture upload is expressed as
pub const TEXTURE_LOAD_IDIOM: [u8; 7] = [
    Opcode::SETTIMG,
    Opcode::SETTILE,
    Opcode::RDPLOADSYNC,
    Opcode::LOADBLOCK,
    Opcode::RDPPIPESYNC,
    Opcode::SETTILE,
    Opcode::SETTILESIZE,
];

/// One raw instruction
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Instruction {
    pub w0: u32,
    pub w1: u32,
}

impl Instruction {
    pub fn new(w0: u32, w1: u32) -> Self {
        Self { w0, w1 }
    }

    /// Top byte of the first word
    pub fn opcode_byte(self) -> u8 {
        (self.w0 >> 24) as u8
    }

    pub fn opcode(self) -> Opcode {
        Opcode::from_byte(self.opcode_byte())
    }

    /// `width` bits of the first word starting at `shift`
    pub fn w0_bits(self, shift: u32, width: u32) -> u32 {
        (self.w0 >> shift) & mask(width)
    }

    /// `width` bits of the second word starting at `shift`
    pub fn w1_bits(self, shift: u32, width: u32) -> u32 {
        (self.w1 >> shift) & mask(width)
    }

    /// Big-endian wire form
    pub fn to_bytes(self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.w0.to_be_bytes());
        bytes[4..].copy_from_slice(&self.w1.to_be_bytes());
        bytes
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:08X} {:08X})", self.opcode(), self.w0, self.w1)
    }
}

#[inline]
fn mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// True when the opcode bytes of `window` start with the texture-load idiom
pub fn matches_texture_load_idiom(window: &[Instruction]) -> bool {
    window.len() >= TEXTURE_LOAD_IDIOM.len()
        && window
            .iter()
            .zip(TEXTURE_LOAD_IDIOM)
            .all(|(instruction, opcode)| instruction.opcode_byte() == opcode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_table_round_trips_known_bytes() {
        let known = [
            0x01, 0x05, 0x06, 0xD7, 0xD8, 0xD9, 0xDA, 0xDE, 0xDF, 0xE2, 0xE3, 0xE6, 0xE7, 0xF0,
            0xF2, 0xF3, 0xF5, 0xF9, 0xFB, 0xFC, 0xFD,
        ];
        for byte in known {
            let opcode = Opcode::from_byte(byte);
            assert!(!matches!(opcode, Opcode::Unknown(_)), "{byte:02X}");
            assert_eq!(opcode.to_byte(), byte);
        }
    }

    #[test]
    fn test_unknown_opcodes() {
        assert_eq!(Opcode::from_byte(0x00), Opcode::Unknown(0x00));
        assert_eq!(Opcode::from_byte(0xBF), Opcode::Unknown(0xBF));
        assert_eq!(Opcode::from_byte(0xED), Opcode::Unknown(0xED));
    }

    #[test]
    fn test_instruction_fields() {
        let instruction = Instruction::new(0x0100_3006, 0x0600_0000);
        assert_eq!(instruction.opcode(), Opcode::Vtx);
        assert_eq!(instruction.w0_bits(12, 8), 3);
        assert_eq!(instruction.w0_bits(1, 7), 3);
        assert_eq!(instruction.w1_bits(0, 32), 0x0600_0000);
        assert_eq!(
            instruction.to_bytes(),
            [0x01, 0x00, 0x30, 0x06, 0x06, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_idiom_matching() {
        let idiom: Vec<Instruction> = TEXTURE_LOAD_IDIOM
            .iter()
            .map(|&op| Instruction::new((op as u32) << 24, 0))
            .collect();
        assert!(matches_texture_load_idiom(&idiom));

        for i in 0..idiom.len() {
            let mut broken = idiom.clone();
            broken[i] = Instruction::new(0x0000_0000, 0);
            assert!(!matches_texture_load_idiom(&broken), "slot {i}");
        }

        assert!(!matches_texture_load_idiom(&idiom[..6]));
    }
}
