//! Transform stack
//!
//! Matrices are 4x4 `f32`, stored column-major (`m[col * 4 + row]`), which
//! is the layout the microcode writes them in. `G_MTX` multiplies onto the
//! current matrix after pushing it; `G_POPMTX` restores the last push.

use gbi_core::logging::{log, LogCategory, LogLevel};
use gbi_core::{MemoryResolver, SegmentedAddress};

/// Size of a fixed-point matrix in memory: 16 integer halves then 16 fraction halves
pub const MATRIX_SIZE: usize = 64;

/// Column-major 4x4 matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4(pub [f32; 16]);

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4([
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ]);

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    /// Element at `row`, `col`
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.0[col * 4 + row]
    }

    /// `self * rhs`
    pub fn multiply(&self, rhs: &Mat4) -> Mat4 {
        let a = &self.0;
        let b = &rhs.0;
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = a[row] * b[col * 4]
                    + a[4 + row] * b[col * 4 + 1]
                    + a[8 + row] * b[col * 4 + 2]
                    + a[12 + row] * b[col * 4 + 3];
            }
        }
        Mat4(out)
    }

    /// Transform a point (w = 1) and divide by the resulting w
    ///
    /// A zero w leaves the point undivided.
    pub fn transform_point(&self, p: [f32; 3]) -> [f32; 3] {
        let m = &self.0;
        let [x, y, z] = p;
        let mut w = m[3] * x + m[7] * y + m[11] * z + m[15];
        if w == 0.0 {
            w = 1.0;
        }
        [
            (m[0] * x + m[4] * y + m[8] * z + m[12]) / w,
            (m[1] * x + m[5] * y + m[9] * z + m[13]) / w,
            (m[2] * x + m[6] * y + m[10] * z + m[14]) / w,
        ]
    }

    /// Decode a 16.16 fixed-point matrix
    ///
    /// The 64 bytes hold the 16 integer halves first and the 16 fraction
    /// halves 32 bytes later, both in column-major order.
    pub fn from_fixed_point(bytes: &[u8]) -> Option<Mat4> {
        if bytes.len() < MATRIX_SIZE {
            return None;
        }
        let mut out = [0.0f32; 16];
        for (k, elem) in out.iter_mut().enumerate() {
            let hi = u16::from_be_bytes([bytes[k * 2], bytes[k * 2 + 1]]) as u32;
            let lo = u16::from_be_bytes([bytes[32 + k * 2], bytes[32 + k * 2 + 1]]) as u32;
            let fixed = ((hi << 16) | lo) as i32;
            *elem = fixed as f32 / 65536.0;
        }
        Some(Mat4(out))
    }

    /// Read a fixed-point matrix through the resolver
    pub fn load<R: MemoryResolver + ?Sized>(memory: &R, addr: SegmentedAddress) -> Option<Mat4> {
        let offset = memory.resolve(addr)?;
        let bytes = memory.slice(offset, MATRIX_SIZE)?;
        Self::from_fixed_point(bytes)
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Current matrix plus the push/pop stack
#[derive(Debug, Clone)]
pub struct MatrixStack {
    current: Mat4,
    stack: Vec<Mat4>,
}

impl MatrixStack {
    pub fn new() -> Self {
        Self {
            current: Mat4::IDENTITY,
            stack: vec![Mat4::IDENTITY],
        }
    }

    pub fn current(&self) -> &Mat4 {
        &self.current
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn push(&mut self) {
        self.stack.push(self.current);
    }

    /// Restore the last pushed matrix
    ///
    /// Returns false, leaving the current matrix untouched, when the stack is
    /// empty.
    pub fn pop(&mut self) -> bool {
        match self.stack.pop() {
            Some(m) => {
                self.current = m;
                true
            }
            None => {
                log(LogCategory::Matrix, LogLevel::Warn, || {
                    "pop on empty matrix stack; keeping current matrix".to_string()
                });
                false
            }
        }
    }

    /// `current = current * m`
    pub fn multiply(&mut self, m: &Mat4) {
        self.current = self.current.multiply(m);
    }
}

impl Default for MatrixStack {
    fn default() -> Self {
        Self::new()
    }
}
